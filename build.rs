//! Build script for compiling the GLSL shaders to SPIR-V
//!
//! Each `shaders/<name>` source is written next to itself as `shaders/<name>.spv`,
//! the paths the demo loads at startup.
use std::{error::Error, path::PathBuf};

const SHADERS: [(&str, shaderc::ShaderKind); 2] = [
    ("triangle.vert", shaderc::ShaderKind::Vertex),
    ("triangle.frag", shaderc::ShaderKind::Fragment),
];

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
    let shaders_path = PathBuf::from(manifest_dir).join("shaders");

    let compiler = shaderc::Compiler::new().ok_or("shaderc compiler not available")?;
    let mut options = shaderc::CompileOptions::new().ok_or("shaderc options not available")?;
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );

    for (name, kind) in SHADERS {
        let source_path = shaders_path.join(name);
        println!("cargo:rerun-if-changed={}", source_path.display());

        let source = std::fs::read_to_string(&source_path)?;
        let artifact = compiler.compile_into_spirv(&source, kind, name, "main", Some(&options))?;
        if artifact.get_num_warnings() > 0 {
            println!("cargo:warning={name}: {}", artifact.get_warning_messages());
        }
        std::fs::write(shaders_path.join(format!("{name}.spv")), artifact.as_binary_u8())?;
    }
    Ok(())
}
