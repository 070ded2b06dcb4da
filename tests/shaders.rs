// Integration tests for the shaders the build script produces
//
// The demo loads its SPIR-V from the paths in `DemoConfig::default()`,
// relative to the working directory. Tests run from the package root, so
// those paths must resolve to well-formed modules after a build.

use ash_triangle_demo::DemoConfig;
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

fn read_words(path: &Path) -> Vec<u32> {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("{} was not produced by the build: {e}", path.display()));
    ash::util::read_spv(&mut std::io::Cursor::new(&bytes))
        .unwrap_or_else(|e| panic!("{} is not SPIR-V: {e}", path.display()))
}

#[test]
fn configured_shaders_are_compiled_spirv() {
    let config = DemoConfig::default();
    for path in [&config.vertex_shader, &config.fragment_shader] {
        let words = read_words(path);
        assert!(words.len() > 5, "{} has no instructions", path.display());
        assert_eq!(words[0], SPIRV_MAGIC);
    }
}

#[test]
fn vertex_and_fragment_modules_differ() {
    let config = DemoConfig::default();
    assert_ne!(
        read_words(&config.vertex_shader),
        read_words(&config.fragment_shader)
    );
}
