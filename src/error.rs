//! Error types for the library

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the triangle demo
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("No suitable Vulkan device found among {0} devices")]
    NoVulkanDevice(usize),

    #[error("Surface reports no formats")]
    NoSurfaceFormat,

    #[error("Surface reports no present modes")]
    NoPresentMode,

    #[error("None of the depth formats {0:?} supports optimal-tiling depth attachments")]
    NoSupportedDepthFormat(Vec<vk::Format>),

    #[error("Failed to read shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shader {0} is empty")]
    EmptyShader(PathBuf),

    #[error("Window has no usable size ({0}x{1})")]
    UnsizedWindow(u32, u32),

    #[error("Graphics error: {0}")]
    Graphics(#[from] crate::graphics::error::GraphicsError),

    #[error("Window handle error: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Window creation error: {0}")]
    Os(#[from] winit::error::OsError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Convenience type alias for Results with [`DemoError`]
pub type CrateResult<T> = std::result::Result<T, DemoError>;
