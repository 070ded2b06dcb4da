use ash::vk;
use thiserror::Error;

/// Failures while creating GPU resources
///
/// Every variant names the step that failed so the caller can log a precise
/// diagnosis before deciding to abort. Nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    #[error("Invalid render target description: {0}")]
    InvalidDescription(&'static str),

    #[error("Image creation failed: {0}")]
    ImageCreationFailed(vk::Result),

    #[error("Buffer creation failed: {0}")]
    BufferCreationFailed(vk::Result),

    #[error("Allocating {size} bytes from memory type {memory_type_index} failed: {result}")]
    MemoryAllocationFailed {
        size: vk::DeviceSize,
        memory_type_index: u32,
        result: vk::Result,
    },

    #[error("No memory type in mask {type_bits:#034b} provides {required:?}")]
    NoCompatibleMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },

    #[error("Binding device memory failed: {0}")]
    MemoryBindFailed(vk::Result),

    #[error("Mapping device memory failed: {0}")]
    MemoryMapFailed(vk::Result),

    #[error("Creating a view of layers {base_layer}..+{layer_count} failed: {result}")]
    ViewCreationFailed {
        base_layer: u32,
        layer_count: u32,
        result: vk::Result,
    },

    #[error("Sampler creation failed: {0}")]
    SamplerCreationFailed(vk::Result),

    #[error("Write of {written} bytes exceeds buffer size {capacity}")]
    BufferOverflow {
        written: vk::DeviceSize,
        capacity: vk::DeviceSize,
    },
}
