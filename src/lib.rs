//! ash Triangle Demo Library
//!
//! This library holds everything the demo binary needs to put one rotating,
//! textured triangle on screen through raw Vulkan (via ash):
//! - A typed render-target allocator (image + device-local memory + views)
//! - First-match memory-type selection
//! - One-shot setup of swapchain, render pass, pipeline, texture and buffers
//! - A frame loop that records, submits, presents and drains the queue each frame

pub mod config;
pub mod error;
pub mod graphics;
pub mod logging;

pub use config::DemoConfig;
pub use error::{CrateResult, DemoError};
pub use graphics::{
    GraphicsContext, GraphicsError, RenderTarget, RenderTargetDesc, RenderTargetKind,
    TriangleRenderer, VulkanContext,
};
