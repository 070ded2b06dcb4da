//! Graphics module for rendering one rotating triangle to the screen
//!
//! This module provides:
//! - A [`GraphicsContext`] seam describing the narrow slice of the device the
//!   render-target allocator depends on, and its ash implementation [`VulkanContext`]
//! - [`RenderTarget`]: image + memory + view(s), built from a variant tag and a description
//! - The one-shot setup (swapchain, render pass, pipeline, texture, buffers) and
//!   per-frame recording in [`TriangleRenderer`]

pub mod buffer;
pub mod context;
pub mod device;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod render_target;
pub mod renderer;
pub mod scene;
pub mod swapchain;
pub mod texture;

pub use context::{GraphicsContext, VulkanContext};
pub use error::GraphicsError;
pub use render_target::{RenderTarget, RenderTargetDesc, RenderTargetKind};
pub use renderer::TriangleRenderer;
