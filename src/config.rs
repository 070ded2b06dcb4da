//! Fixed demo parameters
//!
//! The demo has no command line, configuration file or environment surface;
//! this struct only gathers the constants in one place.

use std::path::PathBuf;

/// Window title used by the demo.
pub const APP_NAME: &str = "some excess demo";

/// Everything the binary needs to know before it opens a window.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Borderless fullscreen instead of a decorated window.
    pub fullscreen: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: APP_NAME.to_string(),
            width: 1280,
            height: 720,
            fullscreen: !cfg!(debug_assertions),
            vertex_shader: PathBuf::from("shaders/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shaders/triangle.frag.spv"),
            clear_color: [0.5, 0.5, 0.5, 1.0],
        }
    }
}

impl DemoConfig {
    /// Width over height of the configured window.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_demo_window() {
        let config = DemoConfig::default();
        assert_eq!(config.title, "some excess demo");
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.fullscreen, !cfg!(debug_assertions));
        assert!(config.vertex_shader.ends_with("triangle.vert.spv"));
        assert!(config.fragment_shader.ends_with("triangle.frag.spv"));
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        let config = DemoConfig {
            width: 800,
            height: 400,
            ..Default::default()
        };
        assert_eq!(config.aspect_ratio(), 2.0);
    }
}
