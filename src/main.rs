//! Opens a window and draws one rotating, textured triangle until closed

use std::{sync::Arc, time::Instant};

use anyhow::Result;
use ash::vk;
use ash_triangle_demo::{
    logging::init_logging, CrateResult, DemoConfig, DemoError, TriangleRenderer, VulkanContext,
};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

// Application state
struct App {
    config: DemoConfig,
    // Dropped before the window it renders into
    renderer: Option<TriangleRenderer>,
    window: Option<Arc<Window>>,
    start: Instant,
    frame_count: u64,
    error: Option<DemoError>,
}

impl App {
    fn new(config: DemoConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            start: Instant::now(),
            frame_count: 0,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> CrateResult<()> {
        let mut attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ))
            .with_resizable(false);
        if self.config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attributes)?);

        let context = Arc::new(VulkanContext::new(&self.config.title, window.as_ref())?);
        let size = window.inner_size();
        let renderer = TriangleRenderer::new(
            context,
            &self.config,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        log::info!("Setup complete, entering render loop");
        self.start = Instant::now();
        window.request_redraw();
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: DemoError) {
        log::error!("{error}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                log::info!("Exiting after {} frames", self.frame_count);
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                let elapsed = self.start.elapsed().as_secs_f32();
                if let Err(e) = renderer.render_frame(elapsed) {
                    self.fail(event_loop, e);
                    return;
                }
                self.frame_count += 1;

                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    let mut app = App::new(DemoConfig::default());

    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;

    // Tear down GPU objects before the window goes away
    app.renderer = None;
    if let Some(error) = app.error.take() {
        return Err(error.into());
    }
    Ok(())
}
