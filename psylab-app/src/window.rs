use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use anyhow::{Context, Result, anyhow, bail};
use pixels::{Pixels, SurfaceTexture};
use psylab_core::{Color, Display, DisplayError};
use psylab_experiment::{InputSource, KeyEvent};
use psylab_render::{Canvas, draw_message};
use psylab_timing::Timer;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowId};

use crate::keys::key_name;

const WINDOW_TIMEOUT: Duration = Duration::from_secs(5);
const DEBUG_SIZE: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

/// Window state driven by the event loop
struct WindowState {
    title: String,
    timer: Arc<dyn Timer>,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    size: Option<PhysicalSize<u32>>,
    refresh_rate: Option<f64>,
    keys: Vec<KeyEvent>,
    abort_key: String,
    /// Debug runs get a plain window and keep the cursor
    windowed: bool,
    error: Option<String>,
    exited: bool,
}

impl WindowState {
    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;
        self.refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_resizable(false);
        let attributes = if self.windowed {
            attributes.with_inner_size(DEBUG_SIZE)
        } else {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
        };
        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();

        tracing::info!(
            width = size.width,
            height = size.height,
            scale_factor = window.scale_factor(),
            refresh_hz = ?self.refresh_rate,
            "window opened"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        window.set_cursor_visible(self.windowed);
        self.size = Some(size);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                tracing::error!("Failed to create window and surface: {}", e);
                self.error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            // closing the window counts as the abort key
            WindowEvent::CloseRequested => self.keys.push(KeyEvent {
                key: self.abort_key.clone(),
                at: self.timer.now(),
            }),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match key_name(code) {
                        Some(name) => self.keys.push(KeyEvent {
                            key: name.to_string(),
                            at: self.timer.now(),
                        }),
                        None => tracing::debug!(?code, "ignoring unnamed key"),
                    }
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(pixels) = &mut self.pixels {
                    // the buffer keeps the canvas size; only the surface follows the window
                    if let Err(e) = pixels.resize_surface(size.width, size.height) {
                        tracing::warn!("Failed to resize surface: {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Event loop plus window, shared by the display and the keyboard
struct Session {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl Session {
    fn pump(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            tracing::debug!(code, "event loop exited");
            self.state.exited = true;
        }
    }
}

/// Fullscreen window the experiment draws into
pub struct WindowDisplay {
    session: Rc<RefCell<Session>>,
    canvas: Canvas,
    font: Option<FontArc>,
    closed: bool,
}

/// Keyboard of the experiment window
pub struct WindowKeys {
    session: Rc<RefCell<Session>>,
}

/// Opens a borderless fullscreen window on the primary monitor, or a plain
/// window with a visible cursor when `windowed`. The display and the keyboard
/// share one event loop; both pump it whenever they are used.
pub fn open_window(
    title: &str,
    timer: Arc<dyn Timer>,
    abort_key: &str,
    background: Color,
    font: Option<FontArc>,
    windowed: bool,
) -> Result<(WindowDisplay, WindowKeys)> {
    let event_loop = EventLoop::new().context("Cannot start the window event loop")?;
    let state = WindowState {
        title: title.to_string(),
        timer,
        window: None,
        pixels: None,
        size: None,
        refresh_rate: None,
        keys: Vec::new(),
        abort_key: abort_key.to_string(),
        windowed,
        error: None,
        exited: false,
    };
    let mut session = Session { event_loop, state };

    let started = Instant::now();
    while session.state.pixels.is_none() {
        session.pump();
        if let Some(e) = session.state.error.take() {
            bail!("Cannot open the experiment window: {}", e);
        }
        if session.state.exited || started.elapsed() > WINDOW_TIMEOUT {
            bail!("The experiment window did not open");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    let size = session
        .state
        .size
        .ok_or_else(|| anyhow!("Window has no size"))?;
    let canvas = Canvas::new(size.width, size.height, background)?;

    let session = Rc::new(RefCell::new(session));
    Ok((
        WindowDisplay {
            session: session.clone(),
            canvas,
            font,
            closed: false,
        },
        WindowKeys { session },
    ))
}

impl WindowDisplay {
    pub fn refresh_rate(&self) -> Option<f64> {
        self.session.borrow().state.refresh_rate
    }
}

impl Display for WindowDisplay {
    type Surface = Canvas;

    fn surface(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    fn flip(&mut self) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Closed);
        }
        let mut session = self.session.borrow_mut();
        session.pump();
        let pixels = session.state.pixels.as_mut().ok_or(DisplayError::Closed)?;
        self.canvas.copy_to(pixels.frame_mut())?;
        pixels
            .render()
            .map_err(|e| DisplayError::Render(e.to_string()))?;
        self.canvas.clear();
        Ok(())
    }

    fn show_message(&mut self, text: &str) -> Result<(), DisplayError> {
        match &self.font {
            Some(font) => draw_message(&mut self.canvas, font, text),
            None => tracing::warn!(message = %text, "no font configured; message not shown"),
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut session = self.session.borrow_mut();
        if let Some(window) = &session.state.window {
            window.set_cursor_visible(true);
        }
        session.state.pixels = None;
        session.state.window = None;
        session.pump();
        tracing::info!("experiment window closed");
    }
}

impl InputSource for WindowKeys {
    fn poll(&mut self) -> Vec<KeyEvent> {
        let mut session = self.session.borrow_mut();
        session.pump();
        std::mem::take(&mut session.state.keys)
    }
}
