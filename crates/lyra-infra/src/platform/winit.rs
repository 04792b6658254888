// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! A `winit`-based window and the loop that drives an [`EventDispatcher`].

use anyhow::{Context, Result};
use lyra_core::math::Extent2D;
use lyra_core::platform::event::{EventDispatcher, WindowInfo};
use lyra_core::platform::input::{InputState, KeyCode};
use lyra_core::platform::window::{LyraWindow, LyraWindowHandle};
use lyra_core::RhiConfig;
use raw_window_handle::{DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// A `winit` window implementing [`LyraWindow`].
///
/// Cloning is cheap; clones refer to the same native window.
#[derive(Debug, Clone)]
pub struct WinitWindow {
    inner: Arc<Window>,
}

impl WinitWindow {
    /// Opens a window titled and sized after `config`.
    pub fn open(event_loop: &ActiveEventLoop, config: &RhiConfig) -> Result<Self> {
        log::info!(
            "WinitWindow: opening '{}' at {}x{}",
            config.window_title,
            config.window_size.width,
            config.window_size.height
        );
        let attributes = Window::default_attributes()
            .with_title(config.window_title.clone())
            .with_inner_size(PhysicalSize::new(
                config.window_size.width,
                config.window_size.height,
            ));
        let window = event_loop
            .create_window(attributes)
            .context("Failed to create the window")?;
        Ok(Self {
            inner: Arc::new(window),
        })
    }

    /// The underlying `winit` window.
    pub fn winit(&self) -> &Window {
        &self.inner
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}

impl LyraWindow for WinitWindow {
    fn inner_size(&self) -> Extent2D {
        let size = self.inner.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn scale_factor(&self) -> f64 {
        self.inner.scale_factor()
    }

    fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    fn clone_handle_arc(&self) -> LyraWindowHandle {
        self.inner.clone()
    }
}

/// Maps a physical key to a [`KeyCode`].
pub fn translate_key(key: PhysicalKey) -> KeyCode {
    match key {
        PhysicalKey::Code(code) => match code {
            WinitKeyCode::KeyW => KeyCode::W,
            WinitKeyCode::KeyA => KeyCode::A,
            WinitKeyCode::KeyS => KeyCode::S,
            WinitKeyCode::KeyD => KeyCode::D,
            WinitKeyCode::KeyQ => KeyCode::Q,
            WinitKeyCode::KeyE => KeyCode::E,
            WinitKeyCode::Space => KeyCode::Space,
            WinitKeyCode::Escape => KeyCode::Escape,
            WinitKeyCode::ArrowUp => KeyCode::ArrowUp,
            WinitKeyCode::ArrowDown => KeyCode::ArrowDown,
            WinitKeyCode::ArrowLeft => KeyCode::ArrowLeft,
            WinitKeyCode::ArrowRight => KeyCode::ArrowRight,
            other => KeyCode::Other(opaque_code(&other)),
        },
        PhysicalKey::Unidentified(native) => KeyCode::Other(opaque_code(&native)),
    }
}

fn opaque_code(key: &impl Hash) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as u32
}

/// Builds the application context once the window exists.
pub type ContextFactory<C> = Box<dyn FnOnce(&WinitWindow) -> Result<C>>;

struct LoopState<C> {
    config: RhiConfig,
    factory: Option<ContextFactory<C>>,
    dispatcher: EventDispatcher<C>,
    window: Option<WinitWindow>,
    context: Option<C>,
    input: InputState,
    last_update: Instant,
    error: Option<anyhow::Error>,
}

impl<C> LoopState<C> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("run_event_loop: {error:#}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = WinitWindow::open(event_loop, &self.config)?;
        let factory = self
            .factory
            .take()
            .context("the application context was already built")?;
        let mut context = factory(&window).context("Failed to build the application context")?;
        self.dispatcher.dispatch_start(&mut context)?;
        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.last_update = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(context) = self.context.as_mut() else {
            return Ok(());
        };
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.dispatcher
            .dispatch_update(context, &self.input, delta_time)?;
        self.dispatcher.dispatch_render(context)
    }
}

impl<C> ApplicationHandler for LoopState<C> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result = match event {
            WindowEvent::CloseRequested => {
                log::info!("run_event_loop: close requested");
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => match self.context.as_mut() {
                Some(context) => self.dispatcher.dispatch_resize(
                    context,
                    WindowInfo {
                        width: size.width,
                        height: size.height,
                    },
                ),
                None => Ok(()),
            },
            WindowEvent::KeyboardInput { event, .. } => {
                let key = translate_key(event.physical_key);
                match event.state {
                    ElementState::Pressed => self.input.press(key),
                    ElementState::Released => self.input.release(key),
                }
                Ok(())
            }
            WindowEvent::Focused(false) => {
                self.input.clear();
                Ok(())
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(context) = self.context.as_mut() {
            if let Err(e) = self.dispatcher.dispatch_close(context) {
                log::error!("run_event_loop: Close handler failed: {e:#}");
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
    }
}

/// Opens a window and runs the event loop until it closes.
///
/// `Start` is dispatched once the window and the context exist, `Update`
/// then `Render` on every redraw, `Resize` when the window size changes and
/// `Close` once when the loop exits. The first handler error stops the loop
/// and is returned.
pub fn run_event_loop<C: 'static>(
    config: &RhiConfig,
    context_factory: impl FnOnce(&WinitWindow) -> Result<C> + 'static,
    dispatcher: EventDispatcher<C>,
) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut state = LoopState {
        config: config.clone(),
        factory: Some(Box::new(context_factory)),
        dispatcher,
        window: None,
        context: None,
        input: InputState::default(),
        last_update: Instant::now(),
        error: None,
    };
    event_loop
        .run_app(&mut state)
        .context("The event loop failed")?;

    // Release GPU objects before the window goes away.
    drop(state.context.take());
    match state.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
