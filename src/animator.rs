//! The frame driver.
//!
//! An [`Animator`] owns the [`RenderingContext`] and hands every display
//! refresh to the current [`State`]. [`run`] hosts it in a winit event loop:
//!
//! 1. `resumed` creates the window and context, loads the first state and begins it
//! 2. `Resized`/`ScaleFactorChanged` resize the context and notify the state
//! 3. `Occluded` suspends and resumes frame scheduling
//! 4. `RedrawRequested` runs one frame and schedules the next
//!
//! A failing frame is logged and skipped; the loop keeps running.

use std::sync::Arc;

use futures::future::LocalBoxFuture;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{ContextConfig, RenderingContext},
    data_structures::bound::Viewport,
    error::Result,
};

/// New drawing-buffer size handed to [`State::resize`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SizeParams {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub viewport: Viewport,
}

/// One screen of an application: what to load, and what to draw every frame.
///
/// # Lifecycle
///
/// 1. `load()` once, before the state becomes current
/// 2. `begin()` when it becomes current
/// 3. `frame()` every display refresh while the host is visible
/// 4. `resize()` whenever the drawing buffer changes size
/// 5. `end()` then `dispose()` when it is replaced or the loop exits
pub trait State {
    fn load<'a>(&'a mut self, ctx: &'a mut RenderingContext) -> LocalBoxFuture<'a, Result<()>>;

    fn begin(&mut self, _ctx: &mut RenderingContext) {}

    /// Renders one frame. `delta` is the time since the previous frame in seconds.
    fn frame(&mut self, ctx: &mut RenderingContext, delta: f32) -> Result<()>;

    fn resize(&mut self, _ctx: &mut RenderingContext, _size: SizeParams) {}

    fn end(&mut self, _ctx: &mut RenderingContext) {}

    fn dispose<'a>(&'a mut self, _ctx: &'a mut RenderingContext) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Frame timing: seconds between consecutive ticks, capped after a stall.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    /// Longest delta a single frame observes, in seconds.
    pub const MAX_DELTA: f32 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delta since the previous tick, or 0 for the first one.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(last) if now > last => (now - last).as_secs_f32(),
            _ => 0.0,
        };
        self.last = Some(now);
        delta.min(Self::MAX_DELTA)
    }

    /// Forgets the previous tick so the next frame starts from zero.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Drives the current [`State`] with frame, resize and visibility signals.
pub struct Animator {
    ctx: RenderingContext,
    state: Option<Box<dyn State>>,
    clock: FrameClock,
    visible: bool,
}

impl Animator {
    pub fn new(ctx: RenderingContext) -> Self {
        Self {
            ctx,
            state: None,
            clock: FrameClock::new(),
            visible: true,
        }
    }

    pub fn context(&self) -> &RenderingContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderingContext {
        &mut self.ctx
    }

    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }

    /// Loads `state`, retires the current one and begins the new one.
    ///
    /// A failed load leaves the current state in place.
    pub async fn set_state(&mut self, mut state: Box<dyn State>) -> Result<()> {
        state.load(&mut self.ctx).await?;
        if let Some(mut previous) = self.state.take() {
            previous.end(&mut self.ctx);
            previous.dispose(&mut self.ctx).await?;
        }
        state.begin(&mut self.ctx);
        self.clock.reset();
        self.state = Some(state);
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Suspends or resumes frames. Frames missed while hidden are not replayed.
    pub fn set_visible(&mut self, visible: bool) {
        if visible && !self.visible {
            self.clock.reset();
        }
        if visible != self.visible {
            log::debug!("animator {}", if visible { "resumed" } else { "suspended" });
        }
        self.visible = visible;
    }

    /// Resizes the context to `width` x `height` CSS pixels and notifies the state.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        if width == 0 || height == 0 {
            return;
        }
        self.ctx.set_pixel_ratio(pixel_ratio);
        self.ctx.set_size(width, height);
        let size = SizeParams {
            width,
            height,
            pixel_ratio,
            viewport: self.ctx.viewport(),
        };
        if let Some(state) = &mut self.state {
            state.resize(&mut self.ctx, size);
        }
    }

    /// Runs one frame at `now`. Returns whether a frame ran.
    pub fn frame(&mut self, now: Instant) -> bool {
        if !self.visible {
            return false;
        }
        let delta = self.clock.tick(now);
        let Some(state) = &mut self.state else {
            return false;
        };
        if let Err(e) = state.frame(&mut self.ctx, delta) {
            log::error!("frame aborted: {}", e);
        }
        true
    }

    /// Ends and disposes the current state and releases every cached GPU handle.
    pub async fn dispose(&mut self) -> Result<()> {
        if let Some(mut state) = self.state.take() {
            state.end(&mut self.ctx);
            state.dispose(&mut self.ctx).await?;
        }
        self.ctx.state_mut().dispose();
        Ok(())
    }
}

enum AppEvent {
    Initialized(Animator),
    Failed(String),
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<AppEvent>,
    config: ContextConfig,
    initial: Option<Box<dyn State>>,
    window: Option<Arc<Window>>,
    animator: Option<Animator>,
}

impl App {
    fn new(event_loop: &EventLoop<AppEvent>, initial: Box<dyn State>, config: ContextConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            initial: Some(initial),
            window: None,
            animator: None,
        })
    }

    fn start(&mut self, mut animator: Animator) {
        if let Some(window) = &self.window {
            let size = window.inner_size();
            let scale = window.scale_factor();
            animator.resize(
                (size.width as f64 / scale) as u32,
                (size.height as f64 / scale) as u32,
                scale as f32,
            );
            window.request_redraw();
        }
        self.animator = Some(animator);
    }

    fn resize(&mut self) {
        if let (Some(window), Some(animator)) = (&self.window, &mut self.animator) {
            let size = window.inner_size();
            let scale = window.scale_factor();
            animator.resize(
                (size.width as f64 / scale) as u32,
                (size.height as f64 / scale) as u32,
                scale as f32,
            );
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut animator) = self.animator.take() {
            #[cfg(not(target_arch = "wasm32"))]
            {
                if let Err(e) = self.async_runtime.block_on(animator.dispose()) {
                    log::error!("dispose failed: {}", e);
                }
            }
            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = animator.dispose().await {
                        log::error!("dispose failed: {}", e);
                    }
                });
            }
        }
        event_loop.exit();
    }
}

fn window_attributes() -> anyhow::Result<winit::window::WindowAttributes> {
    #[allow(unused_mut)]
    let mut window_attributes = Window::default_attributes();

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen::JsCast;
        use winit::platform::web::WindowAttributesExtWebSys;

        const CANVAS_ID: &str = "canvas";

        let canvas = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(CANVAS_ID))
            .ok_or_else(|| anyhow::anyhow!("no element with id \"{}\"", CANVAS_ID))?;
        let html_canvas_element = canvas.unchecked_into();
        window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
    }

    Ok(window_attributes)
}

async fn initialize(window: Arc<Window>, config: ContextConfig, state: Box<dyn State>) -> Result<Animator> {
    let ctx = RenderingContext::new(window, config).await?;
    let mut animator = Animator::new(ctx);
    animator.set_state(state).await?;
    Ok(animator)
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(initial) = self.initial.take() else {
            return;
        };
        let window = match window_attributes()
            .and_then(|attributes| Ok(event_loop.create_window(attributes)?))
        {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());
        let init_future = initialize(window, self.config, initial);
        let proxy = self.proxy.clone();
        let report = async move {
            let event = match init_future.await {
                Ok(animator) => AppEvent::Initialized(animator),
                Err(e) => AppEvent::Failed(e.to_string()),
            };
            if proxy.send_event(event).is_err() {
                log::error!("event loop closed during initialization");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.block_on(report);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(report);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Initialized(animator) => self.start(animator),
            AppEvent::Failed(e) => {
                log::error!("initialization failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.resize(),
            WindowEvent::Occluded(occluded) => {
                if let Some(animator) = &mut self.animator {
                    animator.set_visible(!occluded);
                }
                if let (false, Some(window)) = (occluded, &self.window) {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(animator) = &mut self.animator else {
                    return;
                };
                if animator.frame(Instant::now()) {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens a window and drives `state` until the window closes.
pub fn run<S: State + 'static>(state: S, config: ContextConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)?;
    }

    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, Box::new(state), config)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

