use std::convert::Infallible;

use frames::{Frame, RecordError};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::mirror::{MirrorMode, MirrorObserver, MirrorSurface, PressEvent};
use crate::press::{PressSource, TouchListeners};
use crate::render::Painter;
use crate::sync::{FrameOutbox, Inbound, Publisher, SyncAdapter};
use crate::viewport::{Point, Viewport};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Listen for mouse move/up on the document body.
    InstallMouseListeners,
    RemoveMouseListeners,
    /// Listen for touch move/cancel/end on the canvas.
    InstallTouchListeners,
    RemoveTouchListeners,
    /// Call `preventDefault()` on the triggering event.
    PreventDefault,
    RenderNeeded,
}

/// Errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Coordinates were resolved before the surface was mounted.
    #[error("mirror surface is not mounted")]
    NotMounted,
    #[error("render failed: {0}")]
    Render(String),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<JsValue> for EngineError {
    fn from(value: JsValue) -> Self {
        Self::Render(format!("{value:?}"))
    }
}

impl From<Infallible> for EngineError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Mouse button that triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

/// One changed touch point of a touch event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub identifier: i32,
    pub client_x: f64,
    pub client_y: f64,
}

impl Touch {
    fn source(&self) -> PressSource {
        PressSource::Touch(self.identifier)
    }

    fn client(&self) -> Point {
        Point::new(self.client_x, self.client_y)
    }
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore<P: Publisher = FrameOutbox> {
    pub surface: MirrorSurface,
    pub sync: SyncAdapter<P>,
    observers: Vec<Box<dyn MirrorObserver>>,
    viewport: Option<Viewport>,
}

impl Default for EngineCore<FrameOutbox> {
    fn default() -> Self {
        Self::new(MirrorMode::default())
    }
}

impl EngineCore<FrameOutbox> {
    #[must_use]
    pub fn new(mode: MirrorMode) -> Self {
        Self::with_parts(MirrorSurface::new(mode), SyncAdapter::default())
    }

    /// Take every command published since the last drain as request frames.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a command fails to serialize.
    pub fn drain_outbox(&mut self, ts: i64) -> Result<Vec<Frame>, RecordError> {
        self.sync.publisher_mut().drain_frames(ts)
    }
}

impl<P: Publisher> EngineCore<P> {
    pub fn with_parts(surface: MirrorSurface, sync: SyncAdapter<P>) -> Self {
        Self { surface, sync, observers: Vec::new(), viewport: None }
    }

    /// Register an observer. Observers run after the sync adapter, in
    /// registration order.
    pub fn add_observer(&mut self, observer: Box<dyn MirrorObserver>) {
        self.observers.push(observer);
    }

    // --- Lifecycle ---

    /// Attach to a measured canvas and start handling relay frames.
    pub fn mount(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.sync.open();
    }

    /// Re-measure after a resize or scroll.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.viewport.is_some()
    }

    /// Detach: cancel pending press delays, drop press sessions, stop
    /// handling relay frames, and report which listeners to remove.
    pub fn unmount(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.surface.tracker().contains(PressSource::Mouse) {
            actions.push(Action::RemoveMouseListeners);
        }
        if self.surface.teardown() == Some(TouchListeners::Remove) {
            actions.push(Action::RemoveTouchListeners);
        }
        self.sync.close();
        self.viewport = None;
        actions
    }

    /// Client coordinates to fractional canvas coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn resolve(&self, client: Point) -> Result<Point, EngineError> {
        let viewport = self.viewport.ok_or(EngineError::NotMounted)?;
        Ok(viewport.to_fraction(client))
    }

    // --- Mouse ---

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_mouse_down(&mut self, client: Point, button: Button, now: f64) -> Result<Vec<Action>, EngineError> {
        if button != Button::Primary || self.surface.tracker().contains(PressSource::Mouse) {
            return Ok(Vec::new());
        }
        let origin = self.resolve(client)?;
        let mut actions = vec![Action::InstallMouseListeners];
        let events = self.surface.press_start(PressSource::Mouse, origin, now);
        self.dispatch(events, &mut actions);
        actions.push(Action::RenderNeeded);
        Ok(actions)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_mouse_move(&mut self, client: Point) -> Result<Vec<Action>, EngineError> {
        if !self.surface.tracker().contains(PressSource::Mouse) {
            return Ok(Vec::new());
        }
        let point = self.resolve(client)?;
        let mut actions = Vec::new();
        let events = self.surface.press_move(PressSource::Mouse, point);
        self.dispatch(events, &mut actions);
        Ok(actions)
    }

    pub fn on_mouse_up(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let events = self.surface.press_end(PressSource::Mouse);
        self.dispatch(events, &mut actions);
        actions.push(Action::RemoveMouseListeners);
        actions
    }

    // --- Touch ---

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_touch_start(&mut self, touches: &[Touch], now: f64) -> Result<Vec<Action>, EngineError> {
        let mut actions = Vec::new();
        if self.surface.captive {
            actions.push(Action::PreventDefault);
        }
        for touch in touches {
            if self.surface.tracker().contains(touch.source()) {
                continue;
            }
            let origin = self.resolve(touch.client())?;
            let events = self.surface.press_start(touch.source(), origin, now);
            self.dispatch(events, &mut actions);
        }
        if !touches.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        Ok(actions)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_touch_move(&mut self, touches: &[Touch]) -> Result<Vec<Action>, EngineError> {
        let mut actions = Vec::new();
        for touch in touches {
            if !self.surface.tracker().contains(touch.source()) {
                continue;
            }
            let point = self.resolve(touch.client())?;
            let events = self.surface.press_move(touch.source(), point);
            self.dispatch(events, &mut actions);
        }
        Ok(actions)
    }

    pub fn on_touch_end(&mut self, touches: &[Touch]) -> Vec<Action> {
        let mut actions = Vec::new();
        for touch in touches {
            let events = self.surface.press_end(touch.source());
            self.dispatch(events, &mut actions);
        }
        actions
    }

    /// Cancelled touches release exactly like ended ones.
    pub fn on_touch_cancel(&mut self, touches: &[Touch]) -> Vec<Action> {
        self.on_touch_end(touches)
    }

    // --- Frame loop ---

    /// Advance animations to `now`. Requests a render while anything is live.
    pub fn on_frame(&mut self, now: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        let events = self.surface.tick(now);
        self.dispatch(events, &mut actions);
        if self.surface.is_animating() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Draw the surface through `painter`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`], or the
    /// painter's failure.
    pub fn render<T>(&mut self, painter: &mut T, now: f64) -> Result<(), EngineError>
    where
        T: Painter,
        EngineError: From<T::Error>,
    {
        let bounds = self.viewport.ok_or(EngineError::NotMounted)?.bounds();
        self.surface.render(painter, bounds, now)?;
        Ok(())
    }

    // --- Relay ---

    /// Apply one relay frame.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for malformed payloads.
    pub fn handle_frame(&mut self, frame: &Frame, now: f64) -> Result<Inbound, RecordError> {
        self.sync.handle_frame(&mut self.surface, frame, now)
    }

    /// Parse and apply one websocket text message.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the text is not a frame or its payload is malformed.
    pub fn handle_text(&mut self, text: &str, now: f64) -> Result<Inbound, RecordError> {
        let frame: Frame = serde_json::from_str(text)?;
        self.handle_frame(&frame, now)
    }

    pub fn on_disconnect(&mut self) -> usize {
        self.sync.on_disconnect(&mut self.surface)
    }

    // --- Observers ---

    fn dispatch(&mut self, events: Vec<PressEvent>, actions: &mut Vec<Action>) {
        for event in events {
            match event {
                PressEvent::Listeners(TouchListeners::Install) => actions.push(Action::InstallTouchListeners),
                PressEvent::Listeners(TouchListeners::Remove) => actions.push(Action::RemoveTouchListeners),
                _ => {
                    self.surface.notify(event, &mut self.sync);
                    for observer in &mut self.observers {
                        self.surface.notify(event, observer.as_mut());
                    }
                }
            }
        }
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, mode: MirrorMode) -> Self {
        Self { canvas, core: EngineCore::new(mode) }
    }

    fn measure(&self) -> Viewport {
        let rect = self.canvas.get_bounding_client_rect();
        Viewport { left: rect.left(), top: rect.top(), width: rect.width(), height: rect.height() }
    }

    fn context(&self) -> Result<CanvasRenderingContext2d, EngineError> {
        let context = self.canvas.get_context("2d")?.ok_or(EngineError::NotMounted)?;
        context
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| EngineError::Render("canvas has no 2d context".to_owned()))
    }

    // --- Lifecycle ---

    pub fn mount(&mut self) {
        let viewport = self.measure();
        self.core.mount(viewport);
    }

    pub fn unmount(&mut self) -> Vec<Action> {
        self.core.unmount()
    }

    // --- Input events ---

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_mouse_down(&mut self, client_x: f64, client_y: f64, button: Button) -> Result<Vec<Action>, EngineError> {
        self.remeasure();
        self.core.on_mouse_down(Point::new(client_x, client_y), button, js_sys::Date::now())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_mouse_move(&mut self, client_x: f64, client_y: f64) -> Result<Vec<Action>, EngineError> {
        self.remeasure();
        self.core.on_mouse_move(Point::new(client_x, client_y))
    }

    pub fn on_mouse_up(&mut self) -> Vec<Action> {
        self.core.on_mouse_up()
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_touch_start(&mut self, touches: &[Touch]) -> Result<Vec<Action>, EngineError> {
        self.remeasure();
        self.core.on_touch_start(touches, js_sys::Date::now())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotMounted`] before [`Self::mount`].
    pub fn on_touch_move(&mut self, touches: &[Touch]) -> Result<Vec<Action>, EngineError> {
        self.remeasure();
        self.core.on_touch_move(touches)
    }

    pub fn on_touch_end(&mut self, touches: &[Touch]) -> Vec<Action> {
        self.core.on_touch_end(touches)
    }

    pub fn on_touch_cancel(&mut self, touches: &[Touch]) -> Vec<Action> {
        self.core.on_touch_cancel(touches)
    }

    fn remeasure(&mut self) {
        if self.core.is_mounted() {
            let viewport = self.measure();
            self.core.set_viewport(viewport);
        }
    }

    // --- Frame loop ---

    pub fn on_frame(&mut self) -> Vec<Action> {
        self.core.on_frame(js_sys::Date::now())
    }

    /// Clear the canvas and draw the current state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the canvas has no 2d context or drawing fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn render(&mut self) -> Result<(), EngineError> {
        let viewport = self.measure();
        let (width, height) = (viewport.width.max(0.0) as u32, viewport.height.max(0.0) as u32);
        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }
        self.core.set_viewport(viewport);
        let mut context = self.context()?;
        context.clear_rect(0.0, 0.0, viewport.width, viewport.height);
        self.core.render(&mut context, js_sys::Date::now())
    }

    // --- Relay ---

    /// Apply one websocket text message from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Record`] for malformed messages.
    pub fn on_message(&mut self, text: &str) -> Result<Inbound, EngineError> {
        Ok(self.core.handle_text(text, js_sys::Date::now())?)
    }

    pub fn on_disconnect(&mut self) -> usize {
        self.core.on_disconnect()
    }

    /// Outbound frames to send on the socket.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Record`] if a command fails to serialize.
    #[allow(clippy::cast_possible_truncation)]
    pub fn drain_outbox(&mut self) -> Result<Vec<Frame>, EngineError> {
        Ok(self.core.drain_outbox(js_sys::Date::now() as i64)?)
    }
}
