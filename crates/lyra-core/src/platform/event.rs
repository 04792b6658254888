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

//! Runtime event dispatch for windowing collaborators.
//!
//! Handlers are bound at runtime to one of a closed set of event kinds and
//! invoked synchronously, in binding order, by whichever loop drives the
//! window. Every handler receives the application context by `&mut`, so
//! state shared between stages lives in that context and nowhere else.

use super::input::InputState;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

/// The closed set of events a window loop emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Once, before the loop starts.
    Start,
    /// Once, when the loop exits.
    Close,
    /// Every iteration, after `Update`.
    Render,
    /// Every iteration, with input state and the frame delta.
    Update,
    /// When the window size changes.
    Resize,
}

/// Payload of `Update`.
#[derive(Debug, Clone, Copy)]
pub struct WindowInput<'a> {
    /// Keyboard state.
    pub input: &'a InputState,
    /// Seconds since the previous update.
    pub delta_time: f32,
}

impl WindowInput<'_> {
    /// Forwards to [`InputState::is_key_down`].
    pub fn is_key_down(&self, key: super::input::KeyCode) -> bool {
        self.input.is_key_down(key)
    }
}

/// Payload of `Resize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    /// New width in physical pixels.
    pub width: u32,
    /// New height in physical pixels.
    pub height: u32,
}

/// The argument passed to a type-erased handler.
#[derive(Debug, Clone, Copy)]
pub enum EventPayload<'a> {
    /// `Start`, `Close` and `Render` carry nothing.
    None,
    /// `Update`.
    Update(WindowInput<'a>),
    /// `Resize`.
    Resize(WindowInfo),
}

type Handler<C> = Box<dyn FnMut(&mut C, &EventPayload<'_>) -> Result<()>>;

/// A table from event kind to an ordered list of handlers.
pub struct EventDispatcher<C> {
    table: HashMap<EventKind, Vec<Handler<C>>>,
    started: bool,
    closed: bool,
}

impl<C> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventDispatcher<C> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            started: false,
            closed: false,
        }
    }

    /// Appends a type-erased handler to the list of `kind`.
    pub fn bind<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&mut C, &EventPayload<'_>) -> Result<()> + 'static,
    {
        self.table.entry(kind).or_default().push(Box::new(handler));
    }

    /// Binds a `Start` handler.
    pub fn bind_start(&mut self, mut handler: impl FnMut(&mut C) -> Result<()> + 'static) {
        self.bind(EventKind::Start, move |ctx, _| handler(ctx));
    }

    /// Binds a `Close` handler.
    pub fn bind_close(&mut self, mut handler: impl FnMut(&mut C) -> Result<()> + 'static) {
        self.bind(EventKind::Close, move |ctx, _| handler(ctx));
    }

    /// Binds a `Render` handler.
    pub fn bind_render(&mut self, mut handler: impl FnMut(&mut C) -> Result<()> + 'static) {
        self.bind(EventKind::Render, move |ctx, _| handler(ctx));
    }

    /// Binds an `Update` handler.
    pub fn bind_update(
        &mut self,
        mut handler: impl FnMut(&mut C, &WindowInput<'_>) -> Result<()> + 'static,
    ) {
        self.bind(EventKind::Update, move |ctx, payload| match payload {
            EventPayload::Update(input) => handler(ctx, input),
            other => anyhow::bail!("Update handler received {other:?}"),
        });
    }

    /// Binds a `Resize` handler.
    pub fn bind_resize(&mut self, mut handler: impl FnMut(&mut C, WindowInfo) -> Result<()> + 'static) {
        self.bind(EventKind::Resize, move |ctx, payload| match payload {
            EventPayload::Resize(info) => handler(ctx, *info),
            other => anyhow::bail!("Resize handler received {other:?}"),
        });
    }

    /// Number of handlers bound to `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.table.get(&kind).map_or(0, Vec::len)
    }

    /// Invokes the handlers of `kind` in binding order. Stops at the first error.
    pub fn dispatch(&mut self, kind: EventKind, ctx: &mut C, payload: &EventPayload<'_>) -> Result<()> {
        if let Some(handlers) = self.table.get_mut(&kind) {
            for handler in handlers.iter_mut() {
                handler(ctx, payload)?;
            }
        }
        Ok(())
    }

    /// Dispatches `Start`. Only the first call has an effect.
    pub fn dispatch_start(&mut self, ctx: &mut C) -> Result<()> {
        if self.started {
            log::warn!("EventDispatcher: Start was already dispatched, ignoring");
            return Ok(());
        }
        self.started = true;
        self.dispatch(EventKind::Start, ctx, &EventPayload::None)
    }

    /// Dispatches `Update`.
    pub fn dispatch_update(&mut self, ctx: &mut C, input: &InputState, delta_time: f32) -> Result<()> {
        let payload = EventPayload::Update(WindowInput { input, delta_time });
        self.dispatch(EventKind::Update, ctx, &payload)
    }

    /// Dispatches `Render`.
    pub fn dispatch_render(&mut self, ctx: &mut C) -> Result<()> {
        self.dispatch(EventKind::Render, ctx, &EventPayload::None)
    }

    /// Dispatches `Resize`.
    pub fn dispatch_resize(&mut self, ctx: &mut C, info: WindowInfo) -> Result<()> {
        self.dispatch(EventKind::Resize, ctx, &EventPayload::Resize(info))
    }

    /// Dispatches `Close`. Only the first call has an effect.
    pub fn dispatch_close(&mut self, ctx: &mut C) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.dispatch(EventKind::Close, ctx, &EventPayload::None)
    }

    /// `true` once `Close` has been dispatched.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<C> fmt::Debug for EventDispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self.table.iter().map(|(k, v)| (*k, v.len())).collect();
        counts.sort_by_key(|(k, _)| *k as u8);
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .field("started", &self.started)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::input::KeyCode;

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
    }

    #[test]
    fn handlers_run_in_binding_order() {
        let mut dispatcher = EventDispatcher::<Log>::new();
        dispatcher.bind_start(|log| {
            log.calls.push("start-a".into());
            Ok(())
        });
        dispatcher.bind_render(|log| {
            log.calls.push("render".into());
            Ok(())
        });
        dispatcher.bind_start(|log| {
            log.calls.push("start-b".into());
            Ok(())
        });

        let mut log = Log::default();
        dispatcher.dispatch_start(&mut log).unwrap();
        dispatcher.dispatch_start(&mut log).unwrap();
        dispatcher.dispatch_render(&mut log).unwrap();
        assert_eq!(log.calls, ["start-a", "start-b", "render"]);
    }

    #[test]
    fn typed_payloads_reach_their_handlers() {
        let mut dispatcher = EventDispatcher::<Log>::new();
        dispatcher.bind_update(|log, input| {
            let held = input.is_key_down(KeyCode::W);
            log.calls.push(format!("update {held} {:.2}", input.delta_time));
            Ok(())
        });
        dispatcher.bind_resize(|log, info| {
            log.calls.push(format!("resize {}x{}", info.width, info.height));
            Ok(())
        });

        let mut input = InputState::default();
        input.press(KeyCode::W);
        let mut log = Log::default();
        dispatcher.dispatch_update(&mut log, &input, 0.25).unwrap();
        dispatcher
            .dispatch_resize(&mut log, WindowInfo { width: 800, height: 600 })
            .unwrap();
        assert_eq!(log.calls, ["update true 0.25", "resize 800x600"]);
    }

    #[test]
    fn first_error_stops_dispatch() {
        let mut dispatcher = EventDispatcher::<Log>::new();
        dispatcher.bind_close(|_| anyhow::bail!("boom"));
        dispatcher.bind_close(|log| {
            log.calls.push("unreachable".into());
            Ok(())
        });
        let mut log = Log::default();
        assert!(dispatcher.dispatch_close(&mut log).is_err());
        assert!(log.calls.is_empty());
        assert!(dispatcher.is_closed());
        assert_eq!(dispatcher.handler_count(EventKind::Close), 2);
    }
}
