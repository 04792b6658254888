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

//! GPU-to-CPU and GPU-to-GPU synchronization primitives.

use crate::lyra_bitflags;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

lyra_bitflags! {
    /// Pipeline stages a wait or signal is scoped to.
    pub struct BarrierSync: u32 {
        /// Index fetch.
        const INDEX_INPUT = 1 << 0;
        /// Vertex shading.
        const VERTEX_SHADING = 1 << 1;
        /// Pixel (fragment) shading.
        const PIXEL_SHADING = 1 << 2;
        /// Depth and stencil tests and writes.
        const DEPTH_STENCIL = 1 << 3;
        /// Color attachment writes.
        const RENDER_TARGET = 1 << 4;
        /// Copy operations.
        const COPY = 1 << 5;
        /// Every draw stage.
        const DRAW = 0b1_1111;
        /// Every stage.
        const ALL = 0b11_1111;
    }
}

#[derive(Debug, Default)]
struct SignalState {
    set: bool,
    scheduled: bool,
}

struct SignalInner {
    id: u64,
    label: String,
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// A one-shot, thread-safe event set by a device queue.
///
/// Cloning a signal yields another handle to the same event. A signal is
/// `scheduled` once a submitted command buffer is going to set it, and `set`
/// once the queue has actually reached that point.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

impl Signal {
    /// Creates an unset signal.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
                state: Mutex::new(SignalState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    /// A process-unique identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Sets the signal and wakes every waiter.
    pub fn set(&self) {
        let mut state = self.lock();
        state.set = true;
        state.scheduled = true;
        self.inner.cond.notify_all();
    }

    /// `true` once the signal has been set.
    pub fn is_set(&self) -> bool {
        self.lock().set
    }

    /// `true` once a submission or the backend has promised to set the signal.
    pub fn is_scheduled(&self) -> bool {
        self.lock().scheduled
    }

    pub(crate) fn mark_scheduled(&self) {
        self.lock().scheduled = true;
    }

    /// Blocks until the signal is set.
    pub fn wait(&self) {
        let mut state = self.lock();
        while !state.set {
            state = self
                .inner
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the signal is set or `timeout` elapses. Returns `true` if set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .inner
            .cond
            .wait_timeout_while(state, timeout, |s| !s.set)
            .unwrap_or_else(PoisonError::into_inner);
        state.set
    }

    /// `true` if both handles refer to the same event.
    pub fn same_as(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SignalState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("set", &state.set)
            .field("scheduled", &state.scheduled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_wakes_a_waiting_thread() {
        let signal = Signal::new("frame complete");
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            remote.wait();
            remote.is_set()
        });
        thread::sleep(Duration::from_millis(10));
        signal.set();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn wait_timeout_reports_unset_signal() {
        let signal = Signal::new("never");
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        assert!(!signal.is_scheduled());
    }

    #[test]
    fn clones_share_identity() {
        let a = Signal::new("a");
        let b = a.clone();
        assert!(a.same_as(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.same_as(&Signal::new("a")));
    }
}
