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

//! Keyboard state handed to `Update` handlers.

use std::collections::HashSet;

/// Keys the event loop reports. Anything else maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// W.
    W,
    /// A.
    A,
    /// S.
    S,
    /// D.
    D,
    /// Q.
    Q,
    /// E.
    E,
    /// Space bar.
    Space,
    /// Escape.
    Escape,
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Any other key, identified by an opaque code stable within a run.
    Other(u32),
}

/// Which keys are currently held down.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
}

impl InputState {
    /// Records a key press.
    pub fn press(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }

    /// Records a key release.
    pub fn release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    /// `true` while `key` is held down.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Releases every key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.pressed.clear();
    }
}
