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

//! Window abstractions and presentation targets.

use crate::math::Extent2D;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// The window-handle traits graphics backends need, combined so they can be
/// used as one trait object.
pub trait WindowHandle: HasWindowHandle + HasDisplayHandle {}

impl<T: HasWindowHandle + HasDisplayHandle> WindowHandle for T {}

/// A shareable, thread-safe handle to a native window.
pub type LyraWindowHandle = Arc<dyn WindowHandle + Send + Sync>;

/// The behavior of a window, independent of the windowing library.
pub trait LyraWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Physical size of the window's inner area.
    fn inner_size(&self) -> Extent2D;

    /// The scale factor of the window.
    fn scale_factor(&self) -> f64;

    /// Requests that the window be redrawn.
    fn request_redraw(&self);

    /// A shareable handle to the window, for surface creation.
    fn clone_handle_arc(&self) -> LyraWindowHandle;
}

/// An offscreen presentation target whose size is driven by its owner,
/// the way a window's size is driven by the user.
///
/// Clones share the same extent.
#[derive(Clone)]
pub struct HeadlessTarget {
    extent: Arc<Mutex<Extent2D>>,
}

impl HeadlessTarget {
    /// A target of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: Arc::new(Mutex::new(Extent2D::new(width, height))),
        }
    }

    /// The current size.
    pub fn extent(&self) -> Extent2D {
        *self.extent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Changes the size. Surfaces notice on their next acquisition.
    pub fn resize(&self, width: u32, height: u32) {
        *self.extent.lock().unwrap_or_else(PoisonError::into_inner) = Extent2D::new(width, height);
    }
}

impl fmt::Debug for HeadlessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessTarget")
            .field("extent", &self.extent())
            .finish()
    }
}

/// What a surface presents to.
#[derive(Clone)]
pub enum SurfaceTarget {
    /// A native window, with its size at surface creation.
    Window {
        /// The window.
        handle: LyraWindowHandle,
        /// The initial size of the swapchain.
        extent: Extent2D,
    },
    /// An offscreen target.
    Headless(HeadlessTarget),
}

impl SurfaceTarget {
    /// The size the surface should currently have.
    pub fn extent(&self) -> Extent2D {
        match self {
            SurfaceTarget::Window { extent, .. } => *extent,
            SurfaceTarget::Headless(target) => target.extent(),
        }
    }
}

impl fmt::Debug for SurfaceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceTarget::Window { extent, .. } => f
                .debug_struct("Window")
                .field("extent", extent)
                .finish_non_exhaustive(),
            SurfaceTarget::Headless(target) => f.debug_tuple("Headless").field(target).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_clones_share_their_extent() {
        let target = HeadlessTarget::new(64, 32);
        let surface_side = SurfaceTarget::Headless(target.clone());
        target.resize(128, 96);
        assert_eq!(surface_side.extent(), Extent2D::new(128, 96));
    }
}
