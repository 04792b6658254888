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

//! The software queue: one worker thread executing operations in
//! submission order.

use super::device::SoftwareStats;
use super::raster;
use super::resources::Resources;
use lyra_core::math::Extent2D;
use lyra_core::renderer::api::command::{Command, Signal};
use lyra_core::renderer::api::resource::{BufferId, ImageAspect, TextureId, TextureViewId};
use lyra_core::renderer::api::AnyResource;
use lyra_core::renderer::error::RenderError;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// The pixels of the last presented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedFrame {
    /// Size of the frame.
    pub extent: Extent2D,
    /// Encoded in the surface format, rows tightly packed.
    pub pixels: Vec<u8>,
}

pub(crate) enum QueueOp {
    WriteBuffer {
        buffer: BufferId,
        offset: u64,
        data: Vec<u8>,
    },
    Submit {
        label: String,
        commands: Vec<Command>,
    },
    Present {
        texture: TextureId,
        view: TextureViewId,
        extent: Extent2D,
        complete: Signal,
    },
    Discard {
        texture: TextureId,
        view: TextureViewId,
    },
    Release(AnyResource),
    Fence(Signal),
}

pub(crate) struct Queue {
    sender: Option<flume::Sender<QueueOp>>,
    worker: Option<JoinHandle<()>>,
}

impl Queue {
    /// Starts the worker. It runs until the queue is dropped, after
    /// draining what was pushed.
    pub fn spawn(store: Arc<Mutex<Resources>>, stats: Arc<SoftwareStats>) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded::<QueueOp>();
        let worker = thread::Builder::new()
            .name("lyra-software-queue".to_string())
            .spawn(move || {
                log::debug!("SoftwareQueue: worker started");
                let worker = Worker { store, stats };
                for op in receiver.iter() {
                    worker.run(op);
                }
                log::debug!("SoftwareQueue: worker stopped");
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn push(&self, op: QueueOp) -> Result<(), RenderError> {
        self.sender
            .as_ref()
            .ok_or(RenderError::DeviceLost)?
            .send(op)
            .map_err(|_| RenderError::DeviceLost)
    }

    /// Blocks until every operation pushed so far has run.
    pub fn flush(&self) -> Result<(), RenderError> {
        let fence = Signal::new("software queue fence");
        self.push(QueueOp::Fence(fence.clone()))?;
        fence.wait();
        Ok(())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("SoftwareQueue: worker thread panicked");
            }
        }
    }
}

struct Worker {
    store: Arc<Mutex<Resources>>,
    stats: Arc<SoftwareStats>,
}

impl Worker {
    fn store(&self) -> MutexGuard<'_, Resources> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, op: QueueOp) {
        match op {
            QueueOp::WriteBuffer {
                buffer,
                offset,
                data,
            } => {
                let mut store = self.store();
                let target = store.buffers.get_mut(&buffer).and_then(|bytes| {
                    bytes.get_mut(offset as usize..offset as usize + data.len())
                });
                match target {
                    Some(range) => range.copy_from_slice(&data),
                    None => log::error!("SoftwareQueue: write to {buffer:?} is out of range"),
                }
            }
            QueueOp::Submit { label, commands } => {
                raster::execute(&self.store, &label, &commands);
            }
            QueueOp::Present {
                texture,
                view,
                extent,
                complete,
            } => {
                complete.wait();
                let mut store = self.store();
                store.views.remove(&view);
                match store.images.remove(&texture) {
                    Some(image) => {
                        let pixels = image.read(ImageAspect::All);
                        *self
                            .stats
                            .last_presented
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) =
                            Some(PresentedFrame { extent, pixels });
                        self.stats.presents.fetch_add(1, Ordering::Relaxed);
                    }
                    None => log::error!("SoftwareQueue: presented frame {texture:?} has no image"),
                }
            }
            QueueOp::Discard { texture, view } => {
                let mut store = self.store();
                store.views.remove(&view);
                store.images.remove(&texture);
            }
            QueueOp::Release(resource) => {
                if !self.store().release(resource) {
                    log::warn!("SoftwareQueue: released {resource:?} had no native object");
                }
            }
            QueueOp::Fence(signal) => signal.set(),
        }
    }
}
