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


use super::conversions::adapter_info;
use anyhow::{anyhow, Result};
use lyra_core::renderer::api::core::{AdapterInfo, DeviceDescriptor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wgpu::{Adapter, Features, Instance};

/// The core `wgpu` objects a device runs on.
///
/// Built from a pre-selected adapter, so it holds no selection logic.
#[derive(Debug)]
pub struct WgpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub info: AdapterInfo,
    pub features: Features,
    lost: Arc<AtomicBool>,
}

impl WgpuContext {
    /// Opens a logical device on `adapter`.
    ///
    /// ## Arguments
    /// * `instance` - The instance the adapter was requested from. Surfaces are created from it.
    /// * `adapter` - The pre-selected adapter.
    /// * `descriptor` - The device label.
    pub async fn new(
        instance: Instance,
        adapter: Adapter,
        descriptor: &DeviceDescriptor<'_>,
    ) -> Result<Self> {
        let info = adapter_info(&adapter.get_info());
        log::info!(
            "WgpuContext: opening a device on \"{}\" ({})",
            info.name,
            info.backend
        );

        // Stencil-only and wireframe pipelines are used when the adapter has them.
        let wanted = Features::POLYGON_MODE_LINE
            | Features::POLYGON_MODE_POINT
            | Features::DEPTH32FLOAT_STENCIL8;
        let features = adapter.features() & wanted;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: descriptor.label.as_deref(),
                required_features: features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;

        device.on_uncaptured_error(Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("WgpuContext: device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });

        log::info!("WgpuContext: active features {features:?}");
        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            info,
            features,
            lost,
        })
    }

    /// Whether the driver reported the device as lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Polls the device until every submission has completed.
    pub fn poll_blocking(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| anyhow!("device poll failed: {e:?}"))
    }
}
