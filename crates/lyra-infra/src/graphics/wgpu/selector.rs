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


//! Adapter selection for the `wgpu` backend.
//!
//! A Lyra backend maps onto one `wgpu` backend. `BackendKind::Auto` accepts
//! whichever native API the platform offers first.

use super::conversions::{adapter_info, backends_for, from_wgpu_backend};
use async_trait::async_trait;
use lyra_core::renderer::api::core::{AdapterDescriptor, AdapterInfo, BackendKind, PowerPreference, RhiFlags};
use lyra_core::renderer::error::RenderError;
use lyra_core::renderer::traits::GraphicsBackendSelector;
use wgpu::{Adapter, Instance, RequestAdapterOptions};

/// Creates the `wgpu` instance used for `backend`.
pub fn create_instance(backend: BackendKind, flags: RhiFlags) -> Instance {
    let mut instance_flags = wgpu::InstanceFlags::empty();
    if flags.contains(RhiFlags::VALIDATION) {
        instance_flags |= wgpu::InstanceFlags::VALIDATION;
    }
    if flags.contains(RhiFlags::DEBUG) {
        instance_flags |= wgpu::InstanceFlags::DEBUG;
    }
    log::debug!(
        "WgpuBackendSelector: creating instance for {backend} with {instance_flags:?}"
    );
    Instance::new(&wgpu::InstanceDescriptor {
        backends: backends_for(backend),
        flags: instance_flags,
        ..Default::default()
    })
}

/// Returns a human-readable name for a `wgpu` backend.
pub fn backend_name(backend: wgpu::Backend) -> &'static str {
    match backend {
        wgpu::Backend::Vulkan => "Vulkan",
        wgpu::Backend::Metal => "Metal",
        wgpu::Backend::Dx12 => "DirectX 12",
        wgpu::Backend::Gl => "OpenGL",
        wgpu::Backend::BrowserWebGpu => "WebGPU",
        _ => "No-op",
    }
}

/// Picks `wgpu` adapters on behalf of the RHI.
pub struct WgpuBackendSelector {
    instance: Instance,
}

impl WgpuBackendSelector {
    /// Creates a selector over an existing instance.
    pub fn new(instance: Instance) -> Self {
        Self { instance }
    }

    /// The instance adapters are requested from.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    fn power_preference(preference: PowerPreference) -> wgpu::PowerPreference {
        match preference {
            PowerPreference::None => wgpu::PowerPreference::None,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }

    /// Whether an adapter running on `actual` satisfies a request for `requested`.
    fn accepts(requested: BackendKind, actual: wgpu::Backend) -> bool {
        match from_wgpu_backend(actual) {
            Some(kind) => requested == BackendKind::Auto || requested == kind,
            None => false,
        }
    }

    async fn request(
        &self,
        backend: BackendKind,
        descriptor: &AdapterDescriptor,
    ) -> Result<Adapter, RenderError> {
        let adapter = self
            .instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: Self::power_preference(descriptor.power_preference),
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|e| {
                RenderError::AdapterRequestFailed(format!("no {backend} adapter: {e}"))
            })?;

        let actual = adapter.get_info().backend;
        if !Self::accepts(backend, actual) {
            return Err(RenderError::AdapterRequestFailed(format!(
                "requested {backend}, the adapter runs on {}",
                backend_name(actual)
            )));
        }
        Ok(adapter)
    }
}

#[async_trait]
impl GraphicsBackendSelector<Adapter> for WgpuBackendSelector {
    type Error = RenderError;

    async fn select_adapter(
        &self,
        backend: BackendKind,
        descriptor: &AdapterDescriptor,
    ) -> Result<Adapter, Self::Error> {
        if backend == BackendKind::Software {
            return Err(RenderError::AdapterRequestFailed(
                "the software backend has no wgpu adapter".to_string(),
            ));
        }
        if !self.is_backend_supported(backend) {
            return Err(RenderError::AdapterRequestFailed(format!(
                "{backend} is not available on this platform"
            )));
        }

        log::info!("WgpuBackendSelector: requesting a {backend} adapter...");
        let adapter = self.request(backend, descriptor).await?;
        let info = adapter.get_info();
        log::info!(
            "WgpuBackendSelector: selected \"{}\" on {} ({:?})",
            info.name,
            backend_name(info.backend),
            info.device_type
        );
        Ok(adapter)
    }

    async fn list_adapters(&self, backend: BackendKind) -> Result<Vec<AdapterInfo>, Self::Error> {
        if !self.is_backend_supported(backend) {
            return Ok(Vec::new());
        }
        match self.request(backend, &AdapterDescriptor::default()).await {
            Ok(adapter) => Ok(vec![adapter_info(&adapter.get_info())]),
            Err(e) => {
                log::debug!("WgpuBackendSelector: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn is_backend_supported(&self, backend: BackendKind) -> bool {
        match backend {
            BackendKind::Auto => true,
            BackendKind::Software => false,
            BackendKind::Vulkan => cfg!(any(
                target_os = "windows",
                target_os = "linux",
                target_os = "android"
            )),
            BackendKind::Metal => cfg!(any(target_os = "macos", target_os = "ios")),
            BackendKind::Dx12 => cfg!(target_os = "windows"),
            BackendKind::Gl => !cfg!(target_os = "ios"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!(backend_name(wgpu::Backend::Vulkan), "Vulkan");
        assert_eq!(backend_name(wgpu::Backend::Metal), "Metal");
        assert_eq!(backend_name(wgpu::Backend::Dx12), "DirectX 12");
        assert_eq!(backend_name(wgpu::Backend::Gl), "OpenGL");
    }

    #[test]
    fn auto_accepts_any_native_backend() {
        assert!(WgpuBackendSelector::accepts(BackendKind::Auto, wgpu::Backend::Vulkan));
        assert!(WgpuBackendSelector::accepts(BackendKind::Auto, wgpu::Backend::Gl));
        assert!(!WgpuBackendSelector::accepts(BackendKind::Auto, wgpu::Backend::Noop));
    }

    #[test]
    fn explicit_backend_must_match() {
        assert!(WgpuBackendSelector::accepts(BackendKind::Metal, wgpu::Backend::Metal));
        assert!(!WgpuBackendSelector::accepts(BackendKind::Vulkan, wgpu::Backend::Gl));
    }

    #[test]
    fn software_is_never_a_wgpu_backend() {
        let selector = WgpuBackendSelector::new(create_instance(BackendKind::Gl, RhiFlags::empty()));
        assert!(!selector.is_backend_supported(BackendKind::Software));
        let result = pollster::block_on(
            selector.select_adapter(BackendKind::Software, &AdapterDescriptor::default()),
        );
        assert!(matches!(result, Err(RenderError::AdapterRequestFailed(_))));
    }
}
