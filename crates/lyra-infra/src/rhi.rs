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


//! The runtime entry point: picks a backend and opens devices on it.
//!
//! ```no_run
//! use lyra_core::renderer::api::core::{AdapterDescriptor, DeviceDescriptor, RhiDescriptor};
//! use lyra_infra::rhi::Rhi;
//!
//! # fn main() -> Result<(), lyra_core::renderer::error::RenderError> {
//! let rhi = Rhi::init(RhiDescriptor::default())?;
//! let adapter = rhi.request_adapter(&AdapterDescriptor::default())?;
//! let device = adapter.request_device(&DeviceDescriptor::default())?;
//! # let _ = device;
//! # Ok(())
//! # }
//! ```

use crate::graphics::software::{KernelLibrary, SoftwareDevice};
use crate::shader::create_compiler;
use lyra_core::math::Extent2D;
use lyra_core::platform::window::{LyraWindowHandle, SurfaceTarget};
use lyra_core::renderer::api::core::{
    AdapterDescriptor, AdapterInfo, BackendKind, CompileFlags, CompilerDescriptor,
    DeviceDescriptor, DeviceType, RhiDescriptor, RhiFlags, SurfaceDescriptor,
};
use lyra_core::renderer::error::RenderError;
use lyra_core::renderer::traits::ShaderCompiler;
use lyra_core::{Device, Surface};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "wgpu")]
use crate::graphics::wgpu::{conversions::adapter_info, create_instance, WgpuBackendSelector, WgpuContext, WgpuDevice};
#[cfg(feature = "wgpu")]
use lyra_core::renderer::traits::GraphicsBackendSelector;

/// An initialized RHI. Owns the native instance, if any, and the kernel
/// library shared by every software device it opens.
pub struct Rhi {
    backend: BackendKind,
    flags: RhiFlags,
    window: Option<LyraWindowHandle>,
    kernels: Arc<KernelLibrary>,
    #[cfg(feature = "wgpu")]
    instance: Option<wgpu::Instance>,
}

impl fmt::Debug for Rhi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rhi")
            .field("backend", &self.backend)
            .field("flags", &self.flags)
            .field("window", &self.window.is_some())
            .field("kernels", &self.kernels)
            .finish()
    }
}

impl Rhi {
    /// Initializes the backend named by `descriptor`.
    ///
    /// # Errors
    /// `RenderError::InitializationFailed` when a native backend is requested
    /// and this build has no native support.
    pub fn init(descriptor: RhiDescriptor) -> Result<Self, RenderError> {
        Self::with_kernels(descriptor, Arc::new(KernelLibrary::new()))
    }

    /// Like [`Rhi::init`], with a kernel library for the software backend.
    pub fn with_kernels(
        descriptor: RhiDescriptor,
        kernels: Arc<KernelLibrary>,
    ) -> Result<Self, RenderError> {
        let RhiDescriptor {
            backend,
            flags,
            window,
        } = descriptor;
        log::info!("Rhi: initializing with backend {backend} and flags {flags:?}");

        #[cfg(feature = "wgpu")]
        let instance = (backend != BackendKind::Software).then(|| create_instance(backend, flags));
        #[cfg(not(feature = "wgpu"))]
        if backend.is_native() {
            return Err(RenderError::InitializationFailed(format!(
                "{backend} needs the `wgpu` feature"
            )));
        }

        Ok(Self {
            backend,
            flags,
            window,
            kernels,
            #[cfg(feature = "wgpu")]
            instance,
        })
    }

    /// The backend that was requested.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// The kernels software devices run shaders with.
    pub fn kernel_library(&self) -> &Arc<KernelLibrary> {
        &self.kernels
    }

    /// The surface target of the window given at initialization.
    pub fn window_target(&self, extent: Extent2D) -> Option<SurfaceTarget> {
        self.window.clone().map(|handle| SurfaceTarget::Window { handle, extent })
    }

    /// Picks an adapter. `BackendKind::Auto` tries the native backends first
    /// and falls back to the software rasterizer.
    pub fn request_adapter(&self, descriptor: &AdapterDescriptor) -> Result<Adapter, RenderError> {
        match self.backend {
            BackendKind::Software => Ok(self.software_adapter()),
            BackendKind::Auto => match self.native_adapter(descriptor) {
                Ok(adapter) => Ok(adapter),
                Err(e) => {
                    log::warn!("Rhi: no native adapter ({e}), falling back to software");
                    Ok(self.software_adapter())
                }
            },
            _ => self.native_adapter(descriptor),
        }
    }

    /// Creates a surface on `device`.
    pub fn request_surface(
        &self,
        device: &Device,
        descriptor: &SurfaceDescriptor,
    ) -> Result<Surface, RenderError> {
        device.create_surface(descriptor)
    }

    fn software_adapter(&self) -> Adapter {
        Adapter {
            info: AdapterInfo {
                name: "Lyra Software Rasterizer".to_string(),
                backend: BackendKind::Software,
                device_type: DeviceType::Cpu,
                driver: env!("CARGO_PKG_VERSION").to_string(),
            },
            flags: self.flags,
            kind: AdapterKind::Software(self.kernels.clone()),
        }
    }

    #[cfg(feature = "wgpu")]
    fn native_adapter(&self, descriptor: &AdapterDescriptor) -> Result<Adapter, RenderError> {
        let instance = self.instance.clone().ok_or_else(|| {
            RenderError::AdapterRequestFailed("no native instance was created".to_string())
        })?;
        let selector = WgpuBackendSelector::new(instance.clone());
        let adapter = pollster::block_on(selector.select_adapter(self.backend, descriptor))?;
        Ok(Adapter {
            info: adapter_info(&adapter.get_info()),
            flags: self.flags,
            kind: AdapterKind::Wgpu { instance, adapter },
        })
    }

    #[cfg(not(feature = "wgpu"))]
    fn native_adapter(&self, _descriptor: &AdapterDescriptor) -> Result<Adapter, RenderError> {
        Err(RenderError::AdapterRequestFailed(
            "this build has no native backend".to_string(),
        ))
    }
}

enum AdapterKind {
    Software(Arc<KernelLibrary>),
    #[cfg(feature = "wgpu")]
    Wgpu {
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
    },
}

/// A physical adapter, ready to open a device.
pub struct Adapter {
    info: AdapterInfo,
    flags: RhiFlags,
    kind: AdapterKind,
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter").field("info", &self.info).finish()
    }
}

impl Adapter {
    /// What the adapter reports about itself.
    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    /// The backend the adapter runs on. Never `Auto`.
    pub fn backend(&self) -> BackendKind {
        self.info.backend
    }

    /// Opens a logical device.
    pub fn request_device(&self, descriptor: &DeviceDescriptor) -> Result<Device, RenderError> {
        match &self.kind {
            AdapterKind::Software(kernels) => {
                let backend = SoftwareDevice::new(kernels.clone())?;
                Ok(Device::new(Box::new(backend), descriptor))
            }
            #[cfg(feature = "wgpu")]
            AdapterKind::Wgpu { instance, adapter } => {
                let context = pollster::block_on(WgpuContext::new(
                    instance.clone(),
                    adapter.clone(),
                    descriptor,
                ))
                .map_err(|e| RenderError::DeviceRequestFailed(format!("{e:#}")))?;
                let backend = WgpuDevice::new(context)?;
                Ok(Device::new(Box::new(backend), descriptor))
            }
        }
    }

    /// A shader compiler producing blobs for this adapter's backend.
    pub fn create_compiler(&self) -> Box<dyn ShaderCompiler> {
        let mut flags = CompileFlags::REFLECT;
        if self.flags.contains(RhiFlags::DEBUG) {
            flags.insert(CompileFlags::DEBUG);
        }
        let library = match &self.kind {
            AdapterKind::Software(kernels) => kernels.clone(),
            #[cfg(feature = "wgpu")]
            AdapterKind::Wgpu { .. } => Arc::new(KernelLibrary::new()),
        };
        create_compiler(
            &CompilerDescriptor {
                target: self.backend(),
                flags,
            },
            library,
        )
    }
}
