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

use crate::renderer::api::core::{AdapterDescriptor, AdapterInfo, BackendKind};
use async_trait::async_trait;

/// Discovers and selects a graphics adapter.
///
/// Adapter enumeration can be slow, so the main methods are asynchronous.
/// Concrete implementations live in `lyra-infra`.
#[async_trait]
pub trait GraphicsBackendSelector<TAdapter> {
    /// The error type returned if selection fails.
    type Error: std::fmt::Debug + std::fmt::Display + Send + Sync + 'static;

    /// Selects the best adapter of `backend` matching `descriptor`.
    ///
    /// # Arguments
    ///
    /// * `backend`: the API to use. `BackendKind::Auto` lets the selector pick.
    /// * `descriptor`: power preference and fallback constraints.
    async fn select_adapter(
        &self,
        backend: BackendKind,
        descriptor: &AdapterDescriptor,
    ) -> Result<TAdapter, Self::Error>;

    /// Lists every adapter available for `backend`.
    async fn list_adapters(&self, backend: BackendKind) -> Result<Vec<AdapterInfo>, Self::Error>;

    /// Whether `backend` is likely to work on this platform.
    fn is_backend_supported(&self, backend: BackendKind) -> bool;
}
