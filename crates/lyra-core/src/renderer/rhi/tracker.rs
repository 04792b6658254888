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

//! The Resource State Tracker.
//!
//! One ledger per device maps every buffer and texture to its current
//! [`ResourceState`]. The ledger only changes through explicit transitions:
//! barriers recorded by the caller and committed at submission. No other
//! operation moves a resource to a new state.

use crate::renderer::api::resource::{ResourceState, StateRequirement, StateTransition};
use crate::renderer::api::{AnyResource, ResourceId};
use crate::renderer::error::ValidationError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The per-device resource state ledger. Internally synchronized, so command
/// buffers recorded on several threads all validate against one view.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: Mutex<HashMap<ResourceId, ResourceState>>,
}

impl StateTracker {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, ResourceState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking a resource in the `Undefined` state.
    pub fn register(&self, resource: impl Into<ResourceId>) {
        self.lock().insert(resource.into(), ResourceState::Undefined);
    }

    /// Stops tracking a resource.
    pub fn unregister(&self, resource: impl Into<ResourceId>) {
        self.lock().remove(&resource.into());
    }

    /// The tracked state, or `None` for an unknown resource.
    pub fn current(&self, resource: impl Into<ResourceId>) -> Option<ResourceState> {
        self.lock().get(&resource.into()).copied()
    }

    /// Validates `transition.before` against the tracked state, then moves
    /// the resource to `transition.after`.
    pub fn transition(&self, transition: StateTransition) -> Result<(), ValidationError> {
        let mut states = self.lock();
        let tracked = states
            .get_mut(&transition.resource)
            .ok_or(ValidationError::StaleHandle(AnyResource::from(transition.resource)))?;
        if *tracked != transition.before {
            log::error!(
                "StateTracker: barrier on {:?} declares {} but {} is tracked",
                transition.resource,
                transition.before,
                tracked
            );
            return Err(ValidationError::StateMismatch {
                resource: transition.resource,
                declared: transition.before,
                tracked: *tracked,
            });
        }
        *tracked = transition.after;
        Ok(())
    }

    /// Validates every first-use expectation of a command buffer, then
    /// applies every final state. Either all requirements are applied or none.
    pub fn commit(&self, requirements: &[StateRequirement]) -> Result<(), ValidationError> {
        let mut states = self.lock();
        for requirement in requirements {
            let tracked = states
                .get(&requirement.resource)
                .copied()
                .ok_or(ValidationError::StaleHandle(AnyResource::from(requirement.resource)))?;
            if tracked != requirement.expected {
                log::error!(
                    "StateTracker: command buffer expects {:?} in {} but {} is tracked",
                    requirement.resource,
                    requirement.expected,
                    tracked
                );
                return Err(ValidationError::StateMismatch {
                    resource: requirement.resource,
                    declared: requirement.expected,
                    tracked,
                });
            }
        }
        for requirement in requirements {
            states.insert(requirement.resource, requirement.last);
        }
        Ok(())
    }

    /// Undoes a [`commit`](Self::commit) whose submission never reached the
    /// queue. Resources that moved on since then are left alone.
    pub fn rollback(&self, requirements: &[StateRequirement]) {
        let mut states = self.lock();
        for requirement in requirements {
            if let Some(tracked) = states.get_mut(&requirement.resource) {
                if *tracked == requirement.last {
                    *tracked = requirement.expected;
                }
            }
        }
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
