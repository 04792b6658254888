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

//! Commands, render passes, bind groups and synchronization primitives.

pub mod bind_group;
#[allow(clippy::module_inception)]
pub mod command;
pub mod pass;
pub mod sync;

pub use self::bind_group::*;
pub use self::command::*;
pub use self::pass::*;
pub use self::sync::*;
