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

//! Generation-tagged slot storage for device-owned objects.

use crate::renderer::api::Handle;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A slot map handing out [`Handle`]s.
///
/// Freed indices are recycled through a free list. Each removal bumps the
/// generation of the slot, so a handle to a removed object never resolves
/// again, even after its index has been reused.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    /// The handle the next successful insertion will return.
    fn vacant(&self) -> Handle {
        match self.free.last() {
            Some(&index) => Handle::new(index, self.slots[index as usize].generation),
            None => Handle::new(self.slots.len() as u32, 0),
        }
    }

    /// Stores a value and returns its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        match self.insert_with(|_| Ok::<T, std::convert::Infallible>(value)) {
            Ok(handle) => handle,
            Err(never) => match never {},
        }
    }

    /// Builds a value from the handle it will be stored under. Nothing is
    /// stored if `build` fails.
    pub fn insert_with<E>(&mut self, build: impl FnOnce(Handle) -> Result<T, E>) -> Result<Handle, E> {
        let handle = self.vacant();
        let value = build(handle)?;
        match self.free.pop() {
            Some(index) => self.slots[index as usize].value = Some(value),
            None => self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            }),
        }
        self.len += 1;
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the value behind `handle`. Stale handles return `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    /// Removes every live value, in index order.
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        let handles: Vec<Handle> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle).map(|value| (handle, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_handles_never_resolve_again() {
        let mut arena = Arena::default();
        let first = arena.insert("first");
        assert_eq!(arena.remove(first), Some("first"));
        assert_eq!(arena.remove(first), None);

        let second = arena.insert("second");
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&"second"));
    }

    #[test]
    fn failed_builds_store_nothing() {
        let mut arena: Arena<u32> = Arena::default();
        let result = arena.insert_with(|_| Err("backend refused"));
        assert_eq!(result, Err("backend refused"));
        assert!(arena.is_empty());

        let handle = arena.insert_with(|h| Ok::<_, ()>(h.index() * 10)).unwrap();
        assert_eq!(arena.get(handle), Some(&0));
    }

    #[test]
    fn drain_empties_the_arena_once() {
        let mut arena = Arena::default();
        let a = arena.insert(1);
        let b = arena.insert(2);
        arena.insert(3);
        arena.remove(b);
        let drained: Vec<_> = arena.drain().into_iter().map(|(_, v)| v).collect();
        assert_eq!(drained, [1, 3]);
        assert_eq!(arena.len(), 0);
        assert!(!arena.contains(a));
        assert!(arena.drain().is_empty());
    }
}
