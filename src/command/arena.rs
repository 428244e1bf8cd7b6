//! Generation-tagged slot map backing opaque object handles.

use crate::error::{ArgumentError, Result};
use alloc::vec::Vec as AllocVec;

/// Opaque reference to an object owned by a [`CommandDispatcher`](super::CommandDispatcher).
///
/// A handle outlives its object safely: once the slot is vacated its
/// generation moves on and the handle resolves to an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    /// Slot in the arena.
    pub index: u32,
    /// Occupancy count of the slot when the handle was issued.
    pub generation: u32,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot map handing out [`ObjectHandle`]s. Vacated slots are reused with a
/// bumped generation.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: AllocVec<Slot<T>>,
    free: AllocVec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// An empty arena.
    pub fn new() -> Self {
        Arena { slots: AllocVec::new(), free: AllocVec::new(), len: 0 }
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `value` in a free slot, or a new one, and return its handle.
    pub fn insert(&mut self, value: T) -> ObjectHandle {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                ObjectHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, value: Some(value) });
                ObjectHandle { index: self.slots.len() as u32 - 1, generation: 0 }
            }
        }
    }

    /// The entry behind `handle`; [`ArgumentError::StaleHandle`] once it
    /// was removed or cleared.
    pub fn get(&self, handle: ObjectHandle) -> Result<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| stale(handle))
    }

    /// Take the entry out and retire `handle`.
    pub fn remove(&mut self, handle: ObjectHandle) -> Result<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
            .ok_or_else(|| stale(handle))?;
        let value = slot.value.take().ok_or_else(|| stale(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Ok(value)
    }

    /// Vacate every slot. All handles issued so far become stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((ObjectHandle { index: index as u32, generation: slot.generation }, value))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn stale(handle: ObjectHandle) -> crate::error::Error {
    ArgumentError::StaleHandle { index: handle.index, generation: handle.generation }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_handles_are_stale() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        arena.clear();
        assert!(arena.get(a).is_err());

        let b = arena.insert("b");
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert_eq!(arena.get(b), Ok(&"b"));
    }

    #[test]
    fn removal_frees_slot() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        assert_eq!(arena.remove(a), Ok(1));
        assert!(arena.remove(a).is_err());
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.iter().map(|(h, v)| (h, *v)).collect::<AllocVec<_>>(), [(b, 2)]);
    }
}
