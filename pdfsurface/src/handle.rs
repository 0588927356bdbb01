//! Opaque handles for documents and pages
//!
//! Hosts that address native objects by integer (a managed runtime, an FFI
//! boundary) get a generational slot index instead of a raw pointer. A stale
//! or forged handle resolves to nothing rather than to freed memory.

use std::marker::PhantomData;
use std::sync::Arc;

/// A typed opaque handle. The raw value is never zero.
pub struct Handle<T> {
    raw: u64,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            raw: (u64::from(generation) << 32) | u64::from(index),
            _kind: PhantomData,
        }
    }

    /// Rebuild a handle from a value previously returned by [`as_raw`](Self::as_raw).
    ///
    /// Returns `None` for zero, the null handle.
    pub fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self {
            raw,
            _kind: PhantomData,
        })
    }

    pub fn as_raw(&self) -> u64 {
        self.raw
    }

    fn index(&self) -> usize {
        (self.raw & 0xffff_ffff) as usize
    }

    fn generation(&self) -> u32 {
        (self.raw >> 32) as u32
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:#x})", self.raw)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

/// Arena of shared values addressed by generational handles.
///
/// Generations start at 1, so no live handle has a zero raw value.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        let value = Some(Arc::new(value));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.value = value;
            return Handle::new(index as u32, slot.generation);
        }
        self.slots.push(Slot {
            generation: 1,
            value,
        });
        Handle::new((self.slots.len() - 1) as u32, 1)
    }

    /// The value behind `handle`, if it is still live.
    pub fn get(&self, handle: Handle<T>) -> Option<Arc<T>> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.clone()
    }

    /// Remove and return the value; the handle and its copies go stale.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<Arc<T>> {
        let index = handle.index();
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        // Skip 0 on wrap so raw handles stay non-zero.
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index);
        Some(value)
    }

    /// Remove every value matching `predicate`.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        let doomed: Vec<Handle<T>> = self
            .iter()
            .filter(|&(_, value)| predicate(value))
            .map(|(handle, _)| handle)
            .collect();
        doomed.into_iter().filter_map(|h| self.remove(h)).collect()
    }

    /// Live entries.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &Arc<T>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut table = HandleTable::new();
        let first = table.insert("a");
        assert_eq!(table.remove(first).as_deref(), Some(&"a"));

        let second = table.insert("b");
        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert!(table.remove(first).is_none());
        assert_eq!(table.get(second).as_deref(), Some(&"b"));
    }

    #[test]
    fn test_raw_round_trip() {
        let mut table = HandleTable::new();
        let handle = table.insert(7u32);
        assert_ne!(handle.as_raw(), 0);
        let back = Handle::<u32>::from_raw(handle.as_raw()).unwrap();
        assert_eq!(table.get(back).as_deref(), Some(&7));
        assert!(Handle::<u32>::from_raw(0).is_none());
    }

    #[test]
    fn test_forged_handle_is_rejected() {
        let table: HandleTable<u8> = HandleTable::new();
        let forged = Handle::<u8>::from_raw(0xdead_0000_0003).unwrap();
        assert!(table.get(forged).is_none());
    }

    #[test]
    fn test_remove_where() {
        let mut table = HandleTable::new();
        for n in 0..6 {
            table.insert(n);
        }
        let removed = table.remove_where(|n| n % 2 == 0);
        assert_eq!(removed.len(), 3);
        assert_eq!(table.len(), 3);
    }
}
