//! Fixed-capacity direct-mapped hash list keyed by `u32`
//!
//! Each key maps to the primary slot at `key % N`. An empty primary slot holds the sentinel key
//! `index + 1`, which can never be a real key for that slot when `N > 1`. Keys that collide on an
//! occupied primary slot are stored in a singly-linked overflow chain hanging off that slot, so an
//! insert never drops an existing key.

use std::mem;

pub const DEFAULT_CAPACITY: usize = 8192;

#[derive(Debug)]
struct ChainNode<V> {
    key: u32,
    value: V,
    next: Option<Box<ChainNode<V>>>,
}

#[derive(Debug)]
struct Slot<V> {
    key: u32,
    value: Option<V>,
    chain: Option<Box<ChainNode<V>>>,
}

impl<V> Slot<V> {
    fn vacant(index: usize) -> Self {
        Self { key: sentinel_key(index), value: None, chain: None }
    }
}

#[inline]
fn sentinel_key(index: usize) -> u32 {
    (index + 1) as u32
}

#[derive(Debug)]
pub struct FlatHashList<V, const N: usize = DEFAULT_CAPACITY> {
    slots: Box<[Slot<V>]>,
    len: usize,
}

impl<V, const N: usize> FlatHashList<V, N> {
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N > 1 && N <= u32::MAX as usize) };

        Self { slots: (0..N).map(Slot::vacant).collect(), len: 0 }
    }

    #[inline]
    fn slot_index(key: u32) -> usize {
        key as usize % N
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn get(&self, key: u32) -> Option<&V> {
        let slot = &self.slots[Self::slot_index(key)];
        if slot.key == key {
            return slot.value.as_ref();
        }

        let mut node = slot.chain.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return Some(&n.value);
            }
            node = n.next.as_deref();
        }

        None
    }

    #[must_use]
    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        let slot = &mut self.slots[Self::slot_index(key)];
        if slot.key == key {
            return slot.value.as_mut();
        }

        let mut node = slot.chain.as_deref_mut();
        while let Some(n) = node {
            if n.key == key {
                return Some(&mut n.value);
            }
            node = n.next.as_deref_mut();
        }

        None
    }

    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace the value for `key`, returning the previous value if there was one.
    pub fn insert(&mut self, key: u32, value: V) -> Option<V> {
        if let Some(existing) = self.get_mut(key) {
            return Some(mem::replace(existing, value));
        }

        let index = Self::slot_index(key);
        let slot = &mut self.slots[index];
        if slot.key == sentinel_key(index) {
            slot.key = key;
            slot.value = Some(value);
        } else {
            append_to_chain(&mut slot.chain, Box::new(ChainNode { key, value, next: None }));
        }

        self.len += 1;
        None
    }

    /// Remove `key`, returning its value if it was present.
    ///
    /// Removing a primary entry that has an overflow chain promotes the first chain node into the
    /// primary slot.
    pub fn remove(&mut self, key: u32) -> Option<V> {
        let index = Self::slot_index(key);
        let slot = &mut self.slots[index];

        if slot.key == key {
            let value = slot.value.take();
            match slot.chain.take() {
                Some(promoted) => {
                    let ChainNode { key: promoted_key, value: promoted_value, next } = *promoted;
                    slot.key = promoted_key;
                    slot.value = Some(promoted_value);
                    slot.chain = next;
                }
                None => {
                    slot.key = sentinel_key(index);
                }
            }

            self.len -= 1;
            return value;
        }

        let value = remove_from_chain(&mut slot.chain, key)?;
        self.len -= 1;
        Some(value)
    }

    /// Reset every primary slot to its sentinel and free every overflow node.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.key = sentinel_key(index);
            slot.value = None;
            unlink_chain(&mut slot.chain);
        }

        self.len = 0;
    }

    /// Number of entries currently stored in overflow chains rather than primary slots.
    #[must_use]
    pub fn overflow_len(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| {
                let mut count = 0;
                let mut node = slot.chain.as_deref();
                while let Some(n) = node {
                    count += 1;
                    node = n.next.as_deref();
                }
                count
            })
            .sum()
    }
}

fn append_to_chain<V>(link: &mut Option<Box<ChainNode<V>>>, node: Box<ChainNode<V>>) {
    match link {
        Some(next) => append_to_chain(&mut next.next, node),
        None => *link = Some(node),
    }
}

fn remove_from_chain<V>(link: &mut Option<Box<ChainNode<V>>>, key: u32) -> Option<V> {
    match link {
        None => None,
        Some(node) if node.key != key => remove_from_chain(&mut node.next, key),
        Some(_) => {
            let ChainNode { value, next, .. } = *link.take()?;
            *link = next;
            Some(value)
        }
    }
}

// Iterative so that dropping a long chain can't overflow the stack
fn unlink_chain<V>(chain: &mut Option<Box<ChainNode<V>>>) {
    let mut next = chain.take();
    while let Some(mut node) = next {
        next = node.next.take();
    }
}

impl<V, const N: usize> Default for FlatHashList<V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const N: usize> Drop for FlatHashList<V, N> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            unlink_chain(&mut slot.chain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type SmallList = FlatHashList<u32, 8>;

    #[test]
    fn insert_get_remove() {
        let mut list = SmallList::new();
        assert!(list.is_empty());

        assert_eq!(None, list.insert(3, 30));
        assert_eq!(None, list.insert(100, 1000));
        assert_eq!(Some(&30), list.get(3));
        assert_eq!(Some(&1000), list.get(100));
        assert_eq!(None, list.get(4));
        assert_eq!(2, list.len());

        assert_eq!(Some(30), list.remove(3));
        assert_eq!(None, list.get(3));
        assert_eq!(None, list.remove(3));
        assert_eq!(1, list.len());
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut list = SmallList::new();
        list.insert(5, 1);
        assert_eq!(Some(1), list.insert(5, 2));
        assert_eq!(Some(&2), list.get(5));
        assert_eq!(1, list.len());

        // Replacing a chained key
        list.insert(13, 3);
        assert_eq!(Some(3), list.insert(13, 4));
        assert_eq!(Some(&4), list.get(13));
        assert_eq!(2, list.len());
    }

    #[test]
    fn sentinel_never_matches_real_key() {
        let list = SmallList::new();
        // Slot 0 holds sentinel key 1, slot 7 holds sentinel key 8
        for key in 0..64 {
            assert_eq!(None, list.get(key));
        }
    }

    #[test]
    fn colliding_keys_chain() {
        let mut list = SmallList::new();
        // All map to slot 2
        for (i, key) in [2, 10, 18, 26].into_iter().enumerate() {
            list.insert(key, i as u32);
        }

        assert_eq!(4, list.len());
        assert_eq!(3, list.overflow_len());
        assert_eq!(Some(&0), list.get(2));
        assert_eq!(Some(&1), list.get(10));
        assert_eq!(Some(&2), list.get(18));
        assert_eq!(Some(&3), list.get(26));
    }

    #[test]
    fn removing_primary_promotes_chain() {
        let mut list = SmallList::new();
        list.insert(2, 0);
        list.insert(10, 1);
        list.insert(18, 2);

        assert_eq!(Some(0), list.remove(2));
        assert_eq!(None, list.get(2));
        assert_eq!(Some(&1), list.get(10));
        assert_eq!(Some(&2), list.get(18));
        assert_eq!(1, list.overflow_len());

        assert_eq!(Some(1), list.remove(10));
        assert_eq!(Some(&2), list.get(18));
        assert_eq!(0, list.overflow_len());

        assert_eq!(Some(2), list.remove(18));
        assert!(list.is_empty());

        // Slot is vacant again and can be reoccupied
        list.insert(26, 3);
        assert_eq!(Some(&3), list.get(26));
        assert_eq!(0, list.overflow_len());
    }

    #[test]
    fn removing_middle_of_chain() {
        let mut list = SmallList::new();
        for key in [7, 15, 23, 31] {
            list.insert(key, key * 10);
        }

        assert_eq!(Some(230), list.remove(23));
        assert_eq!(None, list.get(23));
        assert_eq!(Some(&70), list.get(7));
        assert_eq!(Some(&150), list.get(15));
        assert_eq!(Some(&310), list.get(31));
        assert_eq!(2, list.overflow_len());
        assert_eq!(None, list.remove(39));
    }

    #[test]
    fn clear_frees_chains() {
        let mut list = SmallList::new();
        for key in 0..100 {
            list.insert(key, key);
        }
        assert_eq!(100, list.len());
        assert_eq!(92, list.overflow_len());

        list.clear();
        assert!(list.is_empty());
        assert_eq!(0, list.overflow_len());
        for key in 0..100 {
            assert_eq!(None, list.get(key));
        }

        list.insert(42, 1);
        assert_eq!(Some(&1), list.get(42));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut list = SmallList::new();
        list.insert(1, 1);
        list.insert(9, 9);

        *list.get_mut(9).unwrap() += 1;
        assert_eq!(Some(&10), list.get(9));
        assert_eq!(None, list.get_mut(17));
    }

    #[test]
    fn default_capacity() {
        let list: FlatHashList<u32> = FlatHashList::new();
        assert_eq!(DEFAULT_CAPACITY, list.capacity());
    }
}
