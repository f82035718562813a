//! Insertion-ordered slab with stable generational handles
//!
//! Backs the content-hashed texture cache: O(1) push to the back, removal from anywhere, and
//! move-to-back, while iteration walks from the oldest entry to the newest.

use std::iter;

/// Handle to a texture in the content-hashed cache. Handles to removed textures never resolve to a
/// newer texture that reused the same storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, node: Node<T> },
    Vacant { generation: u32, next_free: Option<u32> },
}

#[derive(Debug)]
pub(crate) struct OrderedSlab<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> OrderedSlab<T> {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new(), free_head: None, head: None, tail: None, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn node(&self, index: u32) -> Option<&Node<T>> {
        match self.slots.get(index as usize)? {
            Slot::Occupied { node, .. } => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    fn node_mut(&mut self, index: u32) -> Option<&mut Node<T>> {
        match self.slots.get_mut(index as usize)? {
            Slot::Occupied { node, .. } => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    fn resolve(&self, id: TextureId) -> Option<&Node<T>> {
        match self.slots.get(id.index as usize)? {
            Slot::Occupied { generation, node } if *generation == id.generation => Some(node),
            _ => None,
        }
    }

    fn id_at(&self, index: u32) -> Option<TextureId> {
        match self.slots.get(index as usize)? {
            Slot::Occupied { generation, .. } => Some(TextureId { index, generation: *generation }),
            Slot::Vacant { .. } => None,
        }
    }

    pub(crate) fn contains(&self, id: TextureId) -> bool {
        self.resolve(id).is_some()
    }

    pub(crate) fn get(&self, id: TextureId) -> Option<&T> {
        self.resolve(id).map(|node| &node.value)
    }

    pub(crate) fn get_mut(&mut self, id: TextureId) -> Option<&mut T> {
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied { generation, node } if *generation == id.generation => {
                Some(&mut node.value)
            }
            _ => None,
        }
    }

    pub(crate) fn push_back(&mut self, value: T) -> TextureId {
        let node = Node { value, prev: self.tail, next: None };

        let (index, generation) = match self.free_head {
            Some(index) => {
                let generation = match self.slots[index as usize] {
                    Slot::Vacant { generation, next_free } => {
                        self.free_head = next_free;
                        generation
                    }
                    Slot::Occupied { .. } => unreachable!("free list only links vacant slots"),
                };
                self.slots[index as usize] = Slot::Occupied { generation, node };
                (index, generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { generation: 0, node });
                (index, 0)
            }
        };

        match self.tail.and_then(|tail| self.node_mut(tail)) {
            Some(tail) => tail.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        TextureId { index, generation }
    }

    fn unlink(&mut self, index: u32) {
        let Some(&Node { prev, next, .. }) = self.node(index) else { return };

        match prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev_node) => prev_node.next = next,
            None => self.head = next,
        }
        match next.and_then(|next| self.node_mut(next)) {
            Some(next_node) => next_node.prev = prev,
            None => self.tail = prev,
        }
    }

    pub(crate) fn remove(&mut self, id: TextureId) -> Option<T> {
        self.resolve(id)?;
        self.unlink(id.index);

        let vacant = Slot::Vacant {
            generation: id.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Slot::Occupied { node, .. } =
            std::mem::replace(&mut self.slots[id.index as usize], vacant)
        else {
            unreachable!("slot was resolved as occupied above")
        };
        self.free_head = Some(id.index);
        self.len -= 1;

        Some(node.value)
    }

    /// Move an entry to the newest position. Returns false for a stale handle.
    pub(crate) fn move_to_back(&mut self, id: TextureId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.tail == Some(id.index) {
            return true;
        }

        self.unlink(id.index);
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(id.index) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail.and_then(|tail| self.node_mut(tail)) {
            Some(tail) => tail.next = Some(id.index),
            None => self.head = Some(id.index),
        }
        self.tail = Some(id.index);

        true
    }

    /// Handles from oldest to newest
    pub(crate) fn ids(&self) -> impl Iterator<Item = TextureId> + '_ {
        iter::successors(self.head, move |&index| self.node(index).and_then(|node| node.next))
            .filter_map(move |index| self.id_at(index))
    }

    /// Remove every entry, oldest first
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let ids: Vec<_> = self.ids().collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}
