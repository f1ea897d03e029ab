use std::{
    fmt,
    ops::{Index, IndexMut},
    ptr::NonNull,
    slice,
};

use crate::{
    error::{FreelistError, Result},
    node::{Link, Node, NodeIndex},
};

/// Fixed array of [`Node`] slots placed at the start of the arena.
///
/// It is very important that the allocator doesn't make allocations itself to keep
/// track of free blocks, so the pool is handed the address where its slots have to
/// live and never grows. A slot whose size is 0 is available; every other slot is
/// linked into the free list.
///
/// ```text
/// +--------+--------+--------+--------+-----+--------+
/// | Node 0 | Node 1 | (free) | Node 3 | ... | (free) |
/// +--------+--------+--------+--------+-----+--------+
/// ```
pub(crate) struct NodePool {
    slots: NonNull<Node>,
    capacity: u32,
}

// Only reachable through the owning `Freelist`, which moves the arena along with it.
unsafe impl Send for NodePool {}

impl NodePool {
    /// Writes `capacity` empty slots starting at `addr`.
    ///
    /// **SAFETY**: Caller must guarantee that `addr` is valid for writes of
    /// `capacity` nodes, aligned for [`Node`], and outlives the pool.
    pub unsafe fn new(addr: NonNull<u8>, capacity: u32) -> Self {
        let slots = addr.cast::<Node>();

        for i in 0..capacity as usize {
            unsafe { slots.as_ptr().add(i).write(Node::EMPTY) };
        }

        Self { slots, capacity }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn slots(&self) -> &[Node] {
        unsafe { slice::from_raw_parts(self.slots.as_ptr(), self.capacity as usize) }
    }

    #[inline]
    pub fn slots_mut(&mut self) -> &mut [Node] {
        unsafe { slice::from_raw_parts_mut(self.slots.as_ptr(), self.capacity as usize) }
    }

    /// First slot nobody is using, found by linear scan.
    pub fn available(&self) -> Option<NodeIndex> {
        self.slots()
            .iter()
            .position(Node::is_available)
            .map(|index| index as NodeIndex)
    }

    /// Claims the first available slot and sets it up as an unlinked free block.
    pub fn acquire(&mut self, offset: u32, size: u32) -> Result<NodeIndex> {
        debug_assert!(size > 0, "a zero-sized node is indistinguishable from an empty slot");

        let index = self.available().ok_or(FreelistError::NodeStorageExhausted {
            capacity: self.capacity,
        })?;

        self[index] = Node::new(offset, size);

        Ok(index)
    }

    /// Gives the slot back. It must already be unlinked from the free list.
    pub fn release(&mut self, index: NodeIndex) {
        self[index] = Node::EMPTY;
    }

    /// Marks every slot as available.
    pub fn reset(&mut self) {
        self.slots_mut().fill(Node::EMPTY);
    }

    /// Number of slots currently describing a free block.
    pub fn in_use(&self) -> usize {
        self.slots().iter().filter(|node| !node.is_available()).count()
    }
}

impl Index<NodeIndex> for NodePool {
    type Output = Node;

    #[inline]
    fn index(&self, index: NodeIndex) -> &Node {
        &self.slots()[index as usize]
    }
}

impl IndexMut<NodeIndex> for NodePool {
    #[inline]
    fn index_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.slots_mut()[index as usize]
    }
}

/// Read-only handle to one free block of a [`crate::Freelist`].
///
/// Obtained from [`crate::Freelist::head`] and chained with [`NodeRef::next`], which
/// visits free blocks in ascending offset order.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pool: &'a NodePool,
    index: NodeIndex,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(pool: &'a NodePool, index: NodeIndex) -> Self {
        Self { pool, index }
    }

    fn node(&self) -> &'a Node {
        &self.pool[self.index]
    }

    /// Start of the free block, relative to the user data.
    pub fn offset(&self) -> u32 {
        self.node().offset
    }

    /// Length of the free block in bytes.
    pub fn size(&self) -> u32 {
        self.node().size
    }

    /// First byte after the free block.
    pub fn end(&self) -> u32 {
        self.node().end()
    }

    /// The following free block, if any.
    pub fn next(&self) -> Option<NodeRef<'a>> {
        self.node().next.map(|index| NodeRef::new(self.pool, index))
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.pool, other.pool) && self.index == other.index
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("offset", &self.offset())
            .field("size", &self.size())
            .finish()
    }
}

/// Iterator over the free blocks of a [`crate::Freelist`], in ascending offset order.
pub struct Iter<'a> {
    pool: &'a NodePool,
    current: Link,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(pool: &'a NodePool, head: Link) -> Self {
        Self {
            pool,
            current: head,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        self.current = self.pool[index].next;

        Some(NodeRef::new(self.pool, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NODE_SIZE;

    /// Backing storage for a pool outside of an arena.
    fn storage(capacity: usize) -> Vec<Node> {
        vec![Node::new(7, 7); capacity]
    }

    fn pool(storage: &mut [Node]) -> NodePool {
        let addr = NonNull::new(storage.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe { NodePool::new(addr, storage.len() as u32) }
    }

    #[test]
    fn new_pool_is_empty() {
        let mut storage = storage(4);
        let pool = pool(&mut storage);

        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.slots().iter().all(Node::is_available));
        assert_eq!(pool.slots().len() * NODE_SIZE, 4 * NODE_SIZE);
    }

    #[test]
    fn acquire_takes_first_available_slot() {
        let mut storage = storage(3);
        let mut pool = pool(&mut storage);

        assert_eq!(pool.acquire(0, 8), Ok(0));
        assert_eq!(pool.acquire(8, 8), Ok(1));

        pool.release(0);
        assert_eq!(pool.acquire(16, 8), Ok(0));
        assert_eq!(pool[0], Node::new(16, 8));
    }

    #[test]
    fn acquire_fails_when_every_slot_is_used() {
        let mut storage = storage(2);
        let mut pool = pool(&mut storage);

        pool.acquire(0, 1).unwrap();
        pool.acquire(1, 1).unwrap();

        assert_eq!(
            pool.acquire(2, 1),
            Err(FreelistError::NodeStorageExhausted { capacity: 2 })
        );
        assert_eq!(pool.available(), None);
    }

    #[test]
    fn reset_frees_everything() {
        let mut storage = storage(2);
        let mut pool = pool(&mut storage);

        pool.acquire(0, 1).unwrap();
        pool.acquire(1, 1).unwrap();
        pool.reset();

        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.available(), Some(0));
    }

    #[test]
    fn iter_follows_links() {
        let mut storage = storage(3);
        let mut pool = pool(&mut storage);

        let a = pool.acquire(0, 4).unwrap();
        let b = pool.acquire(10, 2).unwrap();
        let c = pool.acquire(20, 6).unwrap();
        // Chain out of slot order: a -> c -> b
        pool[a].next = Some(c);
        pool[c].next = Some(b);

        let offsets: Vec<u32> = Iter::new(&pool, Some(a)).map(|n| n.offset()).collect();
        assert_eq!(offsets, vec![0, 20, 10]);

        let head = NodeRef::new(&pool, a);
        assert_eq!(head.next().unwrap().next().unwrap().end(), 12);
        assert!(Iter::new(&pool, None).next().is_none());
    }
}
