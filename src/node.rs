use std::mem;

/// Position of a [`Node`] slot inside the node storage.
pub(crate) type NodeIndex = u32;

/// Index of the next node of the free list, `None` at the tail.
pub(crate) type Link = Option<NodeIndex>;

/// Size in bytes of one node slot. The node storage is `capacity * NODE_SIZE` bytes.
pub(crate) const NODE_SIZE: usize = mem::size_of::<Node>();

/// A node describing one contiguous free byte range of the user data.
///
/// Nodes are never allocated on their own. They live in a fixed array at the start
/// of the arena and are claimed and given back as free blocks are created, split,
/// merged or retired.
///
/// ```text
/// +---------------------+
/// |       offset        |  -> start inside the user data (not the whole arena)
/// +---------------------+
/// |        size         |  -> 0 marks an available slot
/// +---------------------+
/// |        next         |  -> slot of the next free block, ascending offsets
/// +---------------------+
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node {
    pub offset: u32,
    pub size: u32,
    pub next: Link,
}

impl Node {
    /// Contents of a slot no free block is using.
    pub const EMPTY: Node = Node {
        offset: 0,
        size: 0,
        next: None,
    };

    pub const fn new(offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            next: None,
        }
    }

    #[inline]
    pub const fn is_available(&self) -> bool {
        self.size == 0
    }

    /// First byte after the free block.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.offset + self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_is_available() {
        assert!(Node::EMPTY.is_available());
        assert!(!Node::new(0, 1).is_available());
    }

    #[test]
    fn end_is_exclusive() {
        assert_eq!(Node::new(64, 32).end(), 96);
    }

    #[test]
    fn node_layout() {
        assert!(NODE_SIZE <= 16);
        assert_eq!(mem::align_of::<Node>(), 4);
    }
}
