use std::{fmt, slice};

use tracing::{debug, trace};

use crate::{
    config::FreelistConfig,
    error::{FreelistError, Result},
    kernel::Arena,
    list::{Iter, NodePool, NodeRef},
    node::{Link, NODE_SIZE, Node, NodeIndex},
};

/// Fixed size memory arena handing out byte ranges from a linked list of free blocks.
///
/// The whole arena is requested once, when the [`Freelist`] is built, and returned
/// once, when it's dropped. The first part of it stores the node slots used to
/// describe free blocks, the rest is the user data callers reserve from:
///
/// ```text
///                            Free List
///
///               Next free block          Next free block
///           +------------------------+ +----------------+
///           |                        | |                |
/// +---------|-------++-------+-------|-|-----+-------+--|---+
/// | Node | Node |...|| Free  | Rsvd  | Free  | Rsvd  | Free |
/// +-----------------++-------+-------+-------+-------+------+
///   Node storage                   User data
/// ```
///
/// Free blocks are kept in ascending offset order and no two of them ever touch: a
/// block freed next to another one is merged into it. A reserved range is described by
/// nothing at all, so the allocator doesn't know which ranges are live. Callers keep
/// the `(offset, size)` pair [`Freelist::reserve`] gave them and hand it back to
/// [`Freelist::unreserve`] as-is. Giving back any other pair corrupts the free list.
///
/// Reservations are searched first-fit from the head of the list. When a free block is
/// bigger than the request the block shrinks in place and the reservation is carved
/// from its end, so a block is consumed from its highest addresses first.
pub struct Freelist {
    nodes: NodePool,
    head: Link,
    data_size: u32,
    internal_size: u32,
    total_size: u32,
    arena: Arena,
}

/// Where a freed range goes in the free list. Decided before anything is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// The list is empty, the range becomes its only block.
    Head,
    /// The node ends right where the range starts.
    ExtendTail(NodeIndex),
    /// The range ends right where the node starts.
    ExtendHead(NodeIndex),
    /// New node between `previous` (or the head) and `next`.
    Before { previous: Link, next: NodeIndex },
    /// New node after the last one.
    After(NodeIndex),
}

impl Freelist {
    /// Builds an arena able to hand out `data_size` bytes, with the default node
    /// granularity. See [`FreelistConfig::new`].
    pub fn new(data_size: u32) -> Result<Self> {
        Self::with_config(FreelistConfig::new(data_size))
    }

    /// Builds the arena described by `config`.
    ///
    /// Memory layout is:
    /// - Node storage (internal size): `node_capacity` slots.
    /// - User data (data size).
    pub fn with_config(config: FreelistConfig) -> Result<Self> {
        config.validate()?;

        let data_size = config.data_size;
        let node_capacity = config.node_capacity();

        let too_large = FreelistError::ArenaTooLarge { data_size };
        let internal_size = node_capacity
            .checked_mul(NODE_SIZE as u32)
            .ok_or_else(|| too_large.clone())?;
        let total_size = internal_size.checked_add(data_size).ok_or(too_large)?;

        let arena = Arena::request(total_size as usize)?;
        debug_assert_eq!(arena.len(), total_size as usize);

        // SAFETY: the arena is page aligned and its first `internal_size` bytes are
        // reserved for exactly `node_capacity` nodes. The pool lives as long as the arena.
        let nodes = unsafe { NodePool::new(arena.start(), node_capacity) };

        let mut freelist = Self {
            nodes,
            head: None,
            data_size,
            internal_size,
            total_size,
            arena,
        };
        freelist.reset_head();

        debug!(data_size, internal_size, total_size, node_capacity, "freelist created");

        Ok(freelist)
    }

    /// Finds and reserves `size` bytes, returning their offset inside the user data.
    ///
    /// The first free block big enough wins. A block of exactly `size` bytes is taken
    /// out of the list, a bigger one is shortened and the reservation is its tail.
    /// On failure nothing changes.
    pub fn reserve(&mut self, size: u32) -> Result<u32> {
        if size == 0 {
            return Err(FreelistError::ZeroSized);
        }

        let mut previous: Link = None;
        let mut current = self.head;

        while let Some(index) = current {
            let node = self.nodes[index];

            if node.size == size {
                match previous {
                    Some(previous) => self.nodes[previous].next = node.next,
                    // No previous node? It means it's the head
                    None => self.head = node.next,
                }
                self.nodes.release(index);

                trace!(offset = node.offset, size, "reserved whole free block");
                return Ok(node.offset);
            }

            if node.size > size {
                let remaining = node.size - size;
                self.nodes[index].size = remaining;

                let offset = node.offset + remaining;
                trace!(offset, size, remaining, "reserved tail of free block");
                return Ok(offset);
            }

            previous = current;
            current = node.next;
        }

        let free = self.free_size();
        debug!(requested = size, free, "no free block large enough");

        Err(FreelistError::OutOfSpace {
            requested: size,
            free,
        })
    }

    /// Gives back the range `offset..offset + size` and zeroes it.
    ///
    /// The pair must be exactly one returned by [`Freelist::reserve`] and not given back
    /// yet. Only the bounds are checked: any other in-bounds pair is accepted and
    /// silently breaks the free list.
    ///
    /// The range is merged with a free neighbour when it touches one, otherwise it takes
    /// a new node slot. When no slot is left this fails with
    /// [`FreelistError::NodeStorageExhausted`] and the range stays reserved, untouched.
    pub fn unreserve(&mut self, offset: u32, size: u32) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let end = self.check_bounds(offset, size)?;
        let placement = self.placement(offset, end);

        let placed = match placement {
            Placement::Head => {
                let index = self.nodes.acquire(offset, size)?;
                self.head = Some(index);
                index
            }
            Placement::ExtendTail(index) => {
                self.nodes[index].size += size;
                index
            }
            Placement::ExtendHead(index) => {
                let node = &mut self.nodes[index];
                node.offset = offset;
                node.size += size;
                index
            }
            Placement::Before { previous, next } => {
                let index = self.nodes.acquire(offset, size)?;
                self.nodes[index].next = Some(next);

                match previous {
                    Some(previous) => self.nodes[previous].next = Some(index),
                    None => self.head = Some(index),
                }
                index
            }
            Placement::After(last) => {
                let index = self.nodes.acquire(offset, size)?;
                self.nodes[last].next = Some(index);
                index
            }
        };

        self.data_mut()[offset as usize..end as usize].fill(0);

        trace!(offset, size, ?placement, "unreserved");

        self.coalesce_from(placed);

        Ok(())
    }

    /// Drops every reservation: zeroes the user data and goes back to a single free
    /// block covering all of it.
    pub fn clear(&mut self) {
        self.data_mut().fill(0);

        // Every slot, linked or not, goes back to the pool.
        self.head = None;
        self.nodes.reset();

        self.reset_head();

        debug!(data_size = self.data_size, "freelist cleared");
    }

    /// First free block, or `None` when every byte is reserved.
    pub fn head(&self) -> Option<NodeRef<'_>> {
        self.head.map(|index| NodeRef::new(&self.nodes, index))
    }

    /// Free blocks in ascending offset order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.nodes, self.head)
    }

    /// Address of the byte at `offset`.
    ///
    /// With `include_internal` the offset is relative to the user data, as returned by
    /// [`Freelist::reserve`]. Without it, it is relative to the start of the arena.
    /// Nothing is checked: the pointer is only meaningful for reserved offsets, and
    /// writing through any other one overrides memory reserved for something else.
    pub fn pointer_to_memory(&self, offset: u32, include_internal: bool) -> *mut u8 {
        let mut ptr = self.arena.start().as_ptr();

        if include_internal {
            ptr = ptr.wrapping_add(self.internal_size as usize);
        }

        ptr.wrapping_add(offset as usize)
    }

    /// Node storage plus user data, in bytes.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Bytes callers can reserve.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Bytes used to hold the node slots.
    pub fn internal_size(&self) -> u32 {
        self.internal_size
    }

    /// Sum of every free block, walking the whole list.
    pub fn free_size(&self) -> u32 {
        self.iter().map(|node| node.size()).sum()
    }

    /// Maximum number of free blocks that can exist at the same time.
    pub fn node_capacity(&self) -> u32 {
        self.nodes.capacity()
    }

    /// Number of free blocks right now.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Whether every byte of the user data is reserved.
    pub fn is_full(&self) -> bool {
        self.head.is_none()
    }

    /// Walks the free list and checks that it still describes a consistent set of free
    /// blocks: inside the user data, non empty, ascending, never touching, and linking
    /// every slot in use.
    pub fn check_invariants(&self) -> Result<()> {
        let corrupted = |reason: String| Err(FreelistError::Corrupted { reason });

        let mut count = 0;
        let mut previous: Option<Node> = None;
        let mut current = self.head;

        while let Some(index) = current {
            if index >= self.nodes.capacity() {
                return corrupted(format!("link to slot {index} out of range"));
            }

            count += 1;
            if count > self.nodes.capacity() as usize {
                return corrupted("free list has a cycle".to_string());
            }

            let node = self.nodes[index];

            if node.size == 0 {
                return corrupted(format!("slot {index} is linked but empty"));
            }

            if node.offset as u64 + node.size as u64 > self.data_size as u64 {
                return corrupted(format!(
                    "block at {} with size {} exceeds the user data",
                    node.offset, node.size
                ));
            }

            if let Some(previous) = previous {
                if previous.offset >= node.offset {
                    return corrupted(format!(
                        "offsets not ascending: {} then {}",
                        previous.offset, node.offset
                    ));
                }

                if previous.end() >= node.offset {
                    return corrupted(format!(
                        "blocks at {} and {} touch or overlap",
                        previous.offset, node.offset
                    ));
                }
            }

            previous = Some(node);
            current = node.next;
        }

        let in_use = self.nodes.in_use();
        if in_use != count {
            return corrupted(format!(
                "{in_use} slots in use but {count} linked in the free list"
            ));
        }

        Ok(())
    }

    pub(crate) fn data(&self) -> &[u8] {
        // SAFETY: the user data is `internal_size..total_size` of the arena, which the
        // node pool never overlaps, and the arena lives as long as `self`.
        unsafe {
            slice::from_raw_parts(
                self.pointer_to_memory(0, true),
                self.data_size as usize,
            )
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: the user data is `internal_size..total_size` of the arena, which the
        // node pool never overlaps, and the arena lives as long as `self`.
        unsafe {
            slice::from_raw_parts_mut(
                self.pointer_to_memory(0, true),
                self.data_size as usize,
            )
        }
    }

    /// Returns the end of the range if it lies inside the user data.
    fn check_bounds(&self, offset: u32, size: u32) -> Result<u32> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data_size => Ok(end),
            _ => Err(FreelistError::OutOfBounds { offset, size }),
        }
    }

    /// Single scan from the head looking for the first node the range `offset..end`
    /// touches or precedes.
    fn placement(&self, offset: u32, end: u32) -> Placement {
        let Some(mut current) = self.head else {
            return Placement::Head;
        };
        let mut previous: Link = None;

        loop {
            let node = self.nodes[current];

            // Is directly at its right? Combine them
            if node.end() == offset {
                return Placement::ExtendTail(current);
            }

            // Is directly at its left? Combine them
            if end == node.offset {
                return Placement::ExtendHead(current);
            }

            // Is somewhere on the left?
            if node.offset > offset {
                return Placement::Before {
                    previous,
                    next: current,
                };
            }

            match node.next {
                Some(next) => {
                    previous = Some(current);
                    current = next;
                }
                // Further away on the right than any node
                None => return Placement::After(current),
            }
        }
    }

    /// Merges every pair of touching blocks from `start` to the tail of the list.
    fn coalesce_from(&mut self, start: NodeIndex) {
        let mut previous = start;

        while let Some(current) = self.nodes[previous].next {
            let right = self.nodes[current];
            let left = &mut self.nodes[previous];

            if left.end() != right.offset {
                previous = current;
                continue;
            }

            left.size += right.size;
            left.next = right.next;
            self.nodes.release(current);

            trace!(
                offset = self.nodes[previous].offset,
                size = self.nodes[previous].size,
                "coalesced free blocks"
            );
        }
    }

    /// Single free block spanning the user data. Every slot must be available.
    fn reset_head(&mut self) {
        debug_assert_eq!(self.nodes.in_use(), 0);

        self.nodes[0] = Node::new(0, self.data_size);
        self.head = Some(0);
    }
}

impl<'a> IntoIterator for &'a Freelist {
    type Item = NodeRef<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Freelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Freelist")
            .field("data_size", &self.data_size)
            .field("internal_size", &self.internal_size)
            .field("total_size", &self.total_size)
            .field("free", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
