use std::mem;

use crate::error::{FreelistError, Result};

/// Parameters used to size a [`crate::Freelist`] arena.
///
/// The node granularity is the smallest free block size the node storage is
/// dimensioned for: the arena reserves one node slot per `node_granularity` bytes of
/// user data. It's a cap, not a physical limit, since free blocks can be smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreelistConfig {
    /// Bytes available to callers.
    pub data_size: u32,
    /// User-data bytes per node slot.
    pub node_granularity: u32,
}

impl FreelistConfig {
    /// Configuration for `data_size` bytes of user data with one node slot per
    /// pointer-sized chunk.
    pub const fn new(data_size: u32) -> Self {
        Self {
            data_size,
            node_granularity: mem::size_of::<usize>() as u32,
        }
    }

    /// Sets how many user-data bytes back one node slot.
    pub const fn with_node_granularity(mut self, node_granularity: u32) -> Self {
        self.node_granularity = node_granularity;
        self
    }

    /// Rejects a zero data size or a zero granularity.
    pub fn validate(&self) -> Result<()> {
        if self.data_size == 0 {
            return Err(FreelistError::ZeroSized);
        }

        if self.node_granularity == 0 {
            return Err(FreelistError::InvalidConfig {
                reason: "node granularity must be greater than zero",
            });
        }

        Ok(())
    }

    /// Number of node slots to carve out of the arena. Always at least one, so the
    /// initial free block can be described.
    pub fn node_capacity(&self) -> u32 {
        std::cmp::max(self.data_size / self.node_granularity, 1)
    }
}
