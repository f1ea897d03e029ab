//! Error type shared by every fallible [`crate::Freelist`] operation.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FreelistError>;

/// Everything that can go wrong while reserving or reclaiming memory.
///
/// A failed operation never leaves the allocator half-way: the free list and the
/// arena contents are exactly as they were before the call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FreelistError {
    /// No free block is large enough for the request. Free bytes may still exist,
    /// but not contiguously.
    #[error("not enough free space: requested {requested} bytes, {free} bytes free")]
    OutOfSpace {
        /// Number of bytes requested.
        requested: u32,
        /// Sum of every free block at the time of the request.
        free: u32,
    },

    /// A new free block had to be recorded but every node slot is in use. The free
    /// bytes exist, there is just no slot left to describe them.
    #[error("node storage exhausted: all {capacity} node slots are in use")]
    NodeStorageExhausted {
        /// Number of node slots in the arena.
        capacity: u32,
    },

    /// Zero-sized arenas and reservations are not representable.
    #[error("size must be greater than zero")]
    ZeroSized,

    /// The range does not lie inside the user-data region.
    #[error("range at offset {offset} with size {size} is outside the user data")]
    OutOfBounds {
        /// Start of the range, relative to the user-data region.
        offset: u32,
        /// Length of the range.
        size: u32,
    },

    /// Node storage plus user data would not fit in a `u32`.
    #[error("arena for {data_size} bytes of user data is too large")]
    ArenaTooLarge {
        /// Requested user-data size.
        data_size: u32,
    },

    /// The operating system refused to hand out the arena.
    #[error("failed to request {len} bytes from the operating system")]
    MemoryUnavailable {
        /// Mapping length that was requested.
        len: usize,
    },

    /// The configuration can't be used to build an arena.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The free list no longer describes a consistent set of free blocks.
    #[error("free list corrupted: {reason}")]
    Corrupted {
        /// Which invariant was broken, and where.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = FreelistError::OutOfSpace {
            requested: 160,
            free: 64,
        };
        assert_eq!(
            err.to_string(),
            "not enough free space: requested 160 bytes, 64 bytes free"
        );

        let err = FreelistError::NodeStorageExhausted { capacity: 8 };
        assert_eq!(
            err.to_string(),
            "node storage exhausted: all 8 node slots are in use"
        );
    }
}
