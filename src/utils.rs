//! Helper functions that don't particularly belong to any concrete module of the allocator.

/// It aligns `to_be_aligned` up to a multiple of `aligment`, which must be a power of two.
///
/// Used to round arena mappings up to a multiple of [`crate::kernel::page_size`].
/// Returns `None` when the rounded value does not fit in a `usize`.
pub(crate) fn align(to_be_aligned: usize, aligment: usize) -> Option<usize> {
    debug_assert!(aligment.is_power_of_two());

    to_be_aligned
        .checked_add(aligment - 1)
        .map(|value| value & !(aligment - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn align_pointer_size() {
        let aligments = vec![(1..8, 8), (9..16, 16), (17..24, 24), (25..32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), align(size, mem::size_of::<u64>()));
            }
        }
    }

    #[test]
    fn align_page_size() {
        // For testing purposes we are assuming the page size is 4096
        let aligments = vec![(1..4096, 4096), (4097..8192, 8192)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), align(size, 4096))
            }
        }
    }

    #[test]
    fn aligned_values_are_unchanged() {
        assert_eq!(Some(0), align(0, 4096));
        assert_eq!(Some(8192), align(8192, 4096));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(None, align(usize::MAX - 2, 4096));
    }
}
