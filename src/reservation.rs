use crate::{error::FreelistError, freelist::Freelist, Result};

/// Receipt for a reserved range, kept by the caller until it's given back.
///
/// It is neither `Copy` nor `Clone`: [`Freelist::unreserve_record`] consumes it, so the
/// same range can't be returned twice through receipts.
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    offset: u32,
    size: u32,
}

impl Reservation {
    /// Start of the range inside the user data.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.size as usize
    }
}

impl Freelist {
    /// Same as [`Freelist::reserve`], wrapping the result in a [`Reservation`].
    pub fn reserve_record(&mut self, size: u32) -> Result<Reservation> {
        let offset = self.reserve(size)?;

        Ok(Reservation { offset, size })
    }

    /// Gives the reserved range back. On failure the receipt is handed back too, since
    /// the range is still reserved.
    pub fn unreserve_record(
        &mut self,
        reservation: Reservation,
    ) -> std::result::Result<(), (Reservation, FreelistError)> {
        match self.unreserve(reservation.offset, reservation.size) {
            Ok(()) => Ok(()),
            Err(err) => Err((reservation, err)),
        }
    }

    /// Reserved bytes behind `reservation`.
    ///
    /// # Panics
    ///
    /// If the receipt describes a range outside this arena's user data, which only
    /// happens when it comes from another [`Freelist`].
    pub fn bytes(&self, reservation: &Reservation) -> &[u8] {
        &self.data()[reservation.range()]
    }

    /// Mutable view of the reserved bytes behind `reservation`.
    ///
    /// # Panics
    ///
    /// Same as [`Freelist::bytes`].
    pub fn bytes_mut(&mut self, reservation: &Reservation) -> &mut [u8] {
        &mut self.data_mut()[reservation.range()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FreelistConfig;

    #[test]
    fn receipts_expose_their_bytes() {
        let mut freelist = Freelist::new(256).unwrap();

        let cheap = freelist.reserve_record(64).unwrap();
        let expensive = freelist.reserve_record(160).unwrap();
        assert_eq!((cheap.offset(), cheap.size()), (192, 64));
        assert_eq!((expensive.offset(), expensive.size()), (32, 160));

        freelist.bytes_mut(&cheap).copy_from_slice(&[3; 64]);
        freelist.bytes_mut(&expensive)[0] = 9;

        assert!(freelist.bytes(&cheap).iter().all(|byte| *byte == 3));
        assert_eq!(freelist.bytes(&expensive)[0], 9);
        assert_eq!(freelist.bytes(&expensive).len(), 160);

        // Views alias the raw pointer translation
        let ptr = freelist.pointer_to_memory(cheap.offset(), true);
        assert_eq!(unsafe { *ptr }, 3);

        freelist.unreserve_record(cheap).unwrap();
        freelist.unreserve_record(expensive).unwrap();
        assert_eq!(freelist.free_size(), 256);
        assert_eq!(freelist.node_count(), 1);
    }

    #[test]
    fn failed_release_returns_the_receipt() {
        let config = FreelistConfig::new(32).with_node_granularity(32);
        let mut freelist = Freelist::with_config(config).unwrap();

        let receipts: Vec<Reservation> = (0..4)
            .map(|_| freelist.reserve_record(8).unwrap())
            .collect();
        let mut receipts = receipts.into_iter();
        let r24 = receipts.next().unwrap();
        let _r16 = receipts.next().unwrap();
        let r8 = receipts.next().unwrap();
        let _r0 = receipts.next().unwrap();

        freelist.unreserve_record(r8).unwrap();

        let (receipt, err) = freelist.unreserve_record(r24).unwrap_err();
        assert_eq!(err, FreelistError::NodeStorageExhausted { capacity: 1 });
        assert_eq!(receipt.offset(), 24);
        assert_eq!(freelist.free_size(), 8);
    }

    #[test]
    fn reserve_record_propagates_errors() {
        let mut freelist = Freelist::new(16).unwrap();

        assert_eq!(
            freelist.reserve_record(17),
            Err(FreelistError::OutOfSpace {
                requested: 17,
                free: 16
            })
        );
    }
}
