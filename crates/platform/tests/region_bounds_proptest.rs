//! Property-based tests for app region bounds.
//! A write either lands entirely inside the region or touches nothing.
#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use platform::{AppRegion, RamRegion, RegionError};

proptest::proptest! {
    /// Accepted writes copy exactly `data`; rejected writes leave memory as it was.
    #[test]
    fn write_is_all_or_nothing(
        capacity in 0usize..256,
        offset in 0usize..300,
        data in proptest::collection::vec(proptest::num::u8::ANY, 0..64),
    ) {
        let mut mem = vec![0xEEu8; capacity];
        let mut region = RamRegion::new(&mut mem);
        let result = region.write(offset, &data);

        if offset + data.len() <= capacity {
            assert!(result.is_ok());
            assert_eq!(&region.as_slice()[offset..offset + data.len()], &data[..]);
        } else {
            assert_eq!(result, Err(RegionError { offset, len: data.len(), capacity }));
            assert!(region.as_slice().iter().all(|&b| b == 0xEE));
        }
    }

    /// `zero` never reaches outside the requested window.
    #[test]
    fn zero_stays_inside_window(capacity in 1usize..256, offset in 0usize..256, len in 0usize..256) {
        let mut mem = vec![0xEEu8; capacity];
        let mut region = RamRegion::new(&mut mem);
        if region.zero(offset, len).is_ok() {
            for (i, &b) in region.as_slice().iter().enumerate() {
                let inside = i >= offset && i < offset + len;
                assert_eq!(b == 0, inside, "byte {} after zero({}, {})", i, offset, len);
            }
        }
    }

    /// Offsets near `usize::MAX` are rejected, not wrapped.
    #[test]
    fn huge_offsets_are_rejected(delta in 0usize..16, len in 1usize..32) {
        let mut mem = [0u8; 32];
        let mut region = RamRegion::new(&mut mem);
        assert!(region.zero(usize::MAX - delta, len).is_err());
    }
}
