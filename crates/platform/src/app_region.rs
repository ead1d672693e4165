//! External application execution region
//!
//! External apps are copied from the SD card into a RAM window reserved for
//! them on the application (M4) core before control is transferred.
//!
//! # Memory Region Layout
//!
//! ```text
//! 0x2000_0000  ┌─────────────────────┐
//!              │  AHB SRAM (DMA)      │  32 KB
//! 0x2000_8000  ├─────────────────────┤
//!              │  External app region │  32 KB (header + UI code)
//! 0x2001_0000  └─────────────────────┘
//! ```
//!
//! See [`crate::memory_map`] for the addresses.

use core::fmt;

/// Writable region that receives external application code.
///
/// On hardware this wraps a `&'static mut [u8]` over the reserved RAM
/// window; in tests a mock records every write.
pub trait AppRegion {
    /// Error type
    type Error: core::fmt::Debug;

    /// Write bytes into the region at `offset`.
    ///
    /// Returns `Err` if `offset + data.len() > capacity()`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;

    /// Zero-fill `len` bytes starting at `offset`.
    fn zero(&mut self, offset: usize, len: usize) -> Result<(), Self::Error>;

    /// Total region capacity in bytes.
    fn capacity(&self) -> usize;

    /// Address of the first byte of the region as seen by the CPU.
    fn base_address(&self) -> usize;
}

/// Out-of-bounds access to a [`RamRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionError {
    /// Requested start offset
    pub offset: usize,
    /// Requested length
    pub len: usize,
    /// Region capacity
    pub capacity: usize,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region access {}+{} exceeds capacity {}",
            self.offset, self.len, self.capacity
        )
    }
}

/// [`AppRegion`] over a plain byte slice.
pub struct RamRegion<'a> {
    mem: &'a mut [u8],
}

impl<'a> RamRegion<'a> {
    /// Wrap `mem` as an app region.
    pub fn new(mem: &'a mut [u8]) -> Self {
        Self { mem }
    }

    /// The region contents.
    pub fn as_slice(&self) -> &[u8] {
        self.mem
    }

    fn window(&mut self, offset: usize, len: usize) -> Result<&mut [u8], RegionError> {
        let capacity = self.mem.len();
        let err = RegionError { offset, len, capacity };
        let end = offset.checked_add(len).ok_or(err)?;
        self.mem.get_mut(offset..end).ok_or(err)
    }
}

impl AppRegion for RamRegion<'_> {
    type Error = RegionError;

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        self.window(offset, data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn zero(&mut self, offset: usize, len: usize) -> Result<(), Self::Error> {
        self.window(offset, len)?.fill(0);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }

    fn base_address(&self) -> usize {
        self.mem.as_ptr() as usize
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing)] // Tests index into known-length arrays
mod tests {
    use super::*;

    #[test]
    fn write_within_bounds() {
        let mut mem = [0u8; 16];
        let mut region = RamRegion::new(&mut mem);
        region.write(4, &[1, 2, 3]).unwrap();
        assert_eq!(&region.as_slice()[3..8], &[0, 1, 2, 3, 0]);
    }

    #[test]
    fn write_past_end_is_rejected_without_partial_copy() {
        let mut mem = [0u8; 8];
        let mut region = RamRegion::new(&mut mem);
        let err = region.write(6, &[9, 9, 9]).unwrap_err();
        assert_eq!(err, RegionError { offset: 6, len: 3, capacity: 8 });
        assert_eq!(region.as_slice(), &[0u8; 8]);
    }

    #[test]
    fn zero_clears_range() {
        let mut mem = [0xAAu8; 8];
        let mut region = RamRegion::new(&mut mem);
        region.zero(2, 4).unwrap();
        assert_eq!(region.as_slice(), &[0xAA, 0xAA, 0, 0, 0, 0, 0xAA, 0xAA]);
    }

    #[test]
    fn overflowing_offset_is_rejected() {
        let mut mem = [0u8; 8];
        let mut region = RamRegion::new(&mut mem);
        assert!(region.zero(usize::MAX, 2).is_err());
    }
}
