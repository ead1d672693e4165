//! LPC43xx memory map for the dual-core firmware.
//!
//! | Region            | Base Address | Size   | Owner            | Use case |
//! |-------------------|-------------|--------|------------------|----------|
//! | Local SRAM 0      | 0x1000_0000 | 128 KB | application (M4) | firmware data, stacks |
//! | Baseband code     | 0x1008_0000 | 32 KB  | baseband (M0)    | active baseband image |
//! | Shared memory     | 0x1008_8000 | 16 KB  | both             | message queues, scratch |
//! | AHB SRAM          | 0x2000_0000 | 32 KB  | application (M4) | DMA buffers |
//! | External app      | 0x2000_8000 | 32 KB  | application (M4) | loaded external app |
//! | SPIFI flash       | 0x1400_0000 | 1 MB   | read-only        | firmware + baseband images |
//!
//! Both firmware images are linked against the same shared-memory address;
//! the struct placed there is `messaging::SharedMemory`.

/// A contiguous address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    /// First address of the region
    pub base: usize,
    /// Region length in bytes
    pub len: usize,
}

impl MemoryRegion {
    /// One past the last address, saturating at `usize::MAX`.
    pub const fn end(&self) -> usize {
        self.base.saturating_add(self.len)
    }

    /// `true` if `addr` lies inside the region.
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }
}

// ── Memory regions ───────────────────────────────────────────────────────────

/// Local SRAM bank 0 (application core data and stacks).
pub const LOCAL_SRAM0: MemoryRegion = MemoryRegion { base: 0x1000_0000, len: 128 * 1024 };

/// Baseband (M0) code region; receives the active baseband image.
pub const BASEBAND_CODE: MemoryRegion = MemoryRegion { base: 0x1008_0000, len: 32 * 1024 };

/// Shared memory block visible to both cores.
pub const SHARED_MEMORY: MemoryRegion = MemoryRegion { base: 0x1008_8000, len: 16 * 1024 };

/// Region receiving external application code.
pub const EXTERNAL_APP: MemoryRegion = MemoryRegion { base: 0x2000_8000, len: 32 * 1024 };

/// Memory-mapped SPI flash (SPIFI).
pub const SPIFI_FLASH: MemoryRegion = MemoryRegion { base: 0x1400_0000, len: 1024 * 1024 };

/// Offset of the baseband image directory inside [`SPIFI_FLASH`].
pub const IMAGE_DIRECTORY_OFFSET: usize = 0x0004_0000;

const _: () = assert!(BASEBAND_CODE.end() <= SHARED_MEMORY.base);
const _: () = assert!(IMAGE_DIRECTORY_OFFSET < SPIFI_FLASH.len);

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        assert!(EXTERNAL_APP.contains(0x2000_8000));
        assert!(EXTERNAL_APP.contains(0x2000_ffff));
        assert!(!EXTERNAL_APP.contains(0x2001_0000));
        assert!(!EXTERNAL_APP.contains(0x2000_7fff));
    }

    #[test]
    fn regions_do_not_overlap() {
        let regions = [LOCAL_SRAM0, BASEBAND_CODE, SHARED_MEMORY, EXTERNAL_APP, SPIFI_FLASH];
        for (i, a) in regions.iter().enumerate() {
            for b in regions.iter().skip(i + 1) {
                assert!(a.end() <= b.base || b.end() <= a.base, "{a:?} overlaps {b:?}");
            }
        }
    }
}
