//! LPC43xx bindings for the application core.
//!
//! Owns the statics both cores agree on and implements the platform traits
//! against real registers and memory. Interrupt vectors are wired by the
//! board support crate; they only need to call the `on_*` functions here.
//!
//! | Register            | Address       | Use |
//! |---------------------|---------------|-----|
//! | CREG `M0APPTXEVENT` | `0x4004_3400` | clear the baseband → application event |
//! | CREG `M0APPMEMMAP`  | `0x4004_3404` | baseband core shadow address (reset vector) |
//! | RGU `RESET_CTRL1`   | `0x4005_3104` | bit 24 holds the baseband core in reset |

use core::ptr;

use loader::ImageDirectory;
use messaging::{EventFlags, EventMask, SharedMemory};
use platform::memory_map::{BASEBAND_CODE, EXTERNAL_APP, IMAGE_DIRECTORY_OFFSET, SPIFI_FLASH};
use platform::{AppRegion, BasebandCore, RamRegion, RegionError};

const CREG_M0APPTXEVENT: *mut u32 = 0x4004_3400 as *mut u32;
const CREG_M0APPMEMMAP: *mut u32 = 0x4004_3404 as *mut u32;
const RGU_RESET_CTRL1: *mut u32 = 0x4005_3104 as *mut u32;
const RGU_RESET_ACTIVE_STATUS1: *const u32 = 0x4005_3154 as *const u32;
const M0APP_RST: u32 = 1 << 24;

// ---------------------------------------------------------------------------
// Statics
// ---------------------------------------------------------------------------

/// Queues, panic slot and scratch buffer. The baseband images are linked
/// against the same address.
#[link_section = ".shared_memory"]
pub static SHARED_MEMORY: SharedMemory = SharedMemory::new();

/// Pending event bits of the application loop.
pub static EVENTS: EventFlags = EventFlags::new();

/// `M0CORE` interrupt: the baseband core posted to the application queue.
pub fn on_m0core_irq() {
    // SAFETY: write-only event clear register; any value clears it.
    unsafe { ptr::write_volatile(CREG_M0APPTXEVENT, 0) };
    EVENTS.raise(EventMask::APPLICATION);
}

/// RTC one-second tick.
pub fn on_rtc_tick() {
    EVENTS.raise(EventMask::RTC_TICK);
}

/// LCD vertical sync.
pub fn on_frame_sync() {
    EVENTS.raise(EventMask::FRAME_SYNC);
}

// ---------------------------------------------------------------------------
// Baseband core
// ---------------------------------------------------------------------------

/// The M0 core, running from [`BASEBAND_CODE`].
pub struct Lpc43xxBaseband {
    code: RamRegion<'static>,
}

impl Lpc43xxBaseband {
    /// Take control of the baseband core and its code region.
    ///
    /// # Safety
    ///
    /// Call at most once. Nothing else may reference [`BASEBAND_CODE`] while
    /// the returned value exists.
    pub unsafe fn take() -> Self {
        // SAFETY: the caller guarantees exclusive access to the region,
        // which the linker script keeps free of other data.
        let code = unsafe { core::slice::from_raw_parts_mut(BASEBAND_CODE.base as *mut u8, BASEBAND_CODE.len) };
        Self { code: RamRegion::new(code) }
    }

    fn in_reset() -> bool {
        // SAFETY: read-only status register.
        unsafe { ptr::read_volatile(RGU_RESET_ACTIVE_STATUS1) & M0APP_RST == 0 }
    }
}

impl BasebandCore for Lpc43xxBaseband {
    type Error = RegionError;

    fn halt(&mut self) -> Result<(), Self::Error> {
        // SAFETY: RESET_CTRL1 only affects peripherals in its bit mask.
        unsafe { ptr::write_volatile(RGU_RESET_CTRL1, M0APP_RST) };
        // Active status bits read 0 while the reset is asserted.
        while !Self::in_reset() {
            cortex_m::asm::nop();
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.code.capacity()
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        self.code.write(offset, data)
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        #[allow(clippy::cast_possible_truncation)] // Safety: 32-bit address space
        let base = BASEBAND_CODE.base as u32;
        cortex_m::asm::dsb();
        // SAFETY: the shadow address takes effect on the next reset release.
        unsafe {
            ptr::write_volatile(CREG_M0APPMEMMAP, base);
            ptr::write_volatile(RGU_RESET_CTRL1, 0);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// The RAM window external apps are copied into.
///
/// # Safety
///
/// Call at most once; the region must not be aliased.
pub unsafe fn external_app_region() -> RamRegion<'static> {
    // SAFETY: reserved by the linker script, exclusive per the caller.
    let mem = unsafe { core::slice::from_raw_parts_mut(EXTERNAL_APP.base as *mut u8, EXTERNAL_APP.len) };
    RamRegion::new(mem)
}

/// Baseband images in memory-mapped SPI flash.
pub fn flash_images() -> ImageDirectory<'static> {
    #[allow(clippy::arithmetic_side_effects)] // Safety: offset < len, asserted in memory_map
    let (base, len) = (SPIFI_FLASH.base + IMAGE_DIRECTORY_OFFSET, SPIFI_FLASH.len - IMAGE_DIRECTORY_OFFSET);
    // SAFETY: SPIFI is mapped read-only for the lifetime of the program.
    let bytes = unsafe { core::slice::from_raw_parts(base as *const u8, len) };
    ImageDirectory::new(bytes)
}
