//! The shared memory block both cores see at a fixed address.
//!
//! ```text
//! SharedMemory (repr(C), placed at memory_map::SHARED_MEMORY)
//! ├── application_queue   baseband → application   MessageQueue<8>
//! ├── baseband_queue      application → baseband   MessageQueue<8>
//! ├── app_local_queue     ISR → application thread MessageQueue<4>
//! ├── baseband_panic      PanicSlot (baseband writes, application reads)
//! └── scratch             ScratchBuffer (binary staging, leased)
//! ```
//!
//! Every sub-region has exactly one synchronisation rule:
//!
//! | Region            | Rule |
//! |-------------------|------|
//! | queues            | single writer per index (head: producer, tail: consumer), Release/Acquire |
//! | `baseband_panic`  | written once by the baseband, published with a Release flag |
//! | `scratch`         | owned through an atomic lease; physically disjoint from the queues |
//!
//! The block is an ordinary value: tests create one on the stack, firmware
//! places one `static` at the linker-assigned shared address and hands
//! `&SharedMemory` to every component that needs it.

use core::cell::UnsafeCell;
use core::mem::size_of;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use heapless::String;
use platform::memory_map;

use crate::queue::{Consumer, MessageQueue, Producer};

/// Depth of the baseband → application queue.
pub const APPLICATION_QUEUE_DEPTH: usize = 8;
/// Depth of the application → baseband queue.
pub const BASEBAND_QUEUE_DEPTH: usize = 8;
/// Depth of the ISR → application thread queue.
pub const LOCAL_QUEUE_DEPTH: usize = 4;
/// Size of the binary staging buffer.
pub const SCRATCH_SIZE: usize = 8 * 1024;
/// Longest baseband panic message kept, in bytes.
pub const PANIC_MESSAGE_LEN: usize = 80;

/// The shared memory block.
#[repr(C)]
pub struct SharedMemory {
    /// Baseband → application messages.
    pub application_queue: MessageQueue<APPLICATION_QUEUE_DEPTH>,
    /// Application → baseband messages.
    pub baseband_queue: MessageQueue<BASEBAND_QUEUE_DEPTH>,
    /// Interrupt handlers → application thread messages.
    pub app_local_queue: MessageQueue<LOCAL_QUEUE_DEPTH>,
    /// Panic report from the baseband core.
    pub baseband_panic: PanicSlot,
    /// Staging buffer for binary loads.
    pub scratch: ScratchBuffer,
}

const _: () = assert!(size_of::<SharedMemory>() <= memory_map::SHARED_MEMORY.len);

impl SharedMemory {
    /// A zeroed block with empty queues.
    pub const fn new() -> Self {
        Self {
            application_queue: MessageQueue::new(),
            baseband_queue: MessageQueue::new(),
            app_local_queue: MessageQueue::new(),
            baseband_panic: PanicSlot::new(),
            scratch: ScratchBuffer::new(),
        }
    }

    /// Claim the application core's queue ends.
    ///
    /// Call once at startup. Returns `None` if any end was already claimed.
    /// The local queue's producer is claimed separately by the interrupt
    /// side via `app_local_queue.producer()`.
    pub fn application_port(&self) -> Option<ApplicationPort<'_>> {
        Some(ApplicationPort {
            inbox: self.application_queue.consumer()?,
            local_inbox: self.app_local_queue.consumer()?,
            to_baseband: self.baseband_queue.producer()?,
        })
    }

    /// Claim the baseband core's queue ends.
    ///
    /// Call once at startup. Returns `None` if any end was already claimed.
    pub fn baseband_port(&self) -> Option<BasebandPort<'_>> {
        Some(BasebandPort {
            inbox: self.baseband_queue.consumer()?,
            to_application: self.application_queue.producer()?,
        })
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue ends owned by the application core.
pub struct ApplicationPort<'a> {
    /// Messages from the baseband.
    pub inbox: Consumer<'a, APPLICATION_QUEUE_DEPTH>,
    /// Messages from local interrupt handlers.
    pub local_inbox: Consumer<'a, LOCAL_QUEUE_DEPTH>,
    /// Messages to the baseband.
    pub to_baseband: Producer<'a, BASEBAND_QUEUE_DEPTH>,
}

/// Queue ends owned by the baseband core.
pub struct BasebandPort<'a> {
    /// Messages from the application.
    pub inbox: Consumer<'a, BASEBAND_QUEUE_DEPTH>,
    /// Messages to the application.
    pub to_application: Producer<'a, APPLICATION_QUEUE_DEPTH>,
}

// ---------------------------------------------------------------------------
// PanicSlot
// ---------------------------------------------------------------------------

/// One-shot panic report written by the baseband core.
#[repr(C)]
pub struct PanicSlot {
    set: AtomicBool,
    len: AtomicU32,
    message: UnsafeCell<[u8; PANIC_MESSAGE_LEN]>,
}

// SAFETY: `message` is written only while `set` is false, by the single
// baseband writer, and read only after observing `set == true` (Acquire),
// which the writer stores with Release after the last byte.
unsafe impl Sync for PanicSlot {}

impl PanicSlot {
    const fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            len: AtomicU32::new(0),
            message: UnsafeCell::new([0; PANIC_MESSAGE_LEN]),
        }
    }

    /// Record `message` (baseband core only).
    ///
    /// Only the first report is kept; it is truncated to
    /// [`PANIC_MESSAGE_LEN`] bytes on a character boundary.
    pub fn report(&self, message: &str) {
        if self.set.load(Ordering::Acquire) {
            return;
        }
        let mut end = message.len().min(PANIC_MESSAGE_LEN);
        while !message.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        let bytes = message.as_bytes().get(..end).unwrap_or(&[]);
        // SAFETY: `set` is false, so no reader looks at `message`, and the
        // baseband is the only writer.
        let dst = unsafe { &mut *self.message.get() };
        if let Some(dst) = dst.get_mut(..bytes.len()) {
            dst.copy_from_slice(bytes);
        }
        self.len.store(u32::try_from(bytes.len()).unwrap_or(0), Ordering::Relaxed);
        self.set.store(true, Ordering::Release);
    }

    /// `true` once the baseband has reported a panic.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// A copy of the reported message, if any.
    pub fn message(&self) -> Option<String<PANIC_MESSAGE_LEN>> {
        if !self.is_set() {
            return None;
        }
        let len = usize::try_from(self.len.load(Ordering::Relaxed)).unwrap_or(0);
        // SAFETY: `set` was observed true with Acquire; the writer no longer
        // touches `message`.
        let bytes = unsafe { &*self.message.get() };
        let text = core::str::from_utf8(bytes.get(..len).unwrap_or(&[])).unwrap_or("?");
        let mut out = String::new();
        let _ = out.push_str(text);
        Some(out)
    }

    /// Forget the report (application core, baseband halted).
    pub fn clear(&self) {
        self.set.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// ScratchBuffer
// ---------------------------------------------------------------------------

/// Who currently owns the scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScratchOwner {
    /// Nobody; the application may lease it.
    Free = 0,
    /// Leased by the application core (loader or message producer).
    Application = 1,
    /// Handed to the baseband core, not yet picked up.
    Baseband = 2,
    /// Being read by the baseband core.
    BasebandBusy = 3,
}

/// Staging buffer for binary images and bulk payloads.
///
/// Access goes through a lease so that at most one party touches the bytes
/// at a time:
///
/// ```text
/// Free ──lease()──▶ Application ──hand_to_baseband()──▶ Baseband
///   ▲                   │                                  │ take_for_baseband()
///   └──── drop ─────────┘                                  ▼
///   └────────────────────────── drop ─────────────── BasebandBusy
/// ```
#[repr(C)]
pub struct ScratchBuffer {
    owner: AtomicU8,
    data: UnsafeCell<[u8; SCRATCH_SIZE]>,
}

// SAFETY: `data` is only reachable through `ScratchLease` /
// `BasebandScratch`, and the `owner` state machine admits at most one of
// those at any time. Ownership changes are published with Release and
// observed with Acquire.
unsafe impl Sync for ScratchBuffer {}

impl ScratchBuffer {
    const fn new() -> Self {
        Self {
            owner: AtomicU8::new(ScratchOwner::Free as u8),
            data: UnsafeCell::new([0; SCRATCH_SIZE]),
        }
    }

    /// Current owner.
    pub fn owner(&self) -> ScratchOwner {
        match self.owner.load(Ordering::Acquire) {
            0 => ScratchOwner::Free,
            1 => ScratchOwner::Application,
            2 => ScratchOwner::Baseband,
            _ => ScratchOwner::BasebandBusy,
        }
    }

    /// Lease the buffer for the application core.
    ///
    /// Returns `None` unless the buffer is [`ScratchOwner::Free`].
    pub fn lease(&self) -> Option<ScratchLease<'_>> {
        self.transition(ScratchOwner::Free, ScratchOwner::Application)
            .then_some(ScratchLease { buf: self })
    }

    /// Pick up a buffer handed over by the application (baseband core).
    pub fn take_for_baseband(&self) -> Option<BasebandScratch<'_>> {
        self.transition(ScratchOwner::Baseband, ScratchOwner::BasebandBusy)
            .then_some(BasebandScratch { buf: self })
    }

    /// Size in bytes.
    pub const fn len(&self) -> usize {
        SCRATCH_SIZE
    }

    /// Never empty; present for API symmetry with slices.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Move `from` → `to` if the state is `from`.
    ///
    /// A critical section rather than compare-exchange keeps this usable on
    /// the M0. Each `from` state is only left by one core, so excluding the
    /// local core's interrupts is enough.
    fn transition(&self, from: ScratchOwner, to: ScratchOwner) -> bool {
        critical_section::with(|_| {
            if self.owner.load(Ordering::Acquire) == from as u8 {
                self.owner.store(to as u8, Ordering::Release);
                true
            } else {
                false
            }
        })
    }

    fn release(&self) {
        self.owner.store(ScratchOwner::Free as u8, Ordering::Release);
    }
}

/// Exclusive application-core access to the scratch buffer.
///
/// Dropping the lease frees the buffer.
pub struct ScratchLease<'a> {
    buf: &'a ScratchBuffer,
}

impl ScratchLease<'_> {
    /// The buffer contents.
    pub fn data(&self) -> &[u8] {
        // SAFETY: the lease is the unique accessor while owner == Application.
        unsafe { &*self.buf.data.get() }
    }

    /// Mutable buffer contents.
    pub fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` prevents aliasing through this lease.
        unsafe { &mut *self.buf.data.get() }
    }

    /// Publish the contents to the baseband core.
    ///
    /// The buffer stays owned by the baseband until it drops its
    /// [`BasebandScratch`].
    pub fn hand_to_baseband(self) {
        self.buf.owner.store(ScratchOwner::Baseband as u8, Ordering::Release);
        core::mem::forget(self);
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        self.buf.release();
    }
}

/// Baseband-core read access to a handed-over scratch buffer.
///
/// Dropping it frees the buffer.
pub struct BasebandScratch<'a> {
    buf: &'a ScratchBuffer,
}

impl BasebandScratch<'_> {
    /// The buffer contents.
    pub fn data(&self) -> &[u8] {
        // SAFETY: owner == BasebandBusy; the application cannot lease until
        // this handle is dropped.
        unsafe { &*self.buf.data.get() }
    }
}

impl Drop for BasebandScratch<'_> {
    fn drop(&mut self) {
        self.buf.release();
    }
}
