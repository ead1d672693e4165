//! Application event loop and the receiving half of the core bridge.
//!
//! Producers publish into a queue and then raise a bit in [`EventFlags`]
//! (directly for local interrupts, from the inter-core IRQ handler for the
//! baseband). The [`EventDispatcher`] waits for bits, drains the matching
//! queues in FIFO order and hands every decoded message to the registry.
//! Handlers run to completion; the loop only suspends while waiting for
//! flags.
//!
//! ```text
//! baseband core ──push──▶ application_queue ──┐
//!      └──SEV──▶ M0CORE IRQ ──raise(APPLICATION)┤
//! ISR ──push──▶ app_local_queue ──raise(LOCAL)──┤
//! RTC ISR ──raise(RTC_TICK)─────────────────────┤
//! LCD vsync ISR ──raise(FRAME_SYNC)─────────────┴──▶ EventDispatcher ──▶ MessageRegistry
//! ```

use core::cell::Cell;
use core::ops::BitOr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::String;
use platform::CoreSignal;

use crate::message::{DisplayFrameSync, Message, StatusRefresh};
use crate::queue::Consumer;
use crate::registry::MessageRegistry;
use crate::shared_memory::{
    PanicSlot, APPLICATION_QUEUE_DEPTH, LOCAL_QUEUE_DEPTH, PANIC_MESSAGE_LEN,
};

// ---------------------------------------------------------------------------
// EventMask / EventFlags
// ---------------------------------------------------------------------------

/// Set of pending event sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventMask(u32);

impl EventMask {
    /// Nothing pending.
    pub const NONE: Self = Self(0);
    /// The baseband posted to `application_queue`.
    pub const APPLICATION: Self = Self(1 << 0);
    /// An interrupt handler posted to `app_local_queue`.
    pub const LOCAL: Self = Self(1 << 1);
    /// RTC one-second tick.
    pub const RTC_TICK: Self = Self(1 << 2);
    /// LCD frame sync.
    pub const FRAME_SYNC: Self = Self(1 << 3);
    /// Leave the event loop.
    pub const SHUTDOWN: Self = Self(1 << 31);

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Pending-event bits plus a wakeup for the event loop.
///
/// `raise` is safe to call from interrupt context and never blocks.
pub struct EventFlags {
    pending: Mutex<CriticalSectionRawMutex, Cell<u32>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl EventFlags {
    /// No events pending.
    pub const fn new() -> Self {
        Self { pending: Mutex::new(Cell::new(0)), wake: Signal::new() }
    }

    /// Mark `mask` pending and wake the loop.
    pub fn raise(&self, mask: EventMask) {
        self.pending.lock(|p| p.set(p.get() | mask.bits()));
        self.wake.signal(());
    }

    /// Take and clear everything pending.
    pub fn take(&self) -> EventMask {
        EventMask(self.pending.lock(|p| p.replace(0)))
    }

    /// Wait until at least one event is pending, then take them all.
    pub async fn wait(&self) -> EventMask {
        loop {
            let mask = self.take();
            if !mask.is_empty() {
                return mask;
            }
            self.wake.wait().await;
        }
    }

    /// A [`CoreSignal`] that raises `mask` on these flags.
    pub fn signal(&self, mask: EventMask) -> RaiseEvent<'_> {
        RaiseEvent { flags: self, mask }
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// [`CoreSignal`] raising a fixed mask on an [`EventFlags`].
pub struct RaiseEvent<'a> {
    flags: &'a EventFlags,
    mask: EventMask,
}

impl CoreSignal for RaiseEvent<'_> {
    fn notify(&self) {
        self.flags.raise(self.mask);
    }
}

// ---------------------------------------------------------------------------
// Queue pump
// ---------------------------------------------------------------------------

/// Result of draining one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drained {
    /// Messages handed to the registry.
    pub dispatched: u32,
    /// Envelopes with an unknown id or malformed payload.
    pub malformed: u32,
    /// The queue still held envelopes when the limit was reached.
    pub more: bool,
}

/// Dispatch up to `limit` envelopes from `inbox`, oldest first.
///
/// Envelopes that do not decode are skipped: no handler can be subscribed
/// to an id outside the enumeration.
pub fn pump<const Q: usize, const N: usize>(
    inbox: &Consumer<'_, Q>,
    registry: &MessageRegistry<'_, Message, N>,
    limit: usize,
) -> Drained {
    let mut drained = Drained::default();
    for _ in 0..limit {
        let Some(envelope) = inbox.pop() else {
            return drained;
        };
        match Message::from_envelope(&envelope) {
            Some(message) => {
                registry.dispatch(&message);
                drained.dispatched = drained.dispatched.wrapping_add(1);
            }
            None => {
                debug!("ignoring envelope with unknown id {}", envelope.id());
                drained.malformed = drained.malformed.wrapping_add(1);
            }
        }
    }
    drained.more = !inbox.is_empty();
    drained
}

// ---------------------------------------------------------------------------
// EventDispatcher
// ---------------------------------------------------------------------------

/// What the loop should do after a dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// Keep waiting for events.
    Continue,
    /// `SHUTDOWN` was raised.
    Shutdown,
    /// The baseband reported a panic; nothing more is dispatched.
    Halted,
}

/// Running totals kept by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Messages handed to the registry.
    pub dispatched: u32,
    /// Envelopes dropped at decode.
    pub malformed: u32,
}

/// The application core's event loop.
pub struct EventDispatcher<'a, 'h, const N: usize> {
    registry: &'a MessageRegistry<'h, Message, N>,
    flags: &'a EventFlags,
    inbox: Consumer<'a, APPLICATION_QUEUE_DEPTH>,
    local_inbox: Consumer<'a, LOCAL_QUEUE_DEPTH>,
    baseband_panic: &'a PanicSlot,
    halted: bool,
    stats: DispatchStats,
}

impl<'a, 'h, const N: usize> EventDispatcher<'a, 'h, N> {
    /// Create a dispatcher over the application core's inbound queues.
    pub fn new(
        registry: &'a MessageRegistry<'h, Message, N>,
        flags: &'a EventFlags,
        inbox: Consumer<'a, APPLICATION_QUEUE_DEPTH>,
        local_inbox: Consumer<'a, LOCAL_QUEUE_DEPTH>,
        baseband_panic: &'a PanicSlot,
    ) -> Self {
        Self {
            registry,
            flags,
            inbox,
            local_inbox,
            baseband_panic,
            halted: false,
            stats: DispatchStats::default(),
        }
    }

    /// Handle one set of pending events.
    ///
    /// Sources are served in a fixed order: baseband queue, local queue,
    /// RTC tick, frame sync. Each queue is drained up to its capacity per
    /// pass; if more arrived meanwhile the bit is raised again so the next
    /// pass continues without starving the other sources.
    pub fn dispatch(&mut self, mask: EventMask) -> DispatchOutcome {
        if self.check_halt() {
            return DispatchOutcome::Halted;
        }

        if mask.contains(EventMask::APPLICATION) {
            let drained = pump(&self.inbox, self.registry, APPLICATION_QUEUE_DEPTH);
            self.account(drained, EventMask::APPLICATION);
        }
        if mask.contains(EventMask::LOCAL) {
            let drained = pump(&self.local_inbox, self.registry, LOCAL_QUEUE_DEPTH);
            self.account(drained, EventMask::LOCAL);
        }
        if mask.contains(EventMask::RTC_TICK) {
            self.emit(&StatusRefresh.into());
        }
        if mask.contains(EventMask::FRAME_SYNC) {
            self.emit(&DisplayFrameSync.into());
        }

        if mask.contains(EventMask::SHUTDOWN) {
            DispatchOutcome::Shutdown
        } else {
            DispatchOutcome::Continue
        }
    }

    /// Wait for events and dispatch them until shutdown or halt.
    pub async fn run(&mut self) -> DispatchOutcome {
        info!("event loop running");
        loop {
            let mask = self.flags.wait().await;
            match self.dispatch(mask) {
                DispatchOutcome::Continue => {}
                outcome => return outcome,
            }
        }
    }

    /// Totals so far.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// `true` after a baseband panic was observed.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The baseband's panic message, once halted.
    pub fn panic_message(&self) -> Option<String<PANIC_MESSAGE_LEN>> {
        if self.halted {
            self.baseband_panic.message()
        } else {
            None
        }
    }

    fn check_halt(&mut self) -> bool {
        if !self.halted && self.baseband_panic.is_set() {
            if let Some(message) = self.baseband_panic.message() {
                error!("baseband panic: {}", message.as_str());
            }
            self.halted = true;
        }
        self.halted
    }

    fn emit(&mut self, message: &Message) {
        self.registry.dispatch(message);
        self.stats.dispatched = self.stats.dispatched.wrapping_add(1);
    }

    fn account(&mut self, drained: Drained, source: EventMask) {
        self.stats.dispatched = self.stats.dispatched.wrapping_add(drained.dispatched);
        self.stats.malformed = self.stats.malformed.wrapping_add(drained.malformed);
        if drained.more {
            self.flags.raise(source);
        }
    }
}
