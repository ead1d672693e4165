//! Baseband (M0) core control and inter-core signalling
//!
//! The application core owns the baseband core's lifecycle: it halts the
//! running image, writes a new one into the baseband code region and
//! releases the core from reset. Messages in either direction are announced
//! with a [`CoreSignal`] after they have been enqueued.

/// Control over the baseband core's execution.
///
/// On hardware this drives the LPC43xx CREG M0 memory map / reset control
/// and the shared-memory shutdown handshake. In tests a mock records calls.
pub trait BasebandCore {
    /// Error type
    type Error: core::fmt::Debug;

    /// Stop the running image, if any.
    ///
    /// Returns once the core is held in reset and its code region may be
    /// overwritten.
    fn halt(&mut self) -> Result<(), Self::Error>;

    /// Size in bytes of the baseband code region.
    fn capacity(&self) -> usize;

    /// Write `data` into the code region at `offset`.
    ///
    /// Returns `Err` if `offset + data.len() > capacity()`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;

    /// Release the core from reset; it starts at the image's reset vector.
    fn start(&mut self) -> Result<(), Self::Error>;
}

/// Wake the consumer side of a queue.
///
/// Called by a producer after the message is fully written and published.
/// Implementations must not block: they run in ISR and DSP callback context.
pub trait CoreSignal {
    /// Raise the signal.
    fn notify(&self);
}

impl<S: CoreSignal + ?Sized> CoreSignal for &S {
    fn notify(&self) {
        (**self).notify();
    }
}

/// Cross-core signal via the Cortex-M `SEV` instruction.
///
/// On the LPC43xx each core's TXEV output is routed to the other core's
/// interrupt (`M0CORE` on the M4, `M4CORE` on the M0).
#[cfg(feature = "hardware")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TxEvSignal;

#[cfg(feature = "hardware")]
impl CoreSignal for TxEvSignal {
    fn notify(&self) {
        cortex_m::asm::dsb();
        cortex_m::asm::sev();
    }
}
