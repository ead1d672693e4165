//! Inter-core messaging for the dual-core SDR firmware
//!
//! Both cores share one fixed memory region ([`SharedMemory`]) holding two
//! single-producer/single-consumer envelope queues, a local queue for the
//! application core's own interrupt handlers, a baseband panic slot and a
//! scratch buffer. Messages are fixed-size [`Envelope`]s; typed payloads
//! convert to and from them through [`Message`].
//!
//! # Layers
//!
//! ```text
//! EventDispatcher (event_loop)   wait for flags, drain, dispatch
//!         ↓
//! MessageRegistry (registry)     id → handlers, scoped Registration guards
//!         ↓
//! MessageQueue (queue)           lock-free SPSC ring of Envelopes
//!         ↓
//! SharedMemory (shared_memory)   region layout common to both cores
//! ```
//!
//! # Features
//!
//! - `std`: host builds (tests, tools)
//! - `defmt`: log through defmt and derive `defmt::Format`
//! - `tracing`: log through tracing on the host

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)]

// Must come first: the logging macros are used by every module below.
#[macro_use]
mod fmt;

pub mod event_loop;
pub mod message;
pub mod queue;
pub mod registry;
pub mod shared_memory;

pub use event_loop::{
    pump, DispatchOutcome, DispatchStats, Drained, EventDispatcher, EventFlags, EventMask,
    RaiseEvent,
};
pub use message::{
    AfskData, AudioSpectrum, CodedSquelch, DisplayFrameSync, DisplaySleep, Envelope, FifoSignal,
    FreqChangeCommand, GpsPosData, Message, MessageId, ModuleId, OrientationData, Payload,
    ReadyForSwitch, ReplayThreadDone, RequestKind, RequestSignal, Shutdown, StatusRefresh, Tagged,
    TxProgress, MAX_PAYLOAD,
};
pub use queue::{Consumer, MessageQueue, Outbox, Producer};
pub use registry::{MessageRegistry, Registration, RegistryFull};
pub use shared_memory::{
    ApplicationPort, BasebandPort, BasebandScratch, PanicSlot, ScratchBuffer, ScratchLease,
    ScratchOwner, SharedMemory,
};
