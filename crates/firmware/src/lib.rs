//! DuoCore SDR firmware core, application side.
//!
//! Assembles the lower crates into a running system:
//!
//! ```text
//! boot() ── AppLauncher ──┬── BasebandLoader ── ImageStore + BasebandCore
//!                         ├── ExternalAppLoader ── Storage + AppRegion
//!                         └── AppRegistry / Blacklist / NavSettings
//!
//! EventDispatcher ── MessageRegistry ── ImageSwitch (ReadyForSwitch)
//! ```
//!
//! The baseband half of the message protocol lives in [`baseband_side`]; it
//! is linked into every baseband image.
//!
//! # Features
//!
//! - `hardware` - LPC43xx register bindings in [`hardware`]
//! - `native-entry` - run external apps through their header entry address
//! - `std` - host builds and tests
//! - `defmt` / `tracing` - logging backend

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod fmt;

pub mod apps;
pub mod baseband_side;
pub mod boot;
pub mod launcher;
pub mod switch;

#[cfg(feature = "hardware")]
pub mod hardware;

pub use apps::BUILTIN_APPS;
pub use baseband_side::{BasebandService, ServiceOutcome};
pub use boot::{boot, BootOutcome};
pub use launcher::{AppLauncher, LaunchError, Launched, SaveError};
pub use switch::ImageSwitch;
