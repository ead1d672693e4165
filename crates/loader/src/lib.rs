//! Baseband image and external application loading
//!
//! Two loaders share the baseband (M0) core:
//!
//! - [`BasebandLoader`] keeps the DSP pipeline on the baseband core in step
//!   with the radio mode the UI needs. Images are looked up by [`ImageTag`]
//!   in an [`ImageStore`], normally an [`ImageDirectory`] over SPI flash.
//! - [`ExternalAppLoader`] reads an application binary from removable
//!   storage, validates its [`ApplicationInformation`] header, copies the
//!   UI code into the app region, hands any trailing baseband image to the
//!   [`BasebandLoader`], and only then calls the entry point.
//!
//! ```text
//! APPS/foo.ppma
//! ┌──────────────┬────────────────────┬──────────────────────┐
//! │ header (84B) │ M4 UI payload      │ M0 baseband image    │
//! └──────────────┴────────────────────┴──────────────────────┘
//! 0              84                   m4_app_offset          EOF
//!  └──── copied to the app region ───┘└ staged on baseband ─┘
//! ```
//!
//! [`ImageTag`]: platform::ImageTag
//! [`ImageStore`]: platform::ImageStore
//!
//! # Features
//!
//! - `std`: host builds, enables [`image_directory::build`]
//! - `native-entry`: resolve the header's raw entry address on the target
//! - `defmt` / `tracing`: log output

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

#[macro_use]
mod fmt;

pub mod app_info;
pub mod baseband;
pub mod external;
pub mod image_directory;
mod io;

pub use app_info::{AppLocation, ApplicationInformation, HeaderError, HEADER_SIZE};
pub use baseband::{BasebandError, BasebandLoader, LoadOutcome, LoaderState};
pub use external::{
    read_header, AppEntry, EntryResolver, EntryTable, ExternalAppError, ExternalAppLoader,
    ExternalLaunch, LoaderConfig,
};
#[cfg(feature = "native-entry")]
pub use external::NativeEntry;
pub use image_directory::{DirectoryError, ImageDirectory};
