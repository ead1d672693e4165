//! Hardware Abstraction Layer (HAL) for the dual-core SDR firmware
//!
//! This crate provides trait-based abstractions for the hardware the
//! messaging and loading core touches, enabling development and testing
//! without the physical LPC43xx board.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Feature Layers (messaging, loader, ui)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (LPC43xx registers, SPI flash, SD card)
//! ```
//!
//! # Abstractions
//!
//! - [`Storage`] / [`File`] - removable storage as a byte-stream file API
//! - [`ImageStore`] - baseband images resident in SPI flash, keyed by [`ImageTag`]
//! - [`BasebandCore`] - halt, program and restart the baseband (M0) core
//! - [`AppRegion`] - RAM region that receives external application code
//! - [`CoreSignal`] - wake the consumer side of a queue (inter-core IRQ or ISR)
//!
//! # Features
//!
//! - `std`: Enable host implementations ([`storage_local`], [`mocks`])
//! - `hardware`: Physical hardware implementations
//! - `defmt`: Enable defmt logging

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod app_region;
pub mod baseband_core;
pub mod config;
pub mod image_store;
pub mod memory_map;
pub mod mocks;
pub mod storage;
#[cfg(feature = "std")]
pub mod storage_local;

// Re-export main high-level traits
pub use app_region::{AppRegion, RamRegion, RegionError};
pub use baseband_core::{BasebandCore, CoreSignal};
pub use image_store::{ImageStore, ImageTag};
pub use storage::{DirListing, File, FileName, Storage};
