//! Application UI layer: navigation state, app registry, persisted menu settings.
//!
//! This crate is `no_std` by default; it only uses `core` + `heapless`.
//!
//! - [`Navigator`]: bounded stack of [`Screen`]s
//! - [`AppRegistry`]: built-in app table plus external apps scanned from storage
//! - [`Blacklist`]: apps hidden from the menu
//! - [`NavSettings`]: `nav.ini`, including the autostart app

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod fmt;

pub mod app_registry;
pub mod blacklist;
pub mod navigation;
pub mod screen;
pub mod settings;

pub use app_registry::{AppKey, AppRegistry, BuiltinApp, ExternalApp, ExternalApps, Menu};
pub use blacklist::Blacklist;
pub use navigation::Navigator;
pub use screen::Screen;
pub use settings::{NavSettings, SettingsFull};
