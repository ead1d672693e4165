//! Hidden apps in `SETTINGS/blacklist`.
//!
//! One app id or display name per line; blank lines and lines starting with
//! `#` are ignored. A missing or unreadable file hides nothing.

use core::fmt::Write as _;

use heapless::{String, Vec};
use platform::config::{BLACKLIST_PATH, MAX_APP_NAME, MAX_BLACKLIST_ENTRIES, MAX_SETTINGS_FILE};
use platform::storage::{File, Storage};

use crate::settings::read_text;

const HEADER: &str = "# Apps hidden from the menu, one per line\n";

/// Set of hidden app names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    names: Vec<String<MAX_APP_NAME>, MAX_BLACKLIST_ENTRIES>,
}

impl Blacklist {
    /// Nothing hidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse file contents. Names longer than [`MAX_APP_NAME`] are skipped.
    pub fn parse(text: &str) -> Self {
        let mut list = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || list.contains(line) {
                continue;
            }
            let Ok(name) = String::try_from(line) else {
                debug!("blacklist entry too long");
                continue;
            };
            if list.names.push(name).is_err() {
                debug!("blacklist full, ignoring the rest");
                break;
            }
        }
        list
    }

    /// Load from [`BLACKLIST_PATH`], empty on any failure.
    pub async fn load<S>(storage: &mut S) -> Self
    where
        S: Storage,
        S::File: File<Error = S::Error>,
    {
        read_text(storage, BLACKLIST_PATH).await.map_or_else(Self::new, |t| Self::parse(&t))
    }

    /// Write to [`BLACKLIST_PATH`].
    pub async fn save<S: Storage>(&self, storage: &mut S) -> Result<(), S::Error> {
        storage.write_file(BLACKLIST_PATH, self.render().as_bytes()).await
    }

    /// `true` if `name` is listed.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// `true` if the app is hidden under either of its names.
    pub fn hides(&self, id: &str, display_name: &str) -> bool {
        self.contains(id) || self.contains(display_name)
    }

    /// Hide or unhide `name`. Returns whether it is hidden afterwards.
    ///
    /// A name that cannot be stored stays visible.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            self.names.remove(i);
            return false;
        }
        match String::try_from(name).ok().map(|s| self.names.push(s)) {
            Some(Ok(())) => true,
            _ => {
                warn!("cannot hide app, blacklist full or name too long");
                false
            }
        }
    }

    /// Hidden names, in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of hidden names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` if nothing is hidden.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// File contents.
    pub fn render(&self) -> String<MAX_SETTINGS_FILE> {
        let mut out = String::new();
        let _ = out.push_str(HEADER);
        for name in &self.names {
            let _ = writeln!(out, "{name}");
        }
        out
    }
}

#[allow(clippy::arithmetic_side_effects)]
const _: () = assert!(HEADER.len() + MAX_BLACKLIST_ENTRIES * (MAX_APP_NAME + 1) <= MAX_SETTINGS_FILE);
