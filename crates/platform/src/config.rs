//! Firmware configuration and constants
//!
//! This module defines central configuration values used across the
//! firmware. File locations, protocol versions and buffer sizes should
//! reference these constants rather than hardcoding values.

/// The firmware name
pub const FIRMWARE_NAME: &str = "DuoCore SDR";

/// Firmware version (synchronized with Cargo.toml)
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── SD card layout ───────────────────────────────────────────────────────────

/// Directory holding persisted settings.
pub const SETTINGS_DIR: &str = "SETTINGS";

/// Hidden-app list, one app name per line.
pub const BLACKLIST_PATH: &str = "SETTINGS/blacklist";

/// Navigation settings (`key=value` lines), holds the autostart app.
pub const NAV_SETTINGS_PATH: &str = "SETTINGS/nav.ini";

/// Settings key naming the app launched at boot.
pub const AUTOSTART_KEY: &str = "autostart_app";

/// Directory scanned for external apps.
pub const APPS_DIR: &str = "APPS";

/// File extension of external app binaries.
pub const EXTERNAL_APP_EXTENSION: &str = "ppma";

// ── External app protocol ────────────────────────────────────────────────────

/// Header layout version understood by this firmware's loader.
pub const CURRENT_HEADER_VERSION: u32 = 2;

/// Copy granularity when loading binaries (one SD sector).
pub const LOAD_CHUNK_SIZE: usize = 512;

/// Storage reads slower than this abort a load.
pub const LOAD_READ_TIMEOUT_MS: u64 = 2_000;

// ── Capacities ───────────────────────────────────────────────────────────────

/// Maximum number of hidden apps.
pub const MAX_BLACKLIST_ENTRIES: usize = 32;

/// Maximum length of an app name in the blacklist or settings.
pub const MAX_APP_NAME: usize = 32;

/// Maximum number of external apps listed in the menu.
pub const MAX_EXTERNAL_APPS: usize = 32;

/// Maximum size of a settings file read into RAM.
pub const MAX_SETTINGS_FILE: usize = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_files_live_in_settings_dir() {
        assert!(BLACKLIST_PATH.starts_with(SETTINGS_DIR));
        assert!(NAV_SETTINGS_PATH.starts_with(SETTINGS_DIR));
    }

    #[test]
    fn chunk_is_a_whole_sector() {
        assert_eq!(LOAD_CHUNK_SIZE % 512, 0);
    }
}
