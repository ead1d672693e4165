//! Navigation settings in `SETTINGS/nav.ini`.
//!
//! Plain `key=value` lines. Keys this firmware does not know are kept and
//! written back unchanged, so settings from newer builds survive a
//! downgrade. A missing or unreadable file yields empty settings.

use core::fmt;
use core::fmt::Write as _;

use heapless::{String, Vec};
use platform::config::{AUTOSTART_KEY, MAX_SETTINGS_FILE, NAV_SETTINGS_PATH};
use platform::storage::{read_full, File, Storage};

/// Maximum key length.
pub const MAX_KEY: usize = 32;
/// Maximum value length.
pub const MAX_VALUE: usize = 64;
/// Maximum number of keys.
pub const MAX_ENTRIES: usize = 8;

/// No room for another key, or the key or value is too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsFull;

impl fmt::Display for SettingsFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("settings full")
    }
}

/// Read a small text file, keeping whole lines only.
///
/// `None` if the file is missing, unreadable or not UTF-8.
pub(crate) async fn read_text<S>(storage: &mut S, path: &str) -> Option<String<MAX_SETTINGS_FILE>>
where
    S: Storage,
    S::File: File<Error = S::Error>,
{
    let Ok(mut file) = storage.open_file(path).await else {
        debug!("{} not present, using defaults", path);
        return None;
    };
    let mut buf = [0u8; MAX_SETTINGS_FILE];
    let Ok(n) = read_full(&mut file, &mut buf).await else {
        debug!("{} unreadable, using defaults", path);
        return None;
    };
    let mut bytes = buf.get(..n)?;
    if file.size() > n as u64 {
        // Oversized: drop the partial last line.
        let end = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |p| p.saturating_add(1));
        bytes = bytes.get(..end)?;
    }
    let Ok(text) = core::str::from_utf8(bytes) else {
        debug!("{} is not UTF-8, using defaults", path);
        return None;
    };
    String::try_from(text).ok()
}

/// Parsed `nav.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavSettings {
    entries: Vec<(String<MAX_KEY>, String<MAX_VALUE>), MAX_ENTRIES>,
}

impl NavSettings {
    /// Empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse file contents. Comments (`#`, `;`), section headers and
    /// malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(['#', ';', '[']) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if settings.set(key.trim(), value.trim()).is_err() {
                debug!("nav setting dropped");
            }
        }
        settings
    }

    /// Load from [`NAV_SETTINGS_PATH`], empty on any failure.
    pub async fn load<S>(storage: &mut S) -> Self
    where
        S: Storage,
        S::File: File<Error = S::Error>,
    {
        read_text(storage, NAV_SETTINGS_PATH).await.map_or_else(Self::new, |t| Self::parse(&t))
    }

    /// Write to [`NAV_SETTINGS_PATH`].
    pub async fn save<S: Storage>(&self, storage: &mut S) -> Result<(), S::Error> {
        storage.write_file(NAV_SETTINGS_PATH, self.render().as_bytes()).await
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set `key`, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsFull> {
        if key.is_empty() {
            return Err(SettingsFull);
        }
        let value = String::try_from(value).map_err(|_| SettingsFull)?;
        if let Some((_, v)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            *v = value;
            return Ok(());
        }
        let key = String::try_from(key).map_err(|_| SettingsFull)?;
        self.entries.push((key, value)).map_err(|_| SettingsFull)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// App launched at boot, if configured.
    pub fn autostart(&self) -> Option<&str> {
        self.get(AUTOSTART_KEY).filter(|v| !v.is_empty())
    }

    /// Launch `app_id` at boot.
    pub fn set_autostart(&mut self, app_id: &str) -> Result<(), SettingsFull> {
        self.set(AUTOSTART_KEY, app_id)
    }

    /// Boot to the menu.
    pub fn clear_autostart(&mut self) {
        self.remove(AUTOSTART_KEY);
    }

    /// File contents.
    pub fn render(&self) -> String<MAX_SETTINGS_FILE> {
        let mut out = String::new();
        for (k, v) in &self.entries {
            // Cannot overflow: MAX_ENTRIES * (MAX_KEY + MAX_VALUE + 2) < MAX_SETTINGS_FILE.
            let _ = writeln!(out, "{k}={v}");
        }
        out
    }
}

#[allow(clippy::arithmetic_side_effects)]
const _: () = assert!(MAX_ENTRIES * (MAX_KEY + MAX_VALUE + 2) <= MAX_SETTINGS_FILE);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use platform::mocks::MockStorage;

    #[test]
    fn parse_skips_noise_and_keeps_unknown_keys() {
        let s = NavSettings::parse("[nav]\n# comment\nautostart_app = freqman\nbogus\nbrightness=7\n\n");
        assert_eq!(s.autostart(), Some("freqman"));
        assert_eq!(s.get("brightness"), Some("7"));
        assert_eq!(s.render().as_str(), "autostart_app=freqman\nbrightness=7\n");
    }

    #[test]
    fn set_and_clear_autostart() {
        let mut s = NavSettings::parse("theme=dark\n");
        s.set_autostart("afsk_rx").unwrap();
        assert_eq!(s.autostart(), Some("afsk_rx"));
        s.clear_autostart();
        assert_eq!(s.autostart(), None);
        assert_eq!(s.get("theme"), Some("dark"));
    }

    #[test]
    fn empty_autostart_value_means_none() {
        assert_eq!(NavSettings::parse("autostart_app=\n").autostart(), None);
    }

    #[test]
    fn overlong_values_are_refused() {
        let mut s = NavSettings::new();
        let long = "x".repeat(MAX_VALUE + 1);
        assert_eq!(s.set("k", &long), Err(SettingsFull));
        assert_eq!(s.get("k"), None);
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_fails_open() {
        let mut storage = MockStorage::new();
        assert_eq!(NavSettings::load(&mut storage).await, NavSettings::new());
        storage.insert(NAV_SETTINGS_PATH, &[0xFF, 0xFE, b'\n']);
        assert_eq!(NavSettings::load(&mut storage).await, NavSettings::new());
        storage.fail_reads(NAV_SETTINGS_PATH, 0);
        assert_eq!(NavSettings::load(&mut storage).await, NavSettings::new());
    }

    #[tokio::test]
    async fn save_then_load() {
        let mut storage = MockStorage::new();
        let mut s = NavSettings::new();
        s.set_autostart("capture").unwrap();
        s.save(&mut storage).await.unwrap();
        assert_eq!(storage.contents(NAV_SETTINGS_PATH).unwrap(), b"autostart_app=capture\n");
        assert_eq!(NavSettings::load(&mut storage).await.autostart(), Some("capture"));
    }
}
