//! Built-in app table. Order within a location is menu order.

use loader::AppLocation;
use platform::ImageTag;
use ui::BuiltinApp;

const fn app(
    id: &'static str,
    display_name: &'static str,
    location: AppLocation,
    icon_color: u32,
    baseband: ImageTag,
) -> BuiltinApp {
    BuiltinApp { id, display_name, location, icon_color, baseband }
}

/// Apps compiled into the firmware.
pub static BUILTIN_APPS: [BuiltinApp; 16] = [
    // Receive
    app("audio", "Audio", AppLocation::Rx, 0x07E0, ImageTag::NFM_AUDIO),
    app("wfm", "Broadcast FM", AppLocation::Rx, 0x07E0, ImageTag::WFM_AUDIO),
    app("am", "AM", AppLocation::Rx, 0x07E0, ImageTag::AM_AUDIO),
    app("afsk_rx", "AFSK", AppLocation::Rx, 0xFFE0, ImageTag::AFSK_RX),
    app("capture", "Capture", AppLocation::Rx, 0xF800, ImageTag::CAPTURE),
    app("lookingglass", "Looking Glass", AppLocation::Rx, 0x07E0, ImageTag::WIDEBAND_SPECTRUM),
    // Transmit
    app("afsk_tx", "AFSK TX", AppLocation::Tx, 0xFFE0, ImageTag::AFSK_TX),
    app("am_tx", "AM TX", AppLocation::Tx, 0xFFE0, ImageTag::AM_TX),
    app("ook", "OOK", AppLocation::Tx, 0xFFE0, ImageTag::OOK),
    app("gps", "GPS Sim", AppLocation::Tx, 0xF800, ImageTag::GPS),
    app("replay", "Replay", AppLocation::Tx, 0xFFE0, ImageTag::REPLAY),
    app("jammer", "Jammer", AppLocation::Tx, 0xF800, ImageTag::JAMMER),
    // Utilities
    app("freqman", "Freq. Manager", AppLocation::Utilities, 0xFFFF, ImageTag::NONE),
    app("appmanager", "App Manager", AppLocation::Utilities, 0xFFFF, ImageTag::NONE),
    // Settings / debug
    app("settings", "Settings", AppLocation::Settings, 0xC618, ImageTag::NONE),
    app("tones", "Tone Test", AppLocation::Debug, 0x841F, ImageTag::TONES),
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        for (i, a) in BUILTIN_APPS.iter().enumerate() {
            assert!(BUILTIN_APPS.iter().skip(i + 1).all(|b| b.id != a.id), "duplicate id {}", a.id);
        }
    }

    #[test]
    fn ids_fit_settings_values() {
        assert!(BUILTIN_APPS.iter().all(|a| a.id.len() <= ui::settings::MAX_VALUE));
    }
}
