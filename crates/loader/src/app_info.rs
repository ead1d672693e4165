//! `ApplicationInformation`: fixed header at the start of an external app.
//!
//! All multi-byte integers are little-endian.
//!
//! Layout (84 bytes total):
//! ```text
//! [0..4]   memory_location        u32   load address, rewritten on load
//! [4..8]   external_app_entry     u32   entry address (thumb bit set)
//! [8..12]  header_version         u32   must equal the loader's version
//! [12..16] app_version            u32   firmware build checksum
//! [16..32] app_name               [u8; 16]  NUL-padded UTF-8
//! [32..64] bitmap                 [u8; 32]  16x16 monochrome icon
//! [64..68] icon_color             u32   RGB565 in the low half
//! [68..72] menu_location          u32   AppLocation discriminant
//! [72..76] desired_menu_position  i32   -1 = append
//! [76..80] m4_app_tag             [u8; 4]  baseband image tag, zero = none
//! [80..84] m4_app_offset          u32   start of the baseband tail, 0 = none
//! ```

use core::fmt;

use platform::ImageTag;

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 84;

/// Length of the display-name field.
pub const APP_NAME_LEN: usize = 16;

/// Length of the icon bitmap.
pub const BITMAP_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Header decode and validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderError {
    /// Fewer than [`HEADER_SIZE`] bytes available.
    TooShort,
    /// `header_version` is not the one this loader understands.
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Version the loader accepts.
        expected: u32,
    },
    /// `menu_location` is outside [`AppLocation`].
    InvalidLocation(u32),
    /// `app_name` is not UTF-8.
    InvalidName,
    /// `m4_app_offset` points inside the header itself.
    OffsetInsideHeader(u32),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => f.write_str("header truncated"),
            Self::UnsupportedVersion { found, expected } => {
                write!(f, "unsupported header version {found} (expected {expected})")
            }
            Self::InvalidLocation(v) => write!(f, "invalid menu location {v}"),
            Self::InvalidName => f.write_str("app name is not UTF-8"),
            Self::OffsetInsideHeader(v) => write!(f, "baseband offset {v} inside header"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppLocation
// ---------------------------------------------------------------------------

/// Menu category an app is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum AppLocation {
    /// Receivers
    Rx = 0,
    /// Transmitters
    Tx = 1,
    /// Utilities
    Utilities = 2,
    /// Games
    Games = 3,
    /// Settings
    Settings = 4,
    /// Debug tools
    Debug = 5,
    /// Home screen
    Home = 6,
}

impl AppLocation {
    /// Every location in menu order.
    pub const ALL: [Self; 7] = [
        Self::Rx,
        Self::Tx,
        Self::Utilities,
        Self::Games,
        Self::Settings,
        Self::Debug,
        Self::Home,
    ];

    /// Decode a wire value.
    pub const fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Rx,
            1 => Self::Tx,
            2 => Self::Utilities,
            3 => Self::Games,
            4 => Self::Settings,
            5 => Self::Debug,
            6 => Self::Home,
            _ => return None,
        })
    }

    /// Menu title.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rx => "Receive",
            Self::Tx => "Transmit",
            Self::Utilities => "Utilities",
            Self::Games => "Games",
            Self::Settings => "Settings",
            Self::Debug => "Debug",
            Self::Home => "Home",
        }
    }
}

impl fmt::Display for AppLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ApplicationInformation
// ---------------------------------------------------------------------------

/// Decoded external app header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInformation {
    /// Address the app was linked for; rewritten with the region base on load.
    pub memory_location: u32,
    /// Entry point address.
    pub external_app_entry: u32,
    /// Header layout version.
    pub header_version: u32,
    /// Checksum of the firmware the app was built against.
    pub app_version: u32,
    /// Display name, NUL-padded.
    pub app_name: [u8; APP_NAME_LEN],
    /// Icon bitmap.
    pub bitmap: [u8; BITMAP_LEN],
    /// Icon color.
    pub icon_color: u32,
    /// Menu category.
    pub menu_location: AppLocation,
    /// Preferred index in the category, negative to append.
    pub desired_menu_position: i32,
    /// Baseband image carried in the file tail.
    pub m4_app_tag: ImageTag,
    /// Offset of the baseband tail, zero if there is none.
    pub m4_app_offset: u32,
}

impl ApplicationInformation {
    /// Encoded size.
    pub const SIZE: usize = HEADER_SIZE;

    /// Encode into the on-disk layout.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.memory_location.to_le_bytes());
        buf[4..8].copy_from_slice(&self.external_app_entry.to_le_bytes());
        buf[8..12].copy_from_slice(&self.header_version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.app_version.to_le_bytes());
        buf[16..32].copy_from_slice(&self.app_name);
        buf[32..64].copy_from_slice(&self.bitmap);
        buf[64..68].copy_from_slice(&self.icon_color.to_le_bytes());
        buf[68..72].copy_from_slice(&(self.menu_location as u32).to_le_bytes());
        buf[72..76].copy_from_slice(&self.desired_menu_position.to_le_bytes());
        buf[76..80].copy_from_slice(&self.m4_app_tag.as_bytes());
        buf[80..84].copy_from_slice(&self.m4_app_offset.to_le_bytes());
        buf
    }

    /// Decode without checking the version.
    ///
    /// Only the first [`HEADER_SIZE`] bytes of `buf` are read.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        let buf: &[u8; HEADER_SIZE] = buf
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(HeaderError::TooShort)?;
        Self::decode_fixed(buf)
    }

    /// Decode, rejecting any version other than `expected` before looking
    /// at the rest of the header.
    pub fn decode_checked(buf: &[u8], expected: u32) -> Result<Self, HeaderError> {
        let found = peek_version(buf)?;
        if found != expected {
            return Err(HeaderError::UnsupportedVersion { found, expected });
        }
        Self::decode(buf)
    }

    #[allow(clippy::indexing_slicing)] // Safety: constant ranges within a [u8; HEADER_SIZE]
    fn decode_fixed(buf: &[u8; HEADER_SIZE]) -> Result<Self, HeaderError> {
        let location = le_u32(&buf[68..72]);
        let menu_location =
            AppLocation::from_u32(location).ok_or(HeaderError::InvalidLocation(location))?;
        let m4_app_offset = le_u32(&buf[80..84]);
        if m4_app_offset != 0 && (m4_app_offset as usize) < HEADER_SIZE {
            return Err(HeaderError::OffsetInsideHeader(m4_app_offset));
        }
        let mut app_name = [0u8; APP_NAME_LEN];
        app_name.copy_from_slice(&buf[16..32]);
        if core::str::from_utf8(trim_nul(&app_name)).is_err() {
            return Err(HeaderError::InvalidName);
        }
        let mut bitmap = [0u8; BITMAP_LEN];
        bitmap.copy_from_slice(&buf[32..64]);
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&buf[76..80]);

        Ok(Self {
            memory_location: le_u32(&buf[0..4]),
            external_app_entry: le_u32(&buf[4..8]),
            header_version: le_u32(&buf[8..12]),
            app_version: le_u32(&buf[12..16]),
            app_name,
            bitmap,
            icon_color: le_u32(&buf[64..68]),
            menu_location,
            desired_menu_position: i32::from_le_bytes(le_4(&buf[72..76])),
            m4_app_tag: ImageTag::from_bytes(tag),
            m4_app_offset,
        })
    }

    /// Display name without padding.
    pub fn name(&self) -> &str {
        core::str::from_utf8(trim_nul(&self.app_name)).unwrap_or("")
    }

    /// Set the display name, truncating on a character boundary.
    pub fn set_name(&mut self, name: &str) {
        let mut end = name.len().min(APP_NAME_LEN);
        while !name.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        self.app_name = [0; APP_NAME_LEN];
        if let (Some(dst), Some(src)) = (self.app_name.get_mut(..end), name.as_bytes().get(..end)) {
            dst.copy_from_slice(src);
        }
    }

    /// Requested menu index, if any.
    pub fn desired_position(&self) -> Option<usize> {
        usize::try_from(self.desired_menu_position).ok()
    }

    /// Baseband image carried in the tail, if the file has one.
    pub fn baseband_tail(&self) -> Option<ImageTag> {
        (self.m4_app_offset != 0 && !self.m4_app_tag.is_none()).then_some(self.m4_app_tag)
    }
}

impl Default for ApplicationInformation {
    fn default() -> Self {
        Self {
            memory_location: 0,
            external_app_entry: 0,
            header_version: platform::config::CURRENT_HEADER_VERSION,
            app_version: 0,
            app_name: [0; APP_NAME_LEN],
            bitmap: [0; BITMAP_LEN],
            icon_color: 0,
            menu_location: AppLocation::Utilities,
            desired_menu_position: -1,
            m4_app_tag: ImageTag::NONE,
            m4_app_offset: 0,
        }
    }
}

/// The `header_version` field of an encoded header.
pub fn peek_version(buf: &[u8]) -> Result<u32, HeaderError> {
    buf.get(8..12).map(le_u32).ok_or(HeaderError::TooShort)
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes.get(..end).unwrap_or(bytes)
}

fn le_4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    if let Some(src) = bytes.get(..4) {
        out.copy_from_slice(src);
    }
    out
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(le_4(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing)] // Tests index into known-length arrays
mod tests {
    use super::*;

    fn sample() -> ApplicationInformation {
        let mut info = ApplicationInformation {
            external_app_entry: 0x2000_8101,
            app_version: 0xDEAD_BEEF,
            icon_color: 0xF800,
            menu_location: AppLocation::Tx,
            desired_menu_position: 3,
            m4_app_tag: ImageTag::AFSK_TX,
            m4_app_offset: 1024,
            ..ApplicationInformation::default()
        };
        info.set_name("AFSK TX");
        info.bitmap[0] = 0x81;
        info
    }

    #[test]
    fn encode_then_decode_preserves_fields() {
        let info = sample();
        let bytes = info.encode();
        assert_eq!(&bytes[76..80], b"PAFT");
        assert_eq!(ApplicationInformation::decode(&bytes).unwrap(), info);
        assert_eq!(info.name(), "AFSK TX");
        assert_eq!(info.desired_position(), Some(3));
        assert_eq!(info.baseband_tail(), Some(ImageTag::AFSK_TX));
    }

    #[test]
    fn version_is_checked_before_the_rest() {
        let mut bytes = sample().encode();
        bytes[8..12].copy_from_slice(&1u32.to_le_bytes());
        // Garbage location would fail decode; the version error must win.
        bytes[68..72].copy_from_slice(&99u32.to_le_bytes());
        assert_eq!(
            ApplicationInformation::decode_checked(&bytes, 2),
            Err(HeaderError::UnsupportedVersion { found: 1, expected: 2 })
        );
    }

    #[test]
    fn short_buffer_is_rejected() {
        let bytes = sample().encode();
        assert_eq!(
            ApplicationInformation::decode(&bytes[..HEADER_SIZE - 1]),
            Err(HeaderError::TooShort)
        );
        assert_eq!(peek_version(&bytes[..4]), Err(HeaderError::TooShort));
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let mut bytes = sample().encode();
        bytes[68..72].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(ApplicationInformation::decode(&bytes), Err(HeaderError::InvalidLocation(7)));

        let mut bytes = sample().encode();
        bytes[16] = 0xFF;
        assert_eq!(ApplicationInformation::decode(&bytes), Err(HeaderError::InvalidName));

        let mut bytes = sample().encode();
        bytes[80..84].copy_from_slice(&40u32.to_le_bytes());
        assert_eq!(ApplicationInformation::decode(&bytes), Err(HeaderError::OffsetInsideHeader(40)));
    }

    #[test]
    fn negative_position_means_append() {
        let info = ApplicationInformation::default();
        assert_eq!(info.desired_position(), None);
        assert_eq!(info.baseband_tail(), None);
    }

    #[test]
    fn long_names_truncate_on_char_boundary() {
        let mut info = ApplicationInformation::default();
        info.set_name("ééééééééé"); // 18 bytes
        assert_eq!(info.name(), "éééééééé");
    }
}
