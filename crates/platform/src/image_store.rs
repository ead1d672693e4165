//! SPI flash baseband image store abstraction
//!
//! Read-only access to the precompiled baseband (M0) DSP images stored in the
//! board's SPI flash, each identified by a four-character [`ImageTag`].
//!
//! # Flash Layout
//!
//! ```text
//! 0x1400_0000  ┌──────────────────────┐
//!              │  Application (M4)    │   firmware proper
//!              ├──────────────────────┤
//!              │  Image directory     │   [tag:4][len:4][bytes] ... [0000]
//!              │   PWFM  PNFM  PAMA   │
//!              │   PAFT  POOK  ...    │
//!              └──────────────────────┘
//! ```
//!
//! The flash is memory-mapped (SPIFI), so reads are plain loads on hardware.
//! In tests, a mock implementation returns pre-loaded bytes and counts reads.

use core::fmt;

/// Read-only image store backed by SPI flash.
pub trait ImageStore {
    /// Error type
    type Error: core::fmt::Debug;

    /// Return the size in bytes of the image for `tag`, or `None` if the
    /// store holds no such image.
    fn image_size(&self, tag: ImageTag) -> Result<Option<usize>, Self::Error>;

    /// Read up to `buf.len()` bytes of the image for `tag` into `buf`,
    /// starting at `offset` within the image.
    ///
    /// Returns the number of bytes actually read (may be less than
    /// `buf.len()` near the end of the image).
    fn read_image(&self, tag: ImageTag, offset: usize, buf: &mut [u8])
        -> Result<usize, Self::Error>;
}

/// Four-byte code naming a baseband image (`PWFM`, `PNFM`, ...).
///
/// The all-zero tag is the "none" sentinel: the current image stays resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ImageTag([u8; 4]);

impl ImageTag {
    /// No baseband image required.
    pub const NONE: Self = Self([0; 4]);

    // ── Receive ──────────────────────────────────────────────────────────────
    /// Wideband FM audio
    pub const WFM_AUDIO: Self = Self(*b"PWFM");
    /// Narrowband FM audio
    pub const NFM_AUDIO: Self = Self(*b"PNFM");
    /// AM audio
    pub const AM_AUDIO: Self = Self(*b"PAMA");
    /// AFSK receive
    pub const AFSK_RX: Self = Self(*b"PAFR");
    /// GPS simulator / receive
    pub const GPS: Self = Self(*b"PGPS");
    /// Noise reduction receive
    pub const NRR: Self = Self(*b"PNRR");
    /// Wideband spectrum
    pub const WIDEBAND_SPECTRUM: Self = Self(*b"PSPE");
    /// Baseband capture to SD
    pub const CAPTURE: Self = Self(*b"PCAP");

    // ── Transmit ─────────────────────────────────────────────────────────────
    /// AFSK transmit
    pub const AFSK_TX: Self = Self(*b"PAFT");
    /// AM transmit
    pub const AM_TX: Self = Self(*b"PAMT");
    /// OOK transmit
    pub const OOK: Self = Self(*b"POOK");
    /// Jammer
    pub const JAMMER: Self = Self(*b"PJAM");
    /// Tone generator
    pub const TONES: Self = Self(*b"PTON");
    /// Replay of captured IQ files
    pub const REPLAY: Self = Self(*b"PREP");

    /// Wrap raw tag bytes, as found in a binary header.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parse a tag string.
    ///
    /// Accepts exactly four printable (graphic) ASCII characters. The "none"
    /// sentinel has no textual form and is only reachable via
    /// [`ImageTag::NONE`] or all-zero header bytes.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().ok()?;
        if bytes.iter().all(u8::is_ascii_graphic) {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Raw tag bytes.
    pub const fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// `true` for the all-zero "no image" sentinel.
    pub const fn is_none(&self) -> bool {
        u32::from_le_bytes(self.0) == 0
    }

    /// The tag as text, or `None` if it holds non-ASCII bytes.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(u8::is_ascii_graphic) {
            core::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("none");
        }
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => {
                let [a, b, c, d] = self.0;
                write!(f, "{a:02x}{b:02x}{c:02x}{d:02x}")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn none_tag_is_distinct_from_named_tags() {
        assert!(ImageTag::NONE.is_none());
        assert!(!ImageTag::WFM_AUDIO.is_none());
        assert_eq!(ImageTag::from_bytes([0; 4]), ImageTag::NONE);
    }

    #[test]
    fn parse_rejects_wrong_lengths_and_control_bytes() {
        assert_eq!(ImageTag::parse("PNFM"), Some(ImageTag::NFM_AUDIO));
        assert_eq!(ImageTag::parse("PNF"), None);
        assert_eq!(ImageTag::parse("PNFMX"), None);
        assert_eq!(ImageTag::parse("PN M"), None);
        assert_eq!(ImageTag::parse("\0\0\0\0"), None);
        assert_eq!(ImageTag::parse("PNé"), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(ImageTag::AFSK_TX.to_string(), "PAFT");
        assert_eq!(ImageTag::NONE.to_string(), "none");
        assert_eq!(ImageTag::from_bytes([1, 2, 3, 0xff]).to_string(), "010203ff");
    }

    proptest! {
        #[test]
        fn every_parsed_tag_is_four_bytes_and_not_none(s in "[!-~]{4}") {
            let tag = ImageTag::parse(&s).unwrap();
            prop_assert_eq!(tag.as_bytes().len(), 4);
            prop_assert!(!tag.is_none());
            prop_assert_eq!(tag.as_str(), Some(s.as_str()));
        }

        #[test]
        fn other_lengths_never_parse(s in "[!-~]{0,3}|[!-~]{5,8}") {
            prop_assert!(ImageTag::parse(&s).is_none());
        }
    }
}
