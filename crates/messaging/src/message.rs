//! Message kinds, payloads and the cross-core envelope.
//!
//! Every message is one variant of the [`Message`] sum type. Crossing the
//! core boundary, a message travels as an [`Envelope`]: a numeric id plus
//! its payload encoded little-endian, field by field, into a fixed buffer.
//! Envelopes contain only plain integers, so any bit pattern the other core
//! writes is a valid `Envelope`; validation happens in
//! [`Message::from_envelope`], which rejects unknown ids and malformed
//! payloads.
//!
//! Both cores must be rebuilt together when a payload layout changes: there
//! is no version field on the wire.

use core::fmt;

/// Largest encoded payload in bytes.
pub const MAX_PAYLOAD: usize = 256;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wire form of a message as stored in a shared-memory queue slot.
///
/// Layout (`repr(C)`, 264 bytes):
/// ```text
/// [0..4]     id       u32   MessageId discriminant
/// [4..8]     len      u32   encoded payload length
/// [8..264]   payload  [u8; MAX_PAYLOAD]
/// ```
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Envelope {
    id: u32,
    len: u32,
    payload: [u8; MAX_PAYLOAD],
}

impl Envelope {
    /// An envelope with id 0 and no payload.
    pub const EMPTY: Self = Self { id: 0, len: 0, payload: [0; MAX_PAYLOAD] };

    /// Build an envelope from raw parts, as a foreign producer would.
    ///
    /// Bytes beyond [`MAX_PAYLOAD`] are dropped.
    pub fn from_raw(id: u32, payload: &[u8]) -> Self {
        let mut envelope = Self::EMPTY;
        envelope.id = id;
        let n = payload.len().min(MAX_PAYLOAD);
        if let (Some(dst), Some(src)) = (envelope.payload.get_mut(..n), payload.get(..n)) {
            dst.copy_from_slice(src);
        }
        envelope.len = u32::try_from(n).unwrap_or(0);
        envelope
    }

    /// Raw message id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Encoded payload bytes, clamped to the buffer.
    pub fn payload(&self) -> &[u8] {
        let len = usize::try_from(self.len).unwrap_or(MAX_PAYLOAD).min(MAX_PAYLOAD);
        self.payload.get(..len).unwrap_or(&[])
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("id", &self.id).field("len", &self.len).finish()
    }
}

// ---------------------------------------------------------------------------
// Little-endian field codec
// ---------------------------------------------------------------------------

/// Sequential little-endian writer over a payload buffer.
///
/// Every payload's `SIZE` is checked against [`MAX_PAYLOAD`] at compile time,
/// so writes never run past the buffer.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, bytes: &[u8]) {
        let end = self.pos.saturating_add(bytes.len());
        if let Some(dst) = self.buf.get_mut(self.pos..end) {
            dst.copy_from_slice(bytes);
            self.pos = end;
        }
    }

    /// Append a `u8`.
    pub fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    /// Append a `bool` as one byte.
    pub fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    /// Append a `u16`.
    pub fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    /// Append an `i16`.
    pub fn i16(&mut self, v: i16) {
        self.bytes(&v.to_le_bytes());
    }

    /// Append a `u32`.
    pub fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    /// Append an `i32`.
    pub fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    /// Append an `i64`.
    pub fn i64(&mut self, v: i64) {
        self.bytes(&v.to_le_bytes());
    }

    /// Append an `f32`.
    pub fn f32(&mut self, v: f32) {
        self.bytes(&v.to_le_bytes());
    }
}

/// Sequential little-endian reader over a payload buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Take the next `N` bytes.
    pub fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.buf.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    /// Read a `u8`.
    pub fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }

    /// Read a `bool`; any byte other than 0 or 1 is malformed.
    pub fn bool(&mut self) -> Option<bool> {
        match self.u8()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    /// Read a `u16`.
    pub fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    /// Read an `i16`.
    pub fn i16(&mut self) -> Option<i16> {
        self.array().map(i16::from_le_bytes)
    }

    /// Read a `u32`.
    pub fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    /// Read an `i32`.
    pub fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_le_bytes)
    }

    /// Read an `i64`.
    pub fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_le_bytes)
    }

    /// Read an `f32`.
    pub fn f32(&mut self) -> Option<f32> {
        self.array().map(f32::from_le_bytes)
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// A fixed-layout message payload.
pub trait Payload: Sized {
    /// The message id this payload travels under.
    const ID: MessageId;
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode the fields in declaration order.
    fn encode(&self, w: &mut Writer<'_>);

    /// Decode the fields in declaration order.
    fn decode(r: &mut Reader<'_>) -> Option<Self>;
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

macro_rules! unit_payloads {
    ($($(#[$doc:meta])* $name:ident,)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            #[cfg_attr(feature = "defmt", derive(defmt::Format))]
            pub struct $name;

            impl Payload for $name {
                const ID: MessageId = MessageId::$name;
                const SIZE: usize = 0;

                fn encode(&self, _w: &mut Writer<'_>) {}

                fn decode(_r: &mut Reader<'_>) -> Option<Self> {
                    Some(Self)
                }
            }
        )*
    };
}

unit_payloads! {
    /// LCD vertical sync; drives frame-paced UI work.
    DisplayFrameSync,
    /// Periodic status refresh (RTC tick).
    StatusRefresh,
    /// Stop the running baseband image.
    Shutdown,
    /// The baseband core has stopped and may be reprogrammed.
    ReadyForSwitch,
    /// Backlight and display are about to sleep.
    DisplaySleep,
}

/// Baseband FIFO event, discriminated by `signal_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FifoSignal {
    /// Producer-defined discriminant
    pub signal_type: u8,
}

impl Payload for FifoSignal {
    const ID: MessageId = MessageId::FifoSignal;
    const SIZE: usize = 1;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u8(self.signal_type);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { signal_type: r.u8()? })
    }
}

/// Number of samples in one [`AfskData`] block.
pub const AFSK_BLOCK_SAMPLES: usize = 128;

/// A block of AFSK samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AfskData {
    /// Signed 16-bit samples
    pub samples: [i16; AFSK_BLOCK_SAMPLES],
}

impl Default for AfskData {
    fn default() -> Self {
        Self { samples: [0; AFSK_BLOCK_SAMPLES] }
    }
}

impl Payload for AfskData {
    const ID: MessageId = MessageId::AfskData;
    const SIZE: usize = AFSK_BLOCK_SAMPLES * 2;

    fn encode(&self, w: &mut Writer<'_>) {
        for &s in &self.samples {
            w.i16(s);
        }
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        let mut samples = [0i16; AFSK_BLOCK_SAMPLES];
        for s in &mut samples {
            *s = r.i16()?;
        }
        Some(Self { samples })
    }
}

/// Transmit progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxProgress {
    /// Units sent so far (producer-defined: bytes, repeats, percent)
    pub progress: u32,
    /// Transmission finished
    pub done: bool,
}

impl Payload for TxProgress {
    const ID: MessageId = MessageId::TxProgress;
    const SIZE: usize = 5;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u32(self.progress);
        w.bool(self.done);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { progress: r.u32()?, done: r.bool()? })
    }
}

/// The replay thread finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReplayThreadDone {
    /// Zero on success, otherwise a replay error code
    pub return_code: u32,
}

impl Payload for ReplayThreadDone {
    const ID: MessageId = MessageId::ReplayThreadDone;
    const SIZE: usize = 4;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u32(self.return_code);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { return_code: r.u32()? })
    }
}

/// What a [`RequestSignal`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RequestKind {
    /// The baseband needs more samples in its TX buffer
    FillRequest = 1,
    /// Stop the beep tone
    BeepStopRequest = 2,
    /// Capture thread has filled a buffer
    CaptureReady = 3,
}

impl RequestKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::FillRequest),
            2 => Some(Self::BeepStopRequest),
            3 => Some(Self::CaptureReady),
            _ => None,
        }
    }
}

/// A request from the baseband core to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestSignal {
    /// The request
    pub signal: RequestKind,
}

impl Payload for RequestSignal {
    const ID: MessageId = MessageId::RequestSignal;
    const SIZE: usize = 1;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u8(self.signal as u8);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { signal: RequestKind::from_u8(r.u8()?)? })
    }
}

/// Number of bins in an [`AudioSpectrum`] snapshot.
pub const SPECTRUM_BINS: usize = 128;

/// Audio spectrum snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioSpectrum {
    /// Bin magnitudes in dB (0 = floor)
    pub db: [u8; SPECTRUM_BINS],
    /// Sampling rate the bins were computed at
    pub sampling_rate: u32,
}

impl Default for AudioSpectrum {
    fn default() -> Self {
        Self { db: [0; SPECTRUM_BINS], sampling_rate: 0 }
    }
}

impl Payload for AudioSpectrum {
    const ID: MessageId = MessageId::AudioSpectrum;
    const SIZE: usize = SPECTRUM_BINS + 4;

    fn encode(&self, w: &mut Writer<'_>) {
        w.bytes(&self.db);
        w.u32(self.sampling_rate);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { db: r.array()?, sampling_rate: r.u32()? })
    }
}

/// Retune request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqChangeCommand {
    /// Target frequency in Hz
    pub frequency_hz: i64,
}

impl Payload for FreqChangeCommand {
    const ID: MessageId = MessageId::FreqChangeCommand;
    const SIZE: usize = 8;

    fn encode(&self, w: &mut Writer<'_>) {
        w.i64(self.frequency_hz);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { frequency_hz: r.i64()? })
    }
}

/// Decoded CTCSS / DCS squelch code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodedSquelch {
    /// Code value
    pub value: u32,
}

impl Payload for CodedSquelch {
    const ID: MessageId = MessageId::CodedSquelch;
    const SIZE: usize = 4;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u32(self.value);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { value: r.u32()? })
    }
}

/// GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsPosData {
    /// Degrees, north positive
    pub latitude: f32,
    /// Degrees, east positive
    pub longitude: f32,
    /// Metres above sea level
    pub altitude: i32,
    /// km/h
    pub speed: i32,
    /// Satellites used in the fix
    pub satellites: u8,
}

impl Payload for GpsPosData {
    const ID: MessageId = MessageId::GpsPosData;
    const SIZE: usize = 17;

    fn encode(&self, w: &mut Writer<'_>) {
        w.f32(self.latitude);
        w.f32(self.longitude);
        w.i32(self.altitude);
        w.i32(self.speed);
        w.u8(self.satellites);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self {
            latitude: r.f32()?,
            longitude: r.f32()?,
            altitude: r.i32()?,
            speed: r.i32()?,
            satellites: r.u8()?,
        })
    }
}

/// Compass / tilt reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OrientationData {
    /// Heading in degrees, 0..360
    pub angle: u16,
    /// Tilt in degrees
    pub tilt: i16,
}

impl Payload for OrientationData {
    const ID: MessageId = MessageId::OrientationData;
    const SIZE: usize = 4;

    fn encode(&self, w: &mut Writer<'_>) {
        w.u16(self.angle);
        w.i16(self.tilt);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { angle: r.u16()?, tilt: r.i16()? })
    }
}

/// Baseband image identification.
///
/// The application sends it with `query = true`; the baseband answers with
/// `query = false` and the signature of the running image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleId {
    /// Request (true) or reply (false)
    pub query: bool,
    /// MD5 signature of the running image
    pub signature: [u8; 16],
}

impl Payload for ModuleId {
    const ID: MessageId = MessageId::ModuleId;
    const SIZE: usize = 17;

    fn encode(&self, w: &mut Writer<'_>) {
        w.bool(self.query);
        w.bytes(&self.signature);
    }

    fn decode(r: &mut Reader<'_>) -> Option<Self> {
        Some(Self { query: r.bool()?, signature: r.array()? })
    }
}

// ---------------------------------------------------------------------------
// Message sum type
// ---------------------------------------------------------------------------

macro_rules! messages {
    ($($name:ident = $value:literal,)*) => {
        /// Closed enumeration of message ids.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u32)]
        pub enum MessageId {
            $(
                #[allow(missing_docs)]
                $name = $value,
            )*
        }

        impl MessageId {
            /// Every id, in discriminant order.
            pub const ALL: &'static [MessageId] = &[$(MessageId::$name,)*];

            /// Map a raw id; values outside the enumeration yield `None`.
            pub const fn from_u32(raw: u32) -> Option<Self> {
                match raw {
                    $($value => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// Variant name, for logs.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }
        }

        /// A message: one variant per [`MessageId`].
        #[derive(Debug, Clone, Copy, PartialEq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[allow(missing_docs)]
        pub enum Message {
            $($name($name),)*
        }

        impl Message {
            /// The id of this message.
            pub const fn id(&self) -> MessageId {
                match self {
                    $(Self::$name(_) => MessageId::$name,)*
                }
            }

            /// Encode into the wire form.
            pub fn to_envelope(&self) -> Envelope {
                let mut envelope = Envelope::EMPTY;
                envelope.id = self.id() as u32;
                let mut w = Writer::new(&mut envelope.payload);
                match self {
                    $(Self::$name(p) => p.encode(&mut w),)*
                }
                envelope.len = u32::try_from(w.pos).unwrap_or(0);
                envelope
            }

            /// Decode the wire form.
            ///
            /// Returns `None` for an id outside the enumeration or a payload
            /// whose length or field values do not match the id's layout.
            pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
                let id = MessageId::from_u32(envelope.id)?;
                let mut r = Reader::new(envelope.payload());
                let message = match id {
                    $(MessageId::$name => Self::$name($name::decode(&mut r)?),)*
                };
                r.is_exhausted().then_some(message)
            }
        }

        $(
            impl From<$name> for Message {
                fn from(p: $name) -> Self {
                    Self::$name(p)
                }
            }

            const _: () = assert!(<$name as Payload>::SIZE <= MAX_PAYLOAD);
        )*
    };
}

messages! {
    DisplayFrameSync = 0,
    FifoSignal = 1,
    AfskData = 2,
    TxProgress = 3,
    ReplayThreadDone = 4,
    RequestSignal = 5,
    AudioSpectrum = 6,
    FreqChangeCommand = 7,
    CodedSquelch = 8,
    GpsPosData = 9,
    OrientationData = 10,
    StatusRefresh = 11,
    Shutdown = 12,
    ReadyForSwitch = 13,
    ModuleId = 14,
    DisplaySleep = 15,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something carrying a routing key, dispatchable through a
/// [`MessageRegistry`](crate::registry::MessageRegistry).
pub trait Tagged {
    /// Routing key type
    type Id: Copy + PartialEq;

    /// The routing key of this value.
    fn id(&self) -> Self::Id;
}

impl Tagged for Message {
    type Id = MessageId;

    fn id(&self) -> MessageId {
        Message::id(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_consecutive_and_round_trip() {
        for (i, id) in MessageId::ALL.iter().enumerate() {
            assert_eq!(*id as u32, u32::try_from(i).unwrap());
            assert_eq!(MessageId::from_u32(*id as u32), Some(*id));
        }
        assert_eq!(MessageId::from_u32(MessageId::ALL.len() as u32), None);
        assert_eq!(MessageId::from_u32(u32::MAX), None);
    }

    #[test]
    fn tx_progress_layout_is_little_endian() {
        let envelope = Message::from(TxProgress { progress: 0x0102_0304, done: true }).to_envelope();
        assert_eq!(envelope.id(), 3);
        assert_eq!(envelope.payload(), &[4, 3, 2, 1, 1]);
    }

    #[test]
    fn payload_sizes_match_encoding() {
        let cases: [(Message, usize); 4] = [
            (AfskData::default().into(), AfskData::SIZE),
            (AudioSpectrum::default().into(), AudioSpectrum::SIZE),
            (GpsPosData::default().into(), GpsPosData::SIZE),
            (DisplayFrameSync.into(), 0),
        ];
        for (message, size) in cases {
            assert_eq!(message.to_envelope().payload().len(), size, "{:?}", message.id());
        }
    }

    #[test]
    fn unknown_id_does_not_decode() {
        let envelope = Envelope::from_raw(0xDEAD, &[]);
        assert_eq!(Message::from_envelope(&envelope), None);
    }

    #[test]
    fn truncated_or_oversized_payload_does_not_decode() {
        assert_eq!(Message::from_envelope(&Envelope::from_raw(3, &[50, 0, 0])), None);
        assert_eq!(Message::from_envelope(&Envelope::from_raw(3, &[50, 0, 0, 0, 0, 9])), None);
        assert_eq!(
            Message::from_envelope(&Envelope::from_raw(3, &[50, 0, 0, 0, 0])),
            Some(TxProgress { progress: 50, done: false }.into())
        );
    }

    #[test]
    fn invalid_field_values_do_not_decode() {
        // done flag must be 0 or 1
        assert_eq!(Message::from_envelope(&Envelope::from_raw(3, &[0, 0, 0, 0, 2])), None);
        // request kind 0 is not defined
        assert_eq!(Message::from_envelope(&Envelope::from_raw(5, &[0])), None);
    }

    #[test]
    fn spectrum_and_gps_survive_the_wire() {
        let mut spectrum = AudioSpectrum { sampling_rate: 48_000, ..Default::default() };
        spectrum.db[7] = 99;
        let gps = GpsPosData { latitude: 47.5, longitude: -122.25, altitude: 30, speed: 4, satellites: 9 };
        for message in [Message::from(spectrum), Message::from(gps)] {
            assert_eq!(Message::from_envelope(&message.to_envelope()), Some(message));
        }
    }
}
