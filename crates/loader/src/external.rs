//! External application loader.
//!
//! Loading never transfers control to a partially copied binary: the
//! header is validated, the entry point resolved and the whole UI payload
//! copied (plus any baseband tail staged) before the entry is called. Any
//! failure after the first region write zeroes the copied range again.

use core::fmt;
use core::ops::Range;

use messaging::ScratchBuffer;
use platform::config::{CURRENT_HEADER_VERSION, LOAD_CHUNK_SIZE};
use platform::storage::{File, Storage};
use platform::{AppRegion, BasebandCore, ImageStore, ImageTag};

use crate::app_info::{ApplicationInformation, HeaderError, HEADER_SIZE};
use crate::baseband::{BasebandError, BasebandLoader};
use crate::io::{read_chunk, ReadFault};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Checks applied to every external app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// The only accepted `header_version`.
    pub header_version: u32,
    /// If set, `app_version` must match the running firmware's checksum.
    pub firmware_checksum: Option<u32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { header_version: CURRENT_HEADER_VERSION, firmware_checksum: None }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// External app load failures. `E` is the storage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExternalAppError<E> {
    /// No file at the path.
    NotFound,
    /// Storage failed.
    Io(E),
    /// A read did not complete in time.
    Timeout,
    /// Header rejected.
    Header(HeaderError),
    /// Built against different firmware.
    ChecksumMismatch {
        /// Checksum of the running firmware.
        expected: u32,
        /// Checksum recorded in the app.
        found: u32,
    },
    /// `m4_app_offset` lies past the end of the file.
    OffsetBeyondFile {
        /// Offset from the header.
        offset: u32,
        /// File size.
        size: u64,
    },
    /// The file ended before the UI payload was complete.
    ShortRead {
        /// Bytes that should have been copied.
        expected: usize,
        /// Bytes actually read.
        read: usize,
    },
    /// The UI payload does not fit the app region.
    RegionTooSmall {
        /// Payload size.
        needed: usize,
        /// Region size.
        capacity: usize,
    },
    /// Writing the app region failed.
    Region,
    /// The scratch buffer is leased elsewhere.
    ScratchBusy,
    /// Staging the baseband tail failed.
    Baseband(BasebandError<E>),
    /// No entry point for this app.
    EntryNotFound,
}

impl<E> fmt::Display for ExternalAppError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("app not found"),
            Self::Io(_) => f.write_str("app read failed"),
            Self::Timeout => f.write_str("app read timed out"),
            Self::Header(e) => write!(f, "bad app header: {e}"),
            Self::ChecksumMismatch { expected, found } => {
                write!(f, "app built for firmware {found:08x}, running {expected:08x}")
            }
            Self::OffsetBeyondFile { offset, size } => {
                write!(f, "baseband offset {offset} beyond file of {size} bytes")
            }
            Self::ShortRead { expected, read } => {
                write!(f, "app truncated: {read} of {expected} bytes")
            }
            Self::RegionTooSmall { needed, capacity } => {
                write!(f, "app needs {needed} bytes, region holds {capacity}")
            }
            Self::Region => f.write_str("app region write failed"),
            Self::ScratchBusy => f.write_str("scratch buffer busy"),
            Self::Baseband(e) => write!(f, "baseband tail: {e}"),
            Self::EntryNotFound => f.write_str("no entry point"),
        }
    }
}

impl<E> From<HeaderError> for ExternalAppError<E> {
    fn from(e: HeaderError) -> Self {
        Self::Header(e)
    }
}

impl<E> From<ReadFault<E>> for ExternalAppError<E> {
    fn from(fault: ReadFault<E>) -> Self {
        match fault {
            ReadFault::Io(e) => Self::Io(e),
            ReadFault::Timeout => Self::Timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// A resolved app entry point. `N` is the navigation context it receives.
pub enum AppEntry<N> {
    /// Function linked into the firmware.
    Linked(fn(&mut N)),
    /// Code copied into the app region.
    #[cfg(feature = "native-entry")]
    Native(extern "C" fn(*mut N)),
}

impl<N> Clone for AppEntry<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for AppEntry<N> {}

impl<N> AppEntry<N> {
    /// Hand control to the app.
    pub fn call(self, nav: &mut N) {
        match self {
            Self::Linked(f) => f(nav),
            #[cfg(feature = "native-entry")]
            Self::Native(f) => f(core::ptr::from_mut(nav)),
        }
    }
}

/// Maps a validated header to the code to run.
pub trait EntryResolver<N> {
    /// Entry for `info`, whose payload will occupy `loaded` (addresses).
    fn resolve(&self, info: &ApplicationInformation, loaded: Range<usize>) -> Option<AppEntry<N>>;
}

/// Resolves entries by app name from a fixed table.
pub struct EntryTable<'a, N> {
    entries: &'a [(&'a str, fn(&mut N))],
}

impl<'a, N> EntryTable<'a, N> {
    /// Wrap a `(name, entry)` table.
    pub const fn new(entries: &'a [(&'a str, fn(&mut N))]) -> Self {
        Self { entries }
    }
}

impl<N> EntryResolver<N> for EntryTable<'_, N> {
    fn resolve(&self, info: &ApplicationInformation, _loaded: Range<usize>) -> Option<AppEntry<N>> {
        let name = info.name();
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, f)| AppEntry::Linked(*f))
    }
}

/// Calls the header's entry address, if it points into the loaded payload.
#[cfg(feature = "native-entry")]
pub struct NativeEntry;

#[cfg(feature = "native-entry")]
impl<N> EntryResolver<N> for NativeEntry {
    fn resolve(&self, info: &ApplicationInformation, loaded: Range<usize>) -> Option<AppEntry<N>> {
        let addr = usize::try_from(info.external_app_entry).ok()?;
        // Thumb code: bit 0 set, the instruction lives at addr & !1.
        if addr & 1 == 0 || !loaded.contains(&(addr & !1)) {
            return None;
        }
        // SAFETY: the address lies inside the region the loader fills with
        // the app's UI payload before calling it, and has the Thumb bit
        // set, so it is a valid `extern "C"` function pointer once loaded.
        let f = unsafe { core::mem::transmute::<usize, extern "C" fn(*mut N)>(addr) };
        Some(AppEntry::Native(f))
    }
}

// ---------------------------------------------------------------------------
// ExternalAppLoader
// ---------------------------------------------------------------------------

/// What a successful load did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLaunch {
    /// The validated header.
    pub info: ApplicationInformation,
    /// Bytes copied into the app region, header included.
    pub copied: usize,
    /// Baseband image staged from the tail.
    pub baseband: Option<ImageTag>,
}

/// Read and validate the header of the app at `path`.
pub async fn read_header<S>(
    storage: &mut S,
    path: &str,
    header_version: u32,
) -> Result<ApplicationInformation, ExternalAppError<S::Error>>
where
    S: Storage,
    S::File: File<Error = S::Error>,
{
    let mut file = storage.open_file(path).await.map_err(ExternalAppError::Io)?;
    let mut header = [0u8; HEADER_SIZE];
    let n = read_chunk(&mut file, &mut header).await?;
    let bytes = header.get(..n).ok_or(HeaderError::TooShort)?;
    Ok(ApplicationInformation::decode_checked(bytes, header_version)?)
}

/// Loads external apps into an [`AppRegion`] and runs them.
pub struct ExternalAppLoader<'a, R> {
    config: LoaderConfig,
    region: R,
    scratch: &'a ScratchBuffer,
}

impl<'a, R: AppRegion> ExternalAppLoader<'a, R> {
    /// Create a loader writing into `region` through `scratch`.
    pub fn new(config: LoaderConfig, region: R, scratch: &'a ScratchBuffer) -> Self {
        Self { config, region, scratch }
    }

    /// Active checks.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The app region.
    pub fn region(&self) -> &R {
        &self.region
    }

    /// Load the app at `path` and call its entry with `nav`.
    ///
    /// Returns once the app hands control back; the caller resumes the
    /// view that was active before.
    pub async fn run_external_app<N, S, X, I, C>(
        &mut self,
        nav: &mut N,
        path: &str,
        storage: &mut S,
        baseband: &mut BasebandLoader<I, C>,
        resolver: &X,
    ) -> Result<ExternalLaunch, ExternalAppError<S::Error>>
    where
        S: Storage,
        S::File: File<Error = S::Error>,
        X: EntryResolver<N>,
        I: ImageStore,
        C: BasebandCore,
    {
        let (entry, launch) = self.load(path, storage, baseband, resolver).await?;
        info!("starting external app {}", launch.info.name());
        entry.call(nav);
        debug!("external app returned");
        Ok(launch)
    }

    /// Validate, copy and stage the app at `path` without running it.
    pub async fn load<N, S, X, I, C>(
        &mut self,
        path: &str,
        storage: &mut S,
        baseband: &mut BasebandLoader<I, C>,
        resolver: &X,
    ) -> Result<(AppEntry<N>, ExternalLaunch), ExternalAppError<S::Error>>
    where
        S: Storage,
        S::File: File<Error = S::Error>,
        X: EntryResolver<N>,
        I: ImageStore,
        C: BasebandCore,
    {
        if !storage.exists(path).await.map_err(ExternalAppError::Io)? {
            warn!("external app {} not found", path);
            return Err(ExternalAppError::NotFound);
        }
        let mut file = storage.open_file(path).await.map_err(ExternalAppError::Io)?;

        let mut header = [0u8; HEADER_SIZE];
        let n = read_chunk(&mut file, &mut header).await?;
        let bytes = header.get(..n).ok_or(HeaderError::TooShort)?;
        let info = ApplicationInformation::decode_checked(bytes, self.config.header_version)?;
        if let Some(expected) = self.config.firmware_checksum {
            if info.app_version != expected {
                return Err(ExternalAppError::ChecksumMismatch { expected, found: info.app_version });
            }
        }

        let size = file.size();
        let copy_len = self.copy_len(&info, size)?;
        let base = self.region.base_address();
        let loaded = base..base.saturating_add(copy_len);
        let entry = resolver.resolve(&info, loaded).ok_or(ExternalAppError::EntryNotFound)?;

        let scratch = self.scratch;
        let mut lease = scratch.lease().ok_or(ExternalAppError::ScratchBusy)?;
        let chunk = lease.data_mut();
        let chunk_len = chunk.len().min(LOAD_CHUNK_SIZE);
        let chunk = chunk.get_mut(..chunk_len).ok_or(ExternalAppError::ScratchBusy)?;

        let staged = match self.copy(&mut file, &header, copy_len, chunk).await {
            Ok(()) => Self::stage_tail(&info, size, &mut file, baseband, chunk).await,
            Err(e) => Err(e),
        };
        let baseband_tag = match staged {
            Ok(tag) => tag,
            Err(e) => {
                if self.region.zero(0, copy_len).is_err() {
                    error!("app region not cleared after failed load");
                }
                warn!("external app load failed");
                return Err(e);
            }
        };

        Ok((entry, ExternalLaunch { info, copied: copy_len, baseband: baseband_tag }))
    }

    /// Bytes `[0, copy_len)` go to the app region.
    fn copy_len<E>(&self, info: &ApplicationInformation, size: u64) -> Result<usize, ExternalAppError<E>> {
        let end = match info.m4_app_offset {
            0 => size,
            offset if u64::from(offset) > size => {
                return Err(ExternalAppError::OffsetBeyondFile { offset, size });
            }
            offset => u64::from(offset),
        };
        let capacity = self.region.capacity();
        let needed = usize::try_from(end).unwrap_or(usize::MAX);
        if needed > capacity {
            return Err(ExternalAppError::RegionTooSmall { needed, capacity });
        }
        Ok(needed)
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: copied + n <= len, loop bound
    async fn copy<F: File>(
        &mut self,
        file: &mut F,
        header: &[u8; HEADER_SIZE],
        len: usize,
        chunk: &mut [u8],
    ) -> Result<(), ExternalAppError<F::Error>> {
        // The copied header records where the app actually lives.
        #[allow(clippy::cast_possible_truncation)] // Safety: 32-bit address space on the target
        let base = self.region.base_address() as u32;
        let mut first = *header;
        if let Some(location) = first.get_mut(0..4) {
            location.copy_from_slice(&base.to_le_bytes());
        }
        let head = first.get(..len.min(HEADER_SIZE)).ok_or(ExternalAppError::Region)?;
        self.region.write(0, head).map_err(|_| ExternalAppError::Region)?;

        let mut copied = head.len();
        while copied < len {
            let want = (len - copied).min(chunk.len());
            let window = chunk.get_mut(..want).ok_or(ExternalAppError::Region)?;
            let n = read_chunk(file, window).await?;
            if n < want {
                warn!("external app short read at {}", copied + n);
                return Err(ExternalAppError::ShortRead { expected: len, read: copied + n });
            }
            self.region.write(copied, window).map_err(|_| ExternalAppError::Region)?;
            copied += n;
        }
        Ok(())
    }

    async fn stage_tail<F: File, I: ImageStore, C: BasebandCore>(
        info: &ApplicationInformation,
        size: u64,
        file: &mut F,
        baseband: &mut BasebandLoader<I, C>,
        chunk: &mut [u8],
    ) -> Result<Option<ImageTag>, ExternalAppError<F::Error>> {
        let Some(tag) = info.baseband_tail() else {
            return Ok(None);
        };
        let tail = size.saturating_sub(u64::from(info.m4_app_offset));
        if tail == 0 {
            debug!("app names a baseband image but carries no tail");
            return Ok(None);
        }
        let tail = usize::try_from(tail).unwrap_or(usize::MAX);
        baseband
            .stage_from_file(tag, file, tail, chunk)
            .await
            .map_err(ExternalAppError::Baseband)?;
        Ok(Some(tag))
    }
}
