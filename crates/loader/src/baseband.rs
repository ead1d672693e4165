//! Baseband image loader.
//!
//! `BasebandLoader` owns the baseband core and keeps it running the image
//! the current view asked for. It is a plain state machine driven by method
//! calls; the firmware wraps it and decides when to switch images.
//!
//! ```text
//!            run_image(tag)              transfer ok
//!   Idle ───────────────────▶ Loading ─────────────────▶ Running(tag)
//!    ▲                          │  ▲                          │
//!    │ shutdown()               │  │ run_image(other)         │
//!    │                          ▼  │                          │
//!    └────────────────────── Faulted ◀────────────────────────┘
//!                         (tag missing / I/O / core)
//! ```
//!
//! Lookup and size checks happen before the core is halted. When they fail
//! while an image is running, that image keeps running and the state stays
//! `Running`; only a failure after the halt leaves the loader `Faulted`.

use core::fmt;

use platform::config::LOAD_CHUNK_SIZE;
use platform::storage::File;
use platform::{BasebandCore, ImageStore, ImageTag};

use crate::io::{read_chunk, ReadFault};

// ---------------------------------------------------------------------------
// State / errors
// ---------------------------------------------------------------------------

/// Current loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoaderState {
    /// Nothing loaded, core halted.
    Idle,
    /// A transfer is in progress.
    Loading(ImageTag),
    /// `tag` was transferred and the core started.
    Running(ImageTag),
    /// The last transfer for `tag` failed. Cleared by the next load.
    Faulted(ImageTag),
}

/// What a successful `run_image` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadOutcome {
    /// The requested image was already running, or the tag was none.
    Unchanged,
    /// The image was transferred and the core restarted.
    Loaded {
        /// Image size in bytes.
        bytes: usize,
    },
}

/// Baseband load failures. `E` is the error of the image source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BasebandError<E> {
    /// No image with this tag.
    TagNotFound(ImageTag),
    /// The image does not fit the baseband code region.
    ImageTooLarge {
        /// Image size.
        size: usize,
        /// Region size.
        capacity: usize,
    },
    /// The source ended before the advertised size.
    ShortImage {
        /// Advertised size.
        expected: usize,
        /// Bytes actually transferred.
        read: usize,
    },
    /// The image source failed.
    Storage(E),
    /// A read did not complete in time.
    Timeout,
    /// Halting, writing or starting the core failed.
    Core,
}

impl<E> fmt::Display for BasebandError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagNotFound(tag) => write!(f, "baseband image {tag} not found"),
            Self::ImageTooLarge { size, capacity } => {
                write!(f, "baseband image of {size} bytes exceeds {capacity}")
            }
            Self::ShortImage { expected, read } => {
                write!(f, "baseband image short: {read} of {expected} bytes")
            }
            Self::Storage(_) => f.write_str("baseband image read failed"),
            Self::Timeout => f.write_str("baseband image read timed out"),
            Self::Core => f.write_str("baseband core fault"),
        }
    }
}

impl<E> From<ReadFault<E>> for BasebandError<E> {
    fn from(fault: ReadFault<E>) -> Self {
        match fault {
            ReadFault::Io(e) => Self::Storage(e),
            ReadFault::Timeout => Self::Timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// BasebandLoader
// ---------------------------------------------------------------------------

/// Loads baseband images into the baseband core by tag.
pub struct BasebandLoader<I, C> {
    images: I,
    core: C,
    state: LoaderState,
}

impl<I: ImageStore, C: BasebandCore> BasebandLoader<I, C> {
    /// Create an idle loader.
    pub fn new(images: I, core: C) -> Self {
        Self { images, core, state: LoaderState::Idle }
    }

    /// Current state.
    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Tag of the running image, if any.
    pub fn running(&self) -> Option<ImageTag> {
        match self.state {
            LoaderState::Running(tag) => Some(tag),
            _ => None,
        }
    }

    /// The image source.
    pub fn images(&self) -> &I {
        &self.images
    }

    /// The baseband core.
    pub fn core(&self) -> &C {
        &self.core
    }

    /// Make `tag` the running image.
    ///
    /// The none tag leaves whatever is resident untouched. Asking for the
    /// image that is already running does nothing; use
    /// [`run_image_forced`](Self::run_image_forced) to restart it.
    pub fn run_image(&mut self, tag: ImageTag) -> Result<LoadOutcome, BasebandError<I::Error>> {
        if tag.is_none() || self.state == LoaderState::Running(tag) {
            return Ok(LoadOutcome::Unchanged);
        }
        self.load(tag)
    }

    /// Load `tag` even if it is already running.
    pub fn run_image_forced(
        &mut self,
        tag: ImageTag,
    ) -> Result<LoadOutcome, BasebandError<I::Error>> {
        if tag.is_none() {
            return Ok(LoadOutcome::Unchanged);
        }
        self.load(tag)
    }

    /// Halt the core and forget the running image.
    pub fn shutdown(&mut self) -> Result<(), BasebandError<I::Error>> {
        self.core.halt().map_err(|_| BasebandError::Core)?;
        if let Some(tag) = self.running() {
            info!("baseband image {} stopped", tag);
        }
        self.state = LoaderState::Idle;
        Ok(())
    }

    /// Stream `len` bytes of `file` into the core as image `tag` and start it.
    ///
    /// Used for the baseband tail of an external app. `chunk` is the
    /// transfer buffer; the file must be positioned at the image start.
    pub async fn stage_from_file<F: File>(
        &mut self,
        tag: ImageTag,
        file: &mut F,
        len: usize,
        chunk: &mut [u8],
    ) -> Result<(), BasebandError<F::Error>> {
        let checked: Result<(), BasebandError<F::Error>> = self.fits(len).and_then(|()| {
            if chunk.is_empty() {
                Err(BasebandError::ShortImage { expected: len, read: 0 })
            } else {
                Ok(())
            }
        });
        self.rejected(tag, checked)?;
        self.state = LoaderState::Loading(tag);
        let result = self.stage(file, len, chunk).await;
        self.finish(tag, result)
    }

    fn load(&mut self, tag: ImageTag) -> Result<LoadOutcome, BasebandError<I::Error>> {
        let located = self.locate(tag);
        let size = self.rejected(tag, located)?;
        self.state = LoaderState::Loading(tag);
        info!("loading baseband image {}", tag);
        let result = self.transfer(tag, size);
        self.finish(tag, result).map(|bytes| LoadOutcome::Loaded { bytes })
    }

    /// Record a failure that happened before the core was touched.
    fn rejected<T, E>(
        &mut self,
        tag: ImageTag,
        result: Result<T, BasebandError<E>>,
    ) -> Result<T, BasebandError<E>> {
        if result.is_err() {
            match self.running() {
                Some(current) => warn!("baseband image {} unavailable, {} keeps running", tag, current),
                None => {
                    self.state = LoaderState::Faulted(tag);
                    warn!("baseband image {} unavailable", tag);
                }
            }
        }
        result
    }

    fn finish<T, E>(
        &mut self,
        tag: ImageTag,
        result: Result<T, BasebandError<E>>,
    ) -> Result<T, BasebandError<E>> {
        match result {
            Ok(value) => {
                self.state = LoaderState::Running(tag);
                info!("baseband image {} running", tag);
                Ok(value)
            }
            Err(e) => {
                self.state = LoaderState::Faulted(tag);
                warn!("baseband image {} failed to load", tag);
                Err(e)
            }
        }
    }

    fn fits<E>(&self, size: usize) -> Result<(), BasebandError<E>> {
        let capacity = self.core.capacity();
        if size > capacity {
            return Err(BasebandError::ImageTooLarge { size, capacity });
        }
        Ok(())
    }

    fn locate(&self, tag: ImageTag) -> Result<usize, BasebandError<I::Error>> {
        let size = self
            .images
            .image_size(tag)
            .map_err(BasebandError::Storage)?
            .ok_or(BasebandError::TagNotFound(tag))?;
        self.fits(size)?;
        Ok(size)
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: offset + n <= size, checked against capacity
    fn transfer(&mut self, tag: ImageTag, size: usize) -> Result<usize, BasebandError<I::Error>> {
        self.core.halt().map_err(|_| BasebandError::Core)?;

        let mut buf = [0u8; LOAD_CHUNK_SIZE];
        let mut offset = 0;
        while offset < size {
            let want = (size - offset).min(LOAD_CHUNK_SIZE);
            let window = buf.get_mut(..want).ok_or(BasebandError::Core)?;
            let n = self.images.read_image(tag, offset, window).map_err(BasebandError::Storage)?;
            let data = window.get(..n).filter(|d| !d.is_empty());
            let Some(data) = data else {
                return Err(BasebandError::ShortImage { expected: size, read: offset });
            };
            self.core.write(offset, data).map_err(|_| BasebandError::Core)?;
            offset += n;
        }
        self.core.start().map_err(|_| BasebandError::Core)?;
        Ok(size)
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: offset + n <= len, checked against capacity
    async fn stage<F: File>(
        &mut self,
        file: &mut F,
        len: usize,
        chunk: &mut [u8],
    ) -> Result<(), BasebandError<F::Error>> {
        self.core.halt().map_err(|_| BasebandError::Core)?;
        let mut offset = 0;
        while offset < len {
            let want = (len - offset).min(chunk.len());
            let window = chunk.get_mut(..want).ok_or(BasebandError::Core)?;
            let n = read_chunk(file, window).await?;
            let data = window.get(..n).ok_or(BasebandError::Core)?;
            self.core.write(offset, data).map_err(|_| BasebandError::Core)?;
            offset += n;
            if n < want {
                return Err(BasebandError::ShortImage { expected: len, read: offset });
            }
        }
        self.core.start().map_err(|_| BasebandError::Core)
    }
}
