//! Storage abstraction for file systems
//!
//! The SD card (FAT) is consumed as a plain byte-stream file API. Paths are
//! `/`-separated and relative to the volume root (`APPS/foo.ppma`).

use heapless::{String, Vec};

/// Maximum length of a single directory entry name.
pub const MAX_FILE_NAME: usize = 64;

/// Maximum number of entries returned by [`Storage::list_dir`].
pub const MAX_DIR_ENTRIES: usize = 32;

/// A directory entry name (no path component).
pub type FileName = String<MAX_FILE_NAME>;

/// Names of the regular files found in one directory.
pub type DirListing = Vec<FileName, MAX_DIR_ENTRIES>;

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File;

    /// Open file for reading
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Check if path exists
    fn exists(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;

    /// Create or truncate `path` and write `data` to it.
    fn write_file(
        &mut self,
        path: &str,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// List the regular files directly inside `dir`.
    ///
    /// Entries beyond [`MAX_DIR_ENTRIES`] or with names longer than
    /// [`MAX_FILE_NAME`] are skipped. A missing directory is an error.
    fn list_dir(
        &mut self,
        dir: &str,
    ) -> impl core::future::Future<Output = Result<DirListing, Self::Error>>;
}

/// File trait for reading files
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to position
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Get file size
    fn size(&self) -> u64;
}

/// Fill `buf` from `file`, stopping early only at end of data.
///
/// Returns the number of bytes read; a value smaller than `buf.len()` means
/// the file ended.
#[allow(clippy::indexing_slicing)] // Safety: filled < buf.len() checked by the loop condition
#[allow(clippy::arithmetic_side_effects)] // Safety: filled + n <= buf.len() since read() never returns more than asked
pub async fn read_full<F: File>(file: &mut F, buf: &mut [u8]) -> Result<usize, F::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
