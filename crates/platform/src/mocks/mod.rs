//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests. Every mock counts the calls that
//! matter to the loaders so tests can assert on side effects.

#![cfg(any(test, feature = "std"))]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::string::String;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;

use crate::storage::{DirListing, FileName};
use crate::*;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Errors produced by [`MockStorage`] and [`MockFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStorageError {
    /// No file or directory at the path
    NotFound,
    /// Injected I/O failure
    Io,
}

#[derive(Clone, Default)]
struct FileBehaviour {
    /// Reads return end-of-data once this many bytes have been read.
    truncate_at: Option<usize>,
    /// Reads fail once this many bytes have been read.
    fail_at: Option<usize>,
    /// Reads never complete once this many bytes have been read.
    stall_at: Option<usize>,
}

/// In-memory storage keyed by path.
#[derive(Default)]
pub struct MockStorage {
    files: BTreeMap<String, Vec<u8>>,
    behaviour: BTreeMap<String, FileBehaviour>,
    open_count: usize,
    write_count: usize,
    fail_writes: bool,
}

impl MockStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, data: &[u8]) {
        self.files.insert(path.into(), data.to_vec());
    }

    /// Contents of `path`, if present.
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Make reads of `path` report end-of-data after `n` bytes although the
    /// file size still reports the full length.
    pub fn truncate_reads(&mut self, path: &str, n: usize) {
        self.behaviour.entry(path.into()).or_default().truncate_at = Some(n);
    }

    /// Make reads of `path` fail after `n` bytes.
    pub fn fail_reads(&mut self, path: &str, n: usize) {
        self.behaviour.entry(path.into()).or_default().fail_at = Some(n);
    }

    /// Make reads of `path` hang after `n` bytes.
    pub fn stall_reads(&mut self, path: &str, n: usize) {
        self.behaviour.entry(path.into()).or_default().stall_at = Some(n);
    }

    /// Make every write fail.
    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    /// Number of successful `open_file` calls.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// Number of successful `write_file` calls.
    pub fn write_count(&self) -> usize {
        self.write_count
    }
}

impl Storage for MockStorage {
    type Error = MockStorageError;
    type File = MockFile;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let data = self.files.get(path).ok_or(MockStorageError::NotFound)?.clone();
        self.open_count += 1;
        Ok(MockFile {
            data,
            pos: 0,
            behaviour: self.behaviour.get(path).cloned().unwrap_or_default(),
            read_calls: 0,
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.files.contains_key(path))
    }

    async fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MockStorageError::Io);
        }
        self.write_count += 1;
        self.insert(path, data);
        Ok(())
    }

    async fn list_dir(&mut self, dir: &str) -> Result<DirListing, Self::Error> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut listing = DirListing::new();
        let mut found_dir = false;
        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else { continue };
            found_dir = true;
            if rest.contains('/') {
                continue;
            }
            let mut name = FileName::new();
            if name.push_str(rest).is_ok() && listing.push(name).is_err() {
                break;
            }
        }
        if found_dir {
            Ok(listing)
        } else {
            Err(MockStorageError::NotFound)
        }
    }
}

/// A file opened from [`MockStorage`].
pub struct MockFile {
    data: Vec<u8>,
    pos: usize,
    behaviour: FileBehaviour,
    read_calls: usize,
}

impl MockFile {
    /// Number of `read` calls made on this handle.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }
}

impl File for MockFile {
    type Error = MockStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_calls += 1;
        if self.behaviour.fail_at.is_some_and(|n| self.pos >= n) {
            return Err(MockStorageError::Io);
        }
        if self.behaviour.stall_at.is_some_and(|n| self.pos >= n) {
            core::future::pending::<()>().await;
        }
        let end = self
            .behaviour
            .truncate_at
            .map_or(self.data.len(), |n| n.min(self.data.len()));
        let available = end.saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = usize::try_from(pos).map_err(|_| MockStorageError::Io)?.min(self.data.len());
        Ok(self.pos as u64)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Flash image store
// ---------------------------------------------------------------------------

/// In-memory baseband image store that counts flash reads.
#[derive(Default)]
pub struct MockImageStore {
    images: Vec<(ImageTag, Vec<u8>)>,
    reads: Cell<usize>,
    fail: Cell<bool>,
    fail_lookups: Cell<bool>,
}

impl MockImageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image.
    pub fn insert(&mut self, tag: ImageTag, data: &[u8]) {
        self.images.push((tag, data.to_vec()));
    }

    /// Make every read fail.
    pub fn fail_reads(&self) {
        self.fail.set(true);
    }

    /// Make every size lookup fail, as a flash that stopped responding.
    pub fn fail_lookups(&self) {
        self.fail_lookups.set(true);
    }

    /// Number of `read_image` calls.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    fn find(&self, tag: ImageTag) -> Option<&[u8]> {
        self.images.iter().find(|(t, _)| *t == tag).map(|(_, d)| d.as_slice())
    }
}

impl ImageStore for MockImageStore {
    type Error = MockStorageError;

    fn image_size(&self, tag: ImageTag) -> Result<Option<usize>, Self::Error> {
        if self.fail_lookups.get() {
            return Err(MockStorageError::Io);
        }
        Ok(self.find(tag).map(<[u8]>::len))
    }

    fn read_image(
        &self,
        tag: ImageTag,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error> {
        self.reads.set(self.reads.get() + 1);
        if self.fail.get() {
            return Err(MockStorageError::Io);
        }
        let data = self.find(tag).ok_or(MockStorageError::NotFound)?;
        let rest = data.get(offset..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Baseband core
// ---------------------------------------------------------------------------

/// Baseband core double that records its code region and lifecycle calls.
pub struct MockBasebandCore {
    memory: Vec<u8>,
    written: usize,
    halts: usize,
    starts: usize,
    fail_start: bool,
}

impl MockBasebandCore {
    /// Create a core with a `capacity`-byte code region.
    pub fn new(capacity: usize) -> Self {
        Self { memory: vec![0; capacity], written: 0, halts: 0, starts: 0, fail_start: false }
    }

    /// Make `start` fail.
    pub fn fail_start(&mut self) {
        self.fail_start = true;
    }

    /// Code region contents.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Total bytes written since creation.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Number of `halt` calls.
    pub fn halt_count(&self) -> usize {
        self.halts
    }

    /// Number of successful `start` calls.
    pub fn start_count(&self) -> usize {
        self.starts
    }
}

impl BasebandCore for MockBasebandCore {
    type Error = RegionError;

    fn halt(&mut self) -> Result<(), Self::Error> {
        self.halts += 1;
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.memory.len()
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        RamRegion::new(&mut self.memory).write(offset, data)?;
        self.written += data.len();
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.fail_start {
            return Err(RegionError { offset: 0, len: 0, capacity: self.memory.len() });
        }
        self.starts += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// External app region
// ---------------------------------------------------------------------------

/// App region double that records every write.
pub struct MockAppRegion {
    memory: Vec<u8>,
    writes: usize,
    written: usize,
    zeroes: usize,
    fail_zero: bool,
}

impl MockAppRegion {
    /// Create a region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { memory: vec![0; capacity], writes: 0, written: 0, zeroes: 0, fail_zero: false }
    }

    /// Make `zero` fail without touching memory.
    pub fn fail_zero(&mut self) {
        self.fail_zero = true;
    }

    /// Number of `zero` calls.
    pub fn zero_count(&self) -> usize {
        self.zeroes
    }

    /// Region contents.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Number of `write` calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.written
    }
}

impl AppRegion for MockAppRegion {
    type Error = RegionError;

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        RamRegion::new(&mut self.memory).write(offset, data)?;
        self.writes += 1;
        self.written += data.len();
        Ok(())
    }

    fn zero(&mut self, offset: usize, len: usize) -> Result<(), Self::Error> {
        self.zeroes += 1;
        if self.fail_zero {
            return Err(RegionError { offset, len, capacity: self.memory.len() });
        }
        RamRegion::new(&mut self.memory).zero(offset, len)
    }

    fn capacity(&self) -> usize {
        self.memory.len()
    }

    fn base_address(&self) -> usize {
        self.memory.as_ptr() as usize
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Signal that counts notifications.
#[derive(Default)]
pub struct CountingSignal {
    count: AtomicUsize,
}

impl CountingSignal {
    /// Create a signal with a zero count.
    pub const fn new() -> Self {
        Self { count: AtomicUsize::new(0) }
    }

    /// Number of `notify` calls.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl CoreSignal for CountingSignal {
    fn notify(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn truncated_file_reports_full_size_but_short_reads() {
        let mut storage = MockStorage::new();
        storage.insert("APPS/a.ppma", &[7u8; 100]);
        storage.truncate_reads("APPS/a.ppma", 40);
        let mut file = storage.open_file("APPS/a.ppma").await.unwrap();
        assert_eq!(file.size(), 100);
        let mut buf = [0u8; 64];
        assert_eq!(file.read(&mut buf).await.unwrap(), 40);
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_dir_only_direct_children() {
        let mut storage = MockStorage::new();
        storage.insert("APPS/a.ppma", b"a");
        storage.insert("APPS/sub/b.ppma", b"b");
        storage.insert("SETTINGS/blacklist", b"");
        let listing = storage.list_dir("APPS").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].as_str(), "a.ppma");
        assert_eq!(storage.list_dir("MISSING").await, Err(MockStorageError::NotFound));
    }

    #[test]
    fn image_store_counts_reads() {
        let mut store = MockImageStore::new();
        store.insert(ImageTag::NFM_AUDIO, &[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(store.read_image(ImageTag::NFM_AUDIO, 1, &mut buf).unwrap(), 2);
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.image_size(ImageTag::AM_AUDIO).unwrap(), None);
    }
}
