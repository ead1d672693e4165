//! Baseband image table in SPI flash.
//!
//! Images are stored back to back, each prefixed by its tag and length:
//! ```text
//! [tag: 4][len: u32 le][bytes: len] [tag: 4][len: u32 le][bytes: len] ... [0; 4]
//! ```
//! A zero tag (or the end of the slice) terminates the table. On the target
//! the slice is the memory-mapped flash window at
//! [`IMAGE_DIRECTORY_OFFSET`](platform::memory_map::IMAGE_DIRECTORY_OFFSET).

use core::fmt;

use platform::{ImageStore, ImageTag};

/// Size of the per-image prefix.
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Image table lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DirectoryError {
    /// An entry's length runs past the end of the table.
    Corrupt {
        /// Byte offset of the bad entry.
        at: usize,
    },
    /// No image with the requested tag.
    NotFound,
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { at } => write!(f, "image table corrupt at offset {at}"),
            Self::NotFound => f.write_str("image not found"),
        }
    }
}

/// Read-only view of an image table.
#[derive(Clone, Copy)]
pub struct ImageDirectory<'a> {
    table: &'a [u8],
}

impl<'a> ImageDirectory<'a> {
    /// Wrap a table.
    pub const fn new(table: &'a [u8]) -> Self {
        Self { table }
    }

    /// Iterate entries in table order.
    ///
    /// Yields an error once and then stops if an entry is truncated.
    pub fn entries(&self) -> Entries<'a> {
        Entries { table: self.table, pos: 0, done: false }
    }

    /// Bytes of the image tagged `tag`.
    pub fn find(&self, tag: ImageTag) -> Result<Option<&'a [u8]>, DirectoryError> {
        for entry in self.entries() {
            let (t, data) = entry?;
            if t == tag {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}

/// Iterator over `(tag, image)` pairs.
pub struct Entries<'a> {
    table: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Result<(ImageTag, &'a [u8]), DirectoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let at = self.pos;
        let Some(prefix) = self.table.get(at..at.saturating_add(ENTRY_HEADER_SIZE)) else {
            // End of the slice without a terminator is a short table, not corruption.
            self.done = true;
            return None;
        };
        let mut tag = [0u8; 4];
        let mut len = [0u8; 4];
        if let (Some(t), Some(l)) = (prefix.get(..4), prefix.get(4..8)) {
            tag.copy_from_slice(t);
            len.copy_from_slice(l);
        }
        let tag = ImageTag::from_bytes(tag);
        if tag.is_none() {
            self.done = true;
            return None;
        }
        let start = at.saturating_add(ENTRY_HEADER_SIZE);
        let end = usize::try_from(u32::from_le_bytes(len))
            .ok()
            .and_then(|len| start.checked_add(len));
        match end.and_then(|end| self.table.get(start..end).map(|data| (end, data))) {
            Some((end, data)) => {
                self.pos = end;
                Some(Ok((tag, data)))
            }
            None => {
                self.done = true;
                Some(Err(DirectoryError::Corrupt { at }))
            }
        }
    }
}

impl ImageStore for ImageDirectory<'_> {
    type Error = DirectoryError;

    fn image_size(&self, tag: ImageTag) -> Result<Option<usize>, Self::Error> {
        Ok(self.find(tag)?.map(<[u8]>::len))
    }

    fn read_image(&self, tag: ImageTag, offset: usize, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let image = self.find(tag)?.ok_or(DirectoryError::NotFound)?;
        let rest = image.get(offset..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), rest.get(..n)) {
            dst.copy_from_slice(src);
        }
        Ok(n)
    }
}

/// Build a table from `(tag, image)` pairs, terminator included.
#[cfg(any(test, feature = "std"))]
pub fn build(images: &[(ImageTag, &[u8])]) -> Result<std::vec::Vec<u8>, DirectoryError> {
    let mut out = std::vec::Vec::new();
    for (tag, data) in images {
        if tag.is_none() {
            return Err(DirectoryError::Corrupt { at: out.len() });
        }
        let len = u32::try_from(data.len()).map_err(|_| DirectoryError::Corrupt { at: out.len() })?;
        out.extend_from_slice(&tag.as_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(data);
    }
    out.extend_from_slice(&[0; 4]);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing)] // Tests index into known-length arrays
mod tests {
    use super::*;

    fn table() -> Vec<u8> {
        build(&[
            (ImageTag::NFM_AUDIO, &[1, 2, 3]),
            (ImageTag::WFM_AUDIO, &[4; 600]),
            (ImageTag::TONES, &[]),
        ])
        .unwrap()
    }

    #[test]
    fn entries_in_table_order() {
        let bytes = table();
        let dir = ImageDirectory::new(&bytes);
        let tags: Vec<_> = dir.entries().map(|e| e.unwrap().0).collect();
        assert_eq!(tags, [ImageTag::NFM_AUDIO, ImageTag::WFM_AUDIO, ImageTag::TONES]);
    }

    #[test]
    fn image_store_reads_at_offset() {
        let bytes = table();
        let dir = ImageDirectory::new(&bytes);
        assert_eq!(dir.image_size(ImageTag::WFM_AUDIO).unwrap(), Some(600));
        assert_eq!(dir.image_size(ImageTag::GPS).unwrap(), None);
        let mut buf = [0u8; 8];
        assert_eq!(dir.read_image(ImageTag::NFM_AUDIO, 1, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[2, 3]);
        assert_eq!(dir.read_image(ImageTag::GPS, 0, &mut buf), Err(DirectoryError::NotFound));
    }

    #[test]
    fn truncated_entry_is_corrupt() {
        let mut bytes = table();
        bytes.truncate(20);
        let dir = ImageDirectory::new(&bytes);
        assert_eq!(dir.find(ImageTag::TONES), Err(DirectoryError::Corrupt { at: 11 }));
    }

    #[test]
    fn terminator_hides_trailing_bytes() {
        let mut bytes = build(&[(ImageTag::GPS, &[9])]).unwrap();
        bytes.extend_from_slice(b"PNRR\x01\x00\x00\x00\x07");
        let dir = ImageDirectory::new(&bytes);
        assert_eq!(dir.find(ImageTag::NRR).unwrap(), None);
    }

    #[test]
    fn empty_slice_is_an_empty_table() {
        let dir = ImageDirectory::new(&[]);
        assert_eq!(dir.entries().count(), 0);
    }
}
