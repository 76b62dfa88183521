//! Block File - byte-addressable access to one backing file.
//!
//! The [`BlockFile`] is the only place that touches the filesystem:
//! - Opening an existing file for read-write
//! - Reading up to N bytes at an offset
//! - Writing bytes back at an offset
//! - Closing (optionally after `fsync`)

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::Result;

/// An open handle to a backing file.
///
/// # File Layout
/// Blocks are a caching convention, not a file format. Block N of a file
/// simply covers offset `N × block_size`:
/// ```text
/// ┌─────────┬─────────┬─────────┬──────┐
/// │ Block 0 │ Block 1 │ Block 2 │ B3.. │  ← last block may be partial
/// └─────────┴─────────┴─────────┴──────┘
/// Offset:  0     bs       2·bs      3·bs
/// ```
///
/// # Durability
/// With `sync_on_write`, every write is followed by `fsync()`.
/// Otherwise durability is left to the OS until [`close`](Self::close).
#[derive(Debug)]
pub struct BlockFile {
    file: File,
    sync_on_write: bool,
}

impl BlockFile {
    /// Open an existing file for reading and writing.
    ///
    /// The file is never created; blocks only cache files that already exist.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            sync_on_write,
        })
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// when end-of-file was reached. An offset past EOF reads 0 bytes.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Write all of `data` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Flush OS buffers and close the handle.
    ///
    /// `File` ignores errors on drop, so a sync failure would otherwise
    /// go unnoticed.
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
