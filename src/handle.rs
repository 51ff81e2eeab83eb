// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The blocking [`Handle`] (component C1).
//!
//! A `Handle` owns exactly one kernel descriptor. It has no async methods of
//! its own — every operation is a plain blocking call — because a `Handle`
//! is always driven from inside a closure already running on an
//! [`Executor`](crate::executor::Executor) worker; see
//! [`crate::executor::Executor::with_handle`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// The mode a [`Handle`] was opened with.
///
/// Operations that don't match the mode (e.g. `write` on a handle opened
/// `Read`) fail with [`Error::InvalidArgument`] rather than being rejected at
/// the type level — see `DESIGN.md` for why this crate collapses what the
/// upstream library splits into several file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Requests device-level or data-level durability from [`Handle::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Flush data and metadata to the device (`fsync`/`F_FULLFSYNC`/`FlushFileBuffers`).
    Full,
    /// Flush data only where the platform distinguishes it (`fdatasync`),
    /// falling back to `Full` behavior where it does not.
    DataOnly,
}

/// A single owned kernel file descriptor.
///
/// Invariants: exactly one logical owner at any time (this type is not
/// `Clone`); once [`Handle::close`] has run, every other method fails with
/// [`Error::InvalidHandle`]; `close` is idempotent.
#[derive(Debug)]
pub struct Handle {
    file: Option<File>,
    mode: AccessMode,
}

impl Handle {
    pub(crate) fn from_file(file: File, mode: AccessMode) -> Self {
        Self { file: Some(file), mode }
    }

    #[cfg(test)]
    pub(crate) fn null_for_test() -> Self {
        // A handle that is never actually operated on; used only to exercise
        // the registry's bookkeeping in isolation from real file I/O.
        Self {
            file: None,
            mode: AccessMode::Read,
        }
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::InvalidHandle)
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::InvalidHandle)
    }

    /// The access mode this handle was opened with.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether this handle has already been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Reads up to `count` bytes from the current offset, advancing it by the
    /// number of bytes actually read. Returns fewer bytes than requested on a
    /// short read; an empty result means EOF.
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>> {
        if !self.mode.can_read() {
            return Err(Error::invalid_argument("handle was not opened for reading"));
        }
        let mut buf = vec![0_u8; count];
        let n = self.file_mut()?.read(&mut buf).map_err(Error::from_io)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Reads into `buffer`, returning the number of bytes read (`0` means
    /// EOF). Advances the handle's offset by the same amount.
    pub fn read_into(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if !self.mode.can_read() {
            return Err(Error::invalid_argument("handle was not opened for reading"));
        }
        self.file_mut()?.read(buffer).map_err(Error::from_io)
    }

    /// Writes the entire buffer, retrying partial writes internally until
    /// complete or an error occurs.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.mode.can_write() {
            return Err(Error::invalid_argument("handle was not opened for writing"));
        }
        self.file_mut()?.write_all(bytes).map_err(classify_write_error)
    }

    /// Moves the handle's offset per `pos`, returning the new absolute offset.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file_mut()?.seek(pos).map_err(Error::from_io)
    }

    /// Reads `buffer.len()` bytes starting at absolute offset `offset`
    /// without moving the handle's cursor.
    pub fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if !self.mode.can_read() {
            return Err(Error::invalid_argument("handle was not opened for reading"));
        }
        positional::read_at(self.file()?, offset, buffer)
    }

    /// Writes `bytes` starting at absolute offset `offset` without moving the
    /// handle's cursor, retrying partial writes until complete.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        if !self.mode.can_write() {
            return Err(Error::invalid_argument("handle was not opened for writing"));
        }
        positional::write_all_at(self.file()?, offset, bytes)
    }

    /// Flushes this handle's data (and, for `Full`, metadata) to the device.
    pub fn sync(&self, mode: SyncMode) -> Result<()> {
        let file = self.file()?;
        match mode {
            SyncMode::Full => file.sync_all().map_err(Error::from_io),
            SyncMode::DataOnly => sync_data_only(file),
        }
    }

    /// Closes the handle. Idempotent: calling this more than once is not an
    /// error, it is simply a no-op after the first call.
    pub fn close(&mut self) {
        self.file = None;
    }
}

fn classify_write_error(err: std::io::Error) -> Error {
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ENOSPC) {
        return Error::NoSpace;
    }
    Error::from_io(err)
}

#[cfg(unix)]
fn sync_data_only(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd as _;
    // SAFETY: `fd` is borrowed for the duration of the call only; `file`
    // outlives it.
    let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
    if rc != 0 {
        return Err(Error::from_io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(windows)]
fn sync_data_only(file: &File) -> Result<()> {
    // Windows has no fdatasync equivalent; fall back to full durability.
    file.sync_all().map_err(Error::from_io)
}

#[cfg(unix)]
mod positional {
    use std::fs::File;
    use std::os::unix::fs::FileExt as _;

    use super::{Error, Result};

    pub(super) fn read_at(file: &File, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        file.read_at(buffer, offset).map_err(Error::from_io)
    }

    pub(super) fn write_all_at(file: &File, mut offset: u64, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let n = file.write_at(bytes, offset).map_err(super::classify_write_error)?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "write_at returned 0 bytes written",
                )));
            }
            bytes = &bytes[n..];
            offset += n as u64;
        }
        Ok(())
    }
}

#[cfg(windows)]
mod positional {
    use std::fs::File;
    use std::os::windows::fs::FileExt as _;

    use super::{Error, Result};

    pub(super) fn read_at(file: &File, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        file.seek_read(buffer, offset).map_err(Error::from_io)
    }

    pub(super) fn write_all_at(file: &File, mut offset: u64, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let n = file.seek_write(bytes, offset).map_err(super::classify_write_error)?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "seek_write returned 0 bytes written",
                )));
            }
            bytes = &bytes[n..];
            offset += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let mut handle = Handle::null_for_test();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[test]
    fn operations_after_close_fail_with_invalid_handle() {
        let mut handle = Handle::null_for_test();
        handle.close();
        assert!(matches!(handle.read(8), Err(Error::InvalidHandle)));
        assert!(matches!(handle.write(b"x"), Err(Error::InvalidHandle)));
    }

    #[test]
    fn read_only_handle_rejects_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").expect("seed file");
        let file = File::open(&path).expect("open");
        let mut handle = Handle::from_file(file, AccessMode::Read);
        assert!(matches!(handle.write(b"x"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn read_returns_full_contents_in_one_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello world").expect("seed file");
        let file = File::open(&path).expect("open");
        let mut handle = Handle::from_file(file, AccessMode::Read);
        let bytes = handle.read(64).expect("read");
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn write_at_does_not_move_cursor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"0123456789").expect("seed file");
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path).expect("open");
        let handle = Handle::from_file(file, AccessMode::ReadWrite);
        handle.write_at(2, b"XY").expect("write_at");
        let mut buf = [0_u8; 10];
        handle.read_at(0, &mut buf).expect("read_at");
        assert_eq!(&buf, b"01XY456789");
    }
}
