// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The manual chunked-copy loop: the last tier on every platform, and the
//! only tier on platforms with no kernel-assisted primitive.
//!
//! Grounded on `other_examples/88ddb418_..._cp-core.rs`'s
//! `readwrite_with_buffer`: a reusable chunk buffer, read-then-write-all per
//! chunk, stop at EOF.

use std::fs::File;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Chunk size used by the manual copy loop. Comfortably above the 64 KiB
/// floor while staying small enough not to dominate peak memory for
/// concurrent copies.
const CHUNK_SIZE: usize = 256 * 1024;

/// Copies every remaining byte from `source`'s current position to
/// `destination`'s current position, in `CHUNK_SIZE` chunks.
pub(crate) fn copy_remaining(source: &mut File, destination: &mut File) -> Result<u64> {
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut total = 0_u64;
    loop {
        let n = source.read(&mut buffer).map_err(Error::from_io)?;
        if n == 0 {
            return Ok(total);
        }
        destination.write_all(&buffer[..n]).map_err(classify_write_error)?;
        total += n as u64;
    }
}

fn classify_write_error(err: std::io::Error) -> Error {
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ENOSPC) {
        return Error::NoSpace;
    }
    Error::from_io(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_content_larger_than_one_chunk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src_path = dir.path().join("src");
        let dst_path = dir.path().join("dst");
        let payload = vec![0x5A_u8; CHUNK_SIZE * 3 + 17];
        std::fs::write(&src_path, &payload).expect("seed source");

        let mut src = File::open(&src_path).expect("open source");
        let mut dst = File::create(&dst_path).expect("create destination");
        let copied = copy_remaining(&mut src, &mut dst).expect("copy");

        assert_eq!(copied, payload.len() as u64);
        assert_eq!(std::fs::read(&dst_path).expect("read back"), payload);
    }
}
