// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Windows kernel-assisted copy tier via `CopyFileW`, falling back to the
//! manual loop when the kernel refuses (e.g. the destination sits on a
//! filesystem that doesn't support the fast path).

use std::fs::File;
use std::os::windows::ffi::OsStrExt as _;
use std::path::Path;

use windows_sys::Win32::Foundation::FALSE;
use windows_sys::Win32::Storage::FileSystem::CopyFileW;

use super::classify::{Classification, Tier, classify};
use super::fallback;
use crate::error::{Error, Result};

pub(crate) struct Outcome {
    pub(crate) bytes: u64,
    pub(crate) attributes_carried: bool,
}

enum Classified {
    RetryNextTier,
    HardFail(Error),
}

pub(crate) fn copy(source: &Path, destination: &Path, len: u64) -> Result<Outcome> {
    match copy_file_w(source, destination) {
        Ok(()) => {
            // `CopyFileW` preserves the source's attributes and timestamps
            // natively; no post-copy attribute pass is needed.
            return Ok(Outcome { bytes: len, attributes_carried: true });
        }
        Err(Classified::RetryNextTier) => {}
        Err(Classified::HardFail(e)) => return Err(e),
    }

    let mut src_file = File::open(source).map_err(Error::from_io)?;
    let mut dst_file = File::create(destination).map_err(Error::from_io)?;
    let bytes = fallback::copy_remaining(&mut src_file, &mut dst_file)?;
    Ok(Outcome { bytes, attributes_carried: false })
}

fn copy_file_w(from: &Path, to: &Path) -> std::result::Result<(), Classified> {
    let from_w = to_wide(from);
    let to_w = to_wide(to);

    // SAFETY: both wide strings are NUL-terminated and outlive the call.
    let rc = unsafe { CopyFileW(from_w.as_ptr(), to_w.as_ptr(), FALSE) };
    if rc != 0 {
        return Ok(());
    }
    let raw = std::io::Error::last_os_error().raw_os_error();
    match classify(Tier::Kernel, raw) {
        Classification::RetryNextTier => Err(Classified::RetryNextTier),
        Classification::HardFail => Err(Classified::HardFail(Error::from_io(std::io::Error::last_os_error()))),
    }
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}
