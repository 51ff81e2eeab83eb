// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Darwin kernel-assisted copy tiers via `copyfile(2)`.
//!
//! Grounded on `other_examples/a5bad295_..._macos_copy.rs`'s FFI bindings,
//! trimmed to the subset this ladder needs: no progress callbacks, no
//! `COPYFILE_RECURSIVE` (the ladder only ever copies one file at a time).
//! `copyfile` operates on paths rather than file descriptors, unlike the
//! Linux and Windows tiers, so this module opens files itself only for the
//! manual-loop fallback.

use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;

use super::classify::{Classification, Tier, classify};
use super::fallback;
use crate::error::{Error, Result};

type CopyfileFlagsT = u32;

const COPYFILE_ACL: CopyfileFlagsT = 1 << 0;
const COPYFILE_STAT: CopyfileFlagsT = 1 << 1;
const COPYFILE_XATTR: CopyfileFlagsT = 1 << 2;
const COPYFILE_DATA: CopyfileFlagsT = 1 << 3;
const COPYFILE_CLONE: CopyfileFlagsT = 1 << 24;

#[link(name = "System", kind = "dylib")]
unsafe extern "C" {
    fn copyfile(from: *const i8, to: *const i8, state: *mut std::ffi::c_void, flags: CopyfileFlagsT) -> i32;
}

/// The outcome of a successful platform-tier copy: total bytes transferred,
/// and whether the tier itself already carried permissions/timestamps (so
/// the caller can skip the post-copy attribute-copy step).
pub(crate) struct Outcome {
    pub(crate) bytes: u64,
    pub(crate) attributes_carried: bool,
}

enum Classified {
    RetryNextTier,
    HardFail(Error),
}

/// Runs the two-tier Darwin ladder (clone, then data-only copy), falling
/// back to the manual byte loop. `destination` must not already exist —
/// the caller's preflight is responsible for that (clonefile fails with
/// `EEXIST` otherwise).
pub(crate) fn copy(source: &Path, destination: &Path, len: u64, copy_attributes: bool) -> Result<Outcome> {
    match run_copyfile(source, destination, COPYFILE_CLONE, Tier::Kernel) {
        Ok(()) => return Ok(Outcome { bytes: len, attributes_carried: true }),
        Err(Classified::RetryNextTier) => {}
        Err(Classified::HardFail(e)) => return Err(e),
    }

    let mut data_flags = COPYFILE_DATA;
    if copy_attributes {
        data_flags |= COPYFILE_STAT | COPYFILE_ACL | COPYFILE_XATTR;
    }
    match run_copyfile(source, destination, data_flags, Tier::KernelData) {
        Ok(()) => return Ok(Outcome { bytes: len, attributes_carried: copy_attributes }),
        Err(Classified::RetryNextTier) => {}
        Err(Classified::HardFail(e)) => return Err(e),
    }

    let mut src_file = File::open(source).map_err(Error::from_io)?;
    let mut dst_file = File::create(destination).map_err(Error::from_io)?;
    let bytes = fallback::copy_remaining(&mut src_file, &mut dst_file)?;
    Ok(Outcome { bytes, attributes_carried: false })
}

fn run_copyfile(from: &Path, to: &Path, flags: CopyfileFlagsT, tier: Tier) -> std::result::Result<(), Classified> {
    // `from`/`to` were validated by `crate::path::Path` upstream of this call
    // (no embedded NUL), so the conversion cannot fail.
    let from_c = CString::new(from.as_os_str().as_bytes()).expect("path has no embedded NUL");
    let to_c = CString::new(to.as_os_str().as_bytes()).expect("path has no embedded NUL");

    // SAFETY: both `CString`s remain alive for the duration of the call;
    // `copyfile` does not retain the pointers past its return.
    let rc = unsafe { copyfile(from_c.as_ptr(), to_c.as_ptr(), std::ptr::null_mut(), flags) };
    if rc == 0 {
        return Ok(());
    }
    let raw = std::io::Error::last_os_error().raw_os_error();
    match classify(tier, raw) {
        Classification::RetryNextTier => Err(Classified::RetryNextTier),
        Classification::HardFail => Err(Classified::HardFail(Error::from_io(std::io::Error::last_os_error()))),
    }
}
