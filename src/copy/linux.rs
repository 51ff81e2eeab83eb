// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Linux kernel-assisted copy tiers.
//!
//! Grounded on `other_examples/88ddb418_..._cp-core.rs`'s `copy_data_linux`:
//! `copy_file_range` first, `sendfile` second, manual loop last. Neither
//! syscall has a safe wrapper in `libc` on every target, so both are issued
//! directly via `libc::syscall`.

use std::fs::File;
use std::os::unix::io::AsRawFd as _;

use super::classify::{Classification, Tier, classify};
use super::fallback;
use crate::error::{Error, Result};

/// Attempts the full kernel-assisted ladder, falling back to the manual
/// loop. Returns the total number of bytes copied.
pub(crate) fn copy(source: &mut File, destination: &mut File, len: u64) -> Result<u64> {
    match copy_file_range(source, destination, len) {
        Ok(n) => return Ok(n),
        Err(Classified::RetryNextTier) => {}
        Err(Classified::HardFail(e)) => return Err(e),
    }
    match sendfile(source, destination, len) {
        Ok(n) => return Ok(n),
        Err(Classified::RetryNextTier) => {}
        Err(Classified::HardFail(e)) => return Err(e),
    }
    fallback::copy_remaining(source, destination)
}

enum Classified {
    RetryNextTier,
    HardFail(Error),
}

fn copy_file_range(source: &File, destination: &File, len: u64) -> std::result::Result<u64, Classified> {
    let mut remaining = len;
    let mut total = 0_u64;
    while remaining > 0 {
        // SAFETY: both descriptors are borrowed for the duration of the
        // syscall only; null offsets mean "use and advance each file's
        // current position", matching how the fallback loop behaves.
        let n = unsafe {
            libc::syscall(
                libc::SYS_copy_file_range,
                source.as_raw_fd(),
                std::ptr::null_mut::<libc::loff_t>(),
                destination.as_raw_fd(),
                std::ptr::null_mut::<libc::loff_t>(),
                remaining as usize,
                0_u32,
            )
        };
        if n < 0 {
            let raw = std::io::Error::last_os_error().raw_os_error();
            return match classify(Tier::Kernel, raw) {
                Classification::RetryNextTier if total == 0 => Err(Classified::RetryNextTier),
                Classification::RetryNextTier | Classification::HardFail => {
                    Err(Classified::HardFail(Error::from_io(std::io::Error::last_os_error())))
                }
            };
        }
        if n == 0 {
            break; // source EOF before `len` bytes: source shrank underneath us.
        }
        total += n as u64;
        remaining -= n as u64;
    }
    Ok(total)
}

fn sendfile(source: &File, destination: &File, len: u64) -> std::result::Result<u64, Classified> {
    let mut remaining = len;
    let mut total = 0_u64;
    while remaining > 0 {
        // SAFETY: descriptors borrowed for the call only.
        let n = unsafe {
            libc::sendfile(
                destination.as_raw_fd(),
                source.as_raw_fd(),
                std::ptr::null_mut(),
                remaining as libc::size_t,
            )
        };
        if n < 0 {
            let raw = std::io::Error::last_os_error().raw_os_error();
            return match classify(Tier::KernelData, raw) {
                Classification::RetryNextTier if total == 0 => Err(Classified::RetryNextTier),
                Classification::RetryNextTier | Classification::HardFail => {
                    Err(Classified::HardFail(Error::from_io(std::io::Error::last_os_error())))
                }
            };
        }
        if n == 0 {
            break;
        }
        total += n as u64;
        remaining -= n as u64;
    }
    Ok(total)
}
