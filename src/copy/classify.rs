// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The single place platform error-code knowledge for the copy ladder lives.
//! Error classification is captured in one function here rather than
//! sprinkled through ad hoc branches at each call site.

/// Which tier of the copy fallback ladder an attempt was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tier {
    /// `copy_file_range` (Linux) / `copyfile` clone (Darwin) / `CopyFileW` (Windows).
    Kernel,
    /// `sendfile` (Linux) / `copyfile` data-only (Darwin).
    KernelData,
}

/// Whether a failed attempt at `tier` should fall through to the next tier
/// or be surfaced to the caller as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification {
    RetryNextTier,
    HardFail,
}

#[cfg(target_os = "linux")]
pub(crate) fn classify(tier: Tier, raw_os_error: Option<i32>) -> Classification {
    let Some(code) = raw_os_error else {
        return Classification::HardFail;
    };
    let retry = match tier {
        Tier::Kernel => matches!(code, libc::EXDEV | libc::ENOSYS | libc::EOPNOTSUPP | libc::EINVAL),
        Tier::KernelData => matches!(code, libc::ENOSYS | libc::EINVAL),
    };
    if retry {
        Classification::RetryNextTier
    } else {
        Classification::HardFail
    }
}

#[cfg(target_os = "macos")]
pub(crate) fn classify(_tier: Tier, raw_os_error: Option<i32>) -> Classification {
    let Some(code) = raw_os_error else {
        return Classification::HardFail;
    };
    if matches!(code, libc::ENOTSUP | libc::EXDEV) {
        Classification::RetryNextTier
    } else {
        Classification::HardFail
    }
}

#[cfg(windows)]
pub(crate) fn classify(_tier: Tier, raw_os_error: Option<i32>) -> Classification {
    const ERROR_NOT_SAME_DEVICE: i32 = 17;
    if raw_os_error == Some(ERROR_NOT_SAME_DEVICE) {
        Classification::RetryNextTier
    } else {
        Classification::HardFail
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
pub(crate) fn classify(_tier: Tier, _raw_os_error: Option<i32>) -> Classification {
    Classification::RetryNextTier
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn exdev_retries_next_tier_on_kernel_tier() {
        assert_eq!(classify(Tier::Kernel, Some(libc::EXDEV)), Classification::RetryNextTier);
    }

    #[test]
    fn enospc_is_a_hard_failure() {
        assert_eq!(classify(Tier::Kernel, Some(libc::ENOSPC)), Classification::HardFail);
    }

    #[test]
    fn missing_error_code_is_a_hard_failure() {
        assert_eq!(classify(Tier::Kernel, None), Classification::HardFail);
    }
}
