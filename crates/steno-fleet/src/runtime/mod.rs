// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task runtime clients and stop-code classification.

pub mod ecs;
pub mod mock;
pub mod traits;

pub use ecs::EcsRuntime;
pub use mock::MockRuntime;
pub use traits::{Result, RuntimeError, TaskDescription, TaskRuntime};

/// Stop codes that mean the platform, not the meeting, ended the task.
///
/// A stopped task whose code is in this set never produced a usable
/// recording and is eligible for an automatic relaunch. Any other code,
/// including no code at all, is treated as a normal completion.
pub const INFRA_STOP_CODES: [&str; 12] = [
    "TaskFailedToStart",
    "ResourceInitializationError",
    "ResourceNotFoundException",
    "SpotInterruptionError",
    "InternalError",
    "OutOfMemoryError",
    "ContainerRuntimeError",
    "ContainerRuntimeTimeoutError",
    "CannotStartContainerError",
    "CannotInspectContainerError",
    "CannotCreateVolumeError",
    "CannotPullContainer",
];

/// Whether a stop code identifies an infrastructure failure.
pub fn is_infra_failure(stop_code: Option<&str>) -> bool {
    match stop_code {
        Some(code) => INFRA_STOP_CODES.contains(&code),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infra_codes_classified() {
        for code in INFRA_STOP_CODES {
            assert!(is_infra_failure(Some(code)), "{code} should be infra");
        }
    }

    #[test]
    fn test_missing_code_is_not_infra() {
        assert!(!is_infra_failure(None));
    }

    #[test]
    fn test_unknown_code_is_not_infra() {
        assert!(!is_infra_failure(Some("EssentialContainerExited")));
        assert!(!is_infra_failure(Some("UserInitiated")));
        // Classification is exact, not prefix-based.
        assert!(!is_infra_failure(Some("outofmemoryerror")));
    }
}
