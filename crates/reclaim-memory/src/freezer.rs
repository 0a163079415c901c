//! Freezer collaborators.
//!
//! Task-profile switching and binder freezing are owned by other system
//! components. These seams only adapt their status codes.

use thiserror::Error;
use tracing::warn;

/// Binder freeze/unfreeze timeout
pub const BINDER_FREEZE_TIMEOUT_MS: u32 = 100;

/// A synchronous transaction arrived while frozen
pub const SYNC_RECEIVED_WHILE_FROZEN: u32 = 1;

/// An asynchronous transaction arrived while frozen
pub const ASYNC_RECEIVED_WHILE_FROZEN: u32 = 2;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FreezerError {
    #[error("Unknown error")]
    ProfileFailed,

    #[error("Unable to freeze/unfreeze binder (error {0})")]
    Binder(i32),

    #[error("Unable to read binder freeze info (error {0})")]
    FreezeInfo(i32),
}

/// Applies named task profiles system-wide.
pub trait TaskProfiles {
    fn set_profiles(&self, profiles: &[&str]) -> bool;
}

/// Binder freezer interface.
pub trait BinderControl {
    /// Returns 0 on success.
    fn freeze(&self, pid: u32, freeze: bool, timeout_ms: u32) -> i32;

    /// `(sync_received, async_received)` or a negative error code.
    fn freeze_info(&self, pid: u32) -> Result<(bool, bool), i32>;
}

/// Switch the freezer profile on or off.
pub fn enable_freezer(profiles: &dyn TaskProfiles, enable: bool) -> Result<(), FreezerError> {
    let profile = if enable { "FreezerEnabled" } else { "FreezerDisabled" };

    if profiles.set_profiles(&[profile]) {
        Ok(())
    } else {
        warn!(profile, "Failed to apply task profile");
        Err(FreezerError::ProfileFailed)
    }
}

pub fn freeze_binder(binder: &dyn BinderControl, pid: u32, freeze: bool) -> Result<(), FreezerError> {
    match binder.freeze(pid, freeze, BINDER_FREEZE_TIMEOUT_MS) {
        0 => Ok(()),
        err => Err(FreezerError::Binder(err)),
    }
}

/// Bitmask of [`SYNC_RECEIVED_WHILE_FROZEN`] and [`ASYNC_RECEIVED_WHILE_FROZEN`].
pub fn binder_freeze_info(binder: &dyn BinderControl, pid: u32) -> Result<u32, FreezerError> {
    let (sync_received, async_received) = binder
        .freeze_info(pid)
        .map_err(FreezerError::FreezeInfo)?;

    let mut bits = 0;
    if sync_received {
        bits |= SYNC_RECEIVED_WHILE_FROZEN;
    }
    if async_received {
        bits |= ASYNC_RECEIVED_WHILE_FROZEN;
    }
    Ok(bits)
}
