//! Errors produced while compacting a process.

use std::io;
use thiserror::Error;

/// Failure kinds of a compaction request.
///
/// Only [`ReclaimError::Unsupported`] changes future behaviour (it flips the
/// engine onto the legacy path). Everything else is absorbed and logged at
/// the [`crate::Engine`] boundary.
#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    #[error("Permission denied for process {0}")]
    PermissionDenied(u32),

    #[error("process_madvise is not supported by this kernel")]
    Unsupported,

    #[error("{failed} of {total} chunks failed for process {pid}: {first}")]
    PartialFailure {
        pid: u32,
        failed: usize,
        total: usize,
        first: Box<ReclaimError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ReclaimError {
    /// Classify a raw OS error observed while working on `pid`.
    pub fn from_os(pid: u32, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ESRCH) | Some(libc::ENOENT) => Self::ProcessNotFound(pid),
            Some(libc::EPERM) | Some(libc::EACCES) => Self::PermissionDenied(pid),
            Some(libc::ENOSYS) => Self::Unsupported,
            _ => match err.kind() {
                io::ErrorKind::NotFound => Self::ProcessNotFound(pid),
                io::ErrorKind::PermissionDenied => Self::PermissionDenied(pid),
                _ => Self::Io(err),
            },
        }
    }

    /// Signed outcome code: a negative errno.
    pub fn errno(&self) -> i32 {
        match self {
            Self::ProcessNotFound(_) => -libc::ESRCH,
            Self::PermissionDenied(_) => -libc::EPERM,
            Self::Unsupported => -libc::ENOSYS,
            Self::PartialFailure { first, .. } => first.errno(),
            Self::Io(err) => -err.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// Whether the kernel lacks the batched reclaim mechanism.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }

    /// Whether the target exited before or while it was compacted.
    pub fn is_process_gone(&self) -> bool {
        match self {
            Self::ProcessNotFound(_) => true,
            Self::PartialFailure { first, .. } => first.is_process_gone(),
            _ => false,
        }
    }
}
