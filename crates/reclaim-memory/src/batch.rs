//! Batched reclaim of address ranges in another process.
//!
//! The kernel accepts at most [`MAX_TRANSFER`] ranges per call, so a process
//! with many areas is advised in several chunks over one process handle.

use crate::advice::ReclaimAdvice;
use crate::error::ReclaimError;
use crate::vma::Vma;
use serde::Serialize;
use std::io;
use tracing::{debug, warn};

/// Linux `UIO_MAXIOV`: most iovecs a single syscall accepts
pub const MAX_TRANSFER: usize = 1024;

/// One `(address, length)` pair handed to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub base: usize,
    pub len: usize,
}

impl From<&Vma> for AddressRange {
    fn from(vma: &Vma) -> Self {
        Self {
            base: vma.start,
            len: vma.len(),
        }
    }
}

/// An open handle to a live process. Dropping it releases the handle.
pub trait ReclaimTarget {
    /// Advise `ranges` in one call. Returns the number of bytes advised.
    fn advise(&self, ranges: &[AddressRange], advice: ReclaimAdvice) -> io::Result<usize>;
}

/// Opens process handles for batched reclaim.
pub trait ReclaimBackend: Send + Sync {
    fn open(&self, pid: u32) -> io::Result<Box<dyn ReclaimTarget>>;
}

/// Counters for one successful batch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Syscalls issued
    pub chunks: usize,
    /// Ranges submitted
    pub ranges: usize,
    /// Bytes the kernel reported as advised
    pub bytes: usize,
}

/// Split `vmas` into transfer chunks of at most `limit` ranges, in order.
///
/// Each chunk is freshly sized to `min(remaining, limit)`.
pub fn chunk_ranges(vmas: &[Vma], limit: usize) -> impl Iterator<Item = Vec<AddressRange>> + '_ {
    let limit = limit.clamp(1, MAX_TRANSFER);
    vmas.chunks(limit)
        .map(|chunk| chunk.iter().map(AddressRange::from).collect())
}

/// Issue `advice` for every area in `vmas` of process `pid`.
///
/// Failures on individual chunks do not stop the remaining chunks; the first
/// one is reported as [`ReclaimError::PartialFailure`]. An unsupported
/// syscall aborts immediately with [`ReclaimError::Unsupported`].
pub fn compact_memory(
    backend: &dyn ReclaimBackend,
    vmas: &[Vma],
    pid: u32,
    advice: ReclaimAdvice,
    limit: usize,
) -> Result<BatchStats, ReclaimError> {
    let mut stats = BatchStats::default();

    if vmas.is_empty() || advice == ReclaimAdvice::None {
        return Ok(stats);
    }

    // Released when dropped, on every return path below
    let target = backend
        .open(pid)
        .map_err(|e| ReclaimError::from_os(pid, e))?;

    let mut first_failure: Option<ReclaimError> = None;
    let mut failed = 0;

    for chunk in chunk_ranges(vmas, limit) {
        stats.chunks += 1;
        stats.ranges += chunk.len();

        match target.advise(&chunk, advice) {
            Ok(bytes) => {
                stats.bytes += bytes;
                debug!(pid, %advice, ranges = chunk.len(), bytes, "Advised chunk");
            }
            Err(e) => {
                let err = ReclaimError::from_os(pid, e);
                if err.is_unsupported() {
                    return Err(err);
                }

                warn!(pid, %advice, ranges = chunk.len(), error = %err, "Chunk failed");
                failed += 1;
                first_failure.get_or_insert(err);
            }
        }
    }

    match first_failure {
        Some(first) => Err(ReclaimError::PartialFailure {
            pid,
            failed,
            total: stats.chunks,
            first: Box::new(first),
        }),
        None => Ok(stats),
    }
}
