//! Whole-process compaction: enumerate, classify, then advise.

use crate::advice::{classify, CompactionMode, ReclaimAdvice};
use crate::batch::{compact_memory, BatchStats, ReclaimBackend};
use crate::error::ReclaimError;
use crate::vma::{Vma, VmaSource};
use serde::Serialize;
use tracing::debug;

/// Areas of one process split by advice, each list in address order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    pub pageout: Vec<Vma>,
    pub cold: Vec<Vma>,
    pub skipped: Vec<Vma>,
}

impl Partition {
    /// Classify every area exactly once under `mode`.
    pub fn classify(vmas: Vec<Vma>, mode: CompactionMode) -> Self {
        let mut partition = Self::default();

        for vma in vmas {
            match classify(&vma, mode) {
                ReclaimAdvice::PageOut => partition.pageout.push(vma),
                ReclaimAdvice::Cold => partition.cold.push(vma),
                ReclaimAdvice::None => partition.skipped.push(vma),
            }
        }

        partition
    }

    pub fn len(&self) -> usize {
        self.pageout.len() + self.cold.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a successful process compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub pageout: BatchStats,
    pub cold: BatchStats,
    /// Areas left alone by the mode
    pub skipped: usize,
}

/// Compact `pid` through the batched syscall.
///
/// The pageout pass runs first; the cold pass only runs if it succeeded.
pub fn compact_process(
    source: &dyn VmaSource,
    backend: &dyn ReclaimBackend,
    pid: u32,
    mode: CompactionMode,
    max_transfer: usize,
) -> Result<ProcessReport, ReclaimError> {
    let vmas = source
        .vmas(pid)
        .map_err(|_| ReclaimError::ProcessNotFound(pid))?;

    let partition = Partition::classify(vmas, mode);
    debug!(
        pid,
        %mode,
        pageout = partition.pageout.len(),
        cold = partition.cold.len(),
        skipped = partition.skipped.len(),
        "Classified memory areas"
    );

    let pageout = compact_memory(
        backend,
        &partition.pageout,
        pid,
        ReclaimAdvice::PageOut,
        max_transfer,
    )?;
    let cold = compact_memory(
        backend,
        &partition.cold,
        pid,
        ReclaimAdvice::Cold,
        max_transfer,
    )?;

    Ok(ProcessReport {
        pageout,
        cold,
        skipped: partition.skipped.len(),
    })
}
