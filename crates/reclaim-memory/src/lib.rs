//! Per-process memory reclaim
//!
//! Enumerates a process's memory areas, picks a reclaim hint for each one,
//! and hands them to the kernel through `process_madvise` in chunks of at
//! most [`MAX_TRANSFER`] ranges. Kernels without the syscall are driven
//! through the legacy `/proc/<pid>/reclaim` file instead.

mod advice;
mod batch;
mod config;
mod error;
mod fallback;
mod freezer;
mod process;
mod sweep;
mod vma;

#[cfg(target_os = "linux")]
mod sys;

#[cfg(test)]
mod test_support;

pub use advice::{
    classify, CompactionMode, ReclaimAdvice, COMPACT_ACTION_ANON_FLAG, COMPACT_ACTION_FILE_FLAG,
    MADV_COLD, MADV_PAGEOUT,
};
pub use batch::{
    chunk_ranges, compact_memory, AddressRange, BatchStats, ReclaimBackend, ReclaimTarget,
    MAX_TRANSFER,
};
pub use config::{ConfigError, ConfigFormat, EngineConfig, FIRST_APPLICATION_UID};
pub use error::ReclaimError;
pub use fallback::{Engine, FallbackState, LegacyReclaim, ProcReclaimFile, Route};
pub use freezer::{
    binder_freeze_info, enable_freezer, freeze_binder, BinderControl, FreezerError, TaskProfiles,
    ASYNC_RECEIVED_WHILE_FROZEN, BINDER_FREEZE_TIMEOUT_MS, SYNC_RECEIVED_WHILE_FROZEN,
};
pub use process::{compact_process, Partition, ProcessReport};
pub use sweep::{ProcessEntry, ProcessTable, ProcfsTable, SweepReport, SysinfoTable};
pub use vma::{ProcMaps, Vma, VmaSource};

#[cfg(target_os = "linux")]
pub use sys::PidfdBackend;
