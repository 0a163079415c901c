//! Routing between batched reclaim and the legacy procfs interface.
//!
//! Kernels without `process_madvise` still expose `/proc/<pid>/reclaim`.
//! The first `ENOSYS` flips the engine onto that path for good, so later
//! calls skip area enumeration entirely.

use crate::advice::CompactionMode;
use crate::batch::ReclaimBackend;
use crate::config::EngineConfig;
use crate::process::{compact_process, ProcessReport};
use crate::vma::VmaSource;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Sticky record of whether the batched syscall is usable.
///
/// Starts out supported and moves to unsupported at most once.
#[derive(Debug)]
pub struct FallbackState {
    force_legacy: AtomicBool,
}

impl FallbackState {
    pub fn new() -> Self {
        Self {
            force_legacy: AtomicBool::new(false),
        }
    }

    /// State that routes everything to the legacy path from the start.
    pub fn legacy() -> Self {
        Self {
            force_legacy: AtomicBool::new(true),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.force_legacy.load(Ordering::Acquire)
    }

    /// Record that the kernel lacks the batched syscall.
    ///
    /// Returns `true` for the call that performed the transition.
    pub fn mark_unsupported(&self) -> bool {
        !self.force_legacy.swap(true, Ordering::AcqRel)
    }
}

impl Default for FallbackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-process text control surface of older kernels.
pub trait LegacyReclaim: Send + Sync {
    fn write(&self, pid: u32, keyword: &str) -> io::Result<()>;
}

/// Writes keywords to `<proc_root>/<pid>/reclaim`.
#[derive(Debug, Clone)]
pub struct ProcReclaimFile {
    proc_root: PathBuf,
}

impl ProcReclaimFile {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl LegacyReclaim for ProcReclaimFile {
    fn write(&self, pid: u32, keyword: &str) -> io::Result<()> {
        let path = self.proc_root.join(pid.to_string()).join("reclaim");
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(keyword.as_bytes())
    }
}

/// Path a single compaction request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Mode selected nothing
    Noop,
    /// Batched syscall was attempted; the report is present on success
    Batched(Option<ProcessReport>),
    /// Keyword written to the legacy control file
    Legacy,
}

/// The compaction engine.
///
/// Owns the kernel seams and the sticky [`FallbackState`]. Safe to share
/// between threads; each call opens and releases its own process handle.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) vmas: Box<dyn VmaSource>,
    pub(crate) backend: Box<dyn ReclaimBackend>,
    pub(crate) legacy: Box<dyn LegacyReclaim>,
    pub(crate) state: FallbackState,
}

impl Engine {
    /// Assemble an engine from explicit parts.
    pub fn new(
        config: EngineConfig,
        vmas: Box<dyn VmaSource>,
        backend: Box<dyn ReclaimBackend>,
        legacy: Box<dyn LegacyReclaim>,
        state: FallbackState,
    ) -> Self {
        Self {
            config,
            vmas,
            backend,
            legacy,
            state,
        }
    }

    /// Engine wired to procfs and the Linux syscalls.
    #[cfg(target_os = "linux")]
    pub fn system(config: EngineConfig) -> Self {
        let vmas = Box::new(crate::vma::ProcMaps::new(config.proc_root.clone()));
        let legacy = Box::new(ProcReclaimFile::new(config.proc_root.clone()));
        Self::new(
            config,
            vmas,
            Box::new(crate::sys::PidfdBackend),
            legacy,
            FallbackState::new(),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fallback_state(&self) -> &FallbackState {
        &self.state
    }

    /// Compact `pid` with caller flags (bit 1 = file, bit 2 = anon).
    pub fn compact_flags(&self, pid: u32, flags: u32) -> Route {
        match CompactionMode::from_flags(flags) {
            Some(mode) => self.compact_or_fallback(pid, mode),
            None => {
                debug!(pid, flags, "No area kind selected, nothing to do");
                Route::Noop
            }
        }
    }

    /// Best-effort compaction of `pid`. Errors are logged, never returned.
    pub fn compact_or_fallback(&self, pid: u32, mode: CompactionMode) -> Route {
        if !self.state.is_unsupported() {
            match compact_process(
                self.vmas.as_ref(),
                self.backend.as_ref(),
                pid,
                mode,
                self.config.max_transfer,
            ) {
                Ok(report) => {
                    debug!(
                        pid,
                        %mode,
                        pageout_bytes = report.pageout.bytes,
                        cold_bytes = report.cold.bytes,
                        "Process compacted"
                    );
                    return Route::Batched(Some(report));
                }
                Err(e) if e.is_unsupported() => {
                    if self.state.mark_unsupported() {
                        info!("process_madvise unavailable, switching to /proc/<pid>/reclaim");
                    }
                }
                Err(e) if e.is_process_gone() => {
                    debug!(pid, %mode, error = %e, "Process exited before compaction");
                    return Route::Batched(None);
                }
                Err(e) => {
                    warn!(pid, %mode, error = %e, code = e.errno(), "Compaction failed");
                    return Route::Batched(None);
                }
            }
        }

        self.compact_legacy(pid, mode);
        Route::Legacy
    }

    fn compact_legacy(&self, pid: u32, mode: CompactionMode) {
        if let Err(e) = self.legacy.write(pid, mode.keyword()) {
            warn!(pid, keyword = mode.keyword(), error = %e, "Legacy reclaim write failed");
        }
    }
}
