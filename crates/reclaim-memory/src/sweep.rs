//! System-wide sweep over background system processes.
//!
//! Every non-application process except the supervisor itself gets a full
//! (`all`) compaction. Application processes are left to per-pid policy.

use crate::advice::CompactionMode;
use crate::fallback::{Engine, Route};
use serde::Serialize;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, info, warn};

/// A live process and its owning uid, if readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub uid: Option<u32>,
}

/// Lists running processes.
pub trait ProcessTable: Send + Sync {
    fn processes(&self) -> Vec<ProcessEntry>;
}

/// Process listing backed by `sysinfo`. Thread entries are dropped.
///
/// Always reads the live `/proc`; uids are effective uids.
#[derive(Debug, Default)]
pub struct SysinfoTable;

impl ProcessTable for SysinfoTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_user(UpdateKind::Always),
        );

        system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                uid: process.effective_user_id().map(|uid| **uid),
            })
            .collect()
    }
}

/// Process listing read straight from a procfs root.
///
/// The owner of `<proc_root>/<pid>/status` is taken as the process uid.
/// Pids whose status can no longer be stat'ed have exited and are dropped.
#[derive(Debug, Clone)]
pub struct ProcfsTable {
    proc_root: PathBuf,
}

impl ProcfsTable {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl ProcessTable for ProcfsTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.proc_root.display(), error = %e, "Failed to list processes");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(|pid| {
                let status = self.proc_root.join(pid.to_string()).join("status");
                match fs::metadata(&status) {
                    Ok(meta) => Some(ProcessEntry {
                        pid,
                        uid: Some(meta.uid()),
                    }),
                    Err(e) => {
                        debug!(pid, error = %e, "Process gone while listing");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Outcome counters of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Processes listed
    pub visited: usize,
    /// The supervising process
    pub skipped_self: usize,
    /// Owned by an application uid
    pub skipped_app: usize,
    /// Uid could not be read
    pub skipped_unknown: usize,
    /// Compacted through `process_madvise`
    pub compacted: usize,
    /// Handed to `/proc/<pid>/reclaim`
    pub legacy: usize,
    /// Batched attempts that failed and were absorbed
    pub failed: usize,
}

impl Engine {
    /// Process listing for the configured procfs root.
    ///
    /// `sysinfo` only knows the live `/proc`, so any other root is listed
    /// directly.
    pub fn process_table(&self) -> Box<dyn ProcessTable> {
        if self.config.proc_root == Path::new("/proc") {
            Box::new(SysinfoTable)
        } else {
            Box::new(ProcfsTable::new(self.config.proc_root.clone()))
        }
    }

    /// Compact every eligible system process listed by `table`.
    pub fn compact_system(&self, table: &dyn ProcessTable) -> SweepReport {
        let self_pid = self.config.self_pid();
        let app_uid = self.config.first_application_uid;
        let mut report = SweepReport::default();

        let mut entries = table.processes();
        entries.sort_unstable_by_key(|e| e.pid);

        for entry in entries {
            report.visited += 1;

            if entry.pid == self_pid {
                report.skipped_self += 1;
                continue;
            }

            let Some(uid) = entry.uid else {
                debug!(pid = entry.pid, "No owner uid, skipping");
                report.skipped_unknown += 1;
                continue;
            };

            if uid >= app_uid {
                report.skipped_app += 1;
                continue;
            }

            match self.compact_or_fallback(entry.pid, CompactionMode::Both) {
                Route::Batched(Some(_)) => report.compacted += 1,
                Route::Batched(None) => report.failed += 1,
                Route::Legacy => report.legacy += 1,
                Route::Noop => {}
            }
        }

        info!(
            visited = report.visited,
            compacted = report.compacted,
            legacy = report.legacy,
            failed = report.failed,
            skipped_app = report.skipped_app,
            "System compaction finished"
        );

        report
    }
}
