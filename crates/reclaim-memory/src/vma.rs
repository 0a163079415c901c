//! Memory area enumeration from `/proc/<pid>/maps`.

use crate::error::ReclaimError;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// One mapped area of a process: `[start, end)` plus its backing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vma {
    pub start: usize,
    pub end: usize,
    /// Backing inode, 0 for anonymous memory
    pub inode: u64,
    /// `s` in the permission column
    pub is_shared: bool,
    /// Path or pseudo-name (`[heap]`, `[stack]`), empty if none
    pub name: String,
}

impl Vma {
    /// Length of the area in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_anonymous(&self) -> bool {
        self.inode == 0
    }

    /// Parse one line of `/proc/<pid>/maps`:
    ///
    /// ```text
    /// 7f3c1a200000-7f3c1a222000 r--p 00000000 fd:01 1835042    /usr/lib/libc.so.6
    /// ```
    pub fn parse_maps_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();

        let range = fields.next()?;
        let perms = fields.next()?;
        let _offset = fields.next()?;
        let _device = fields.next()?;
        let inode = fields.next()?.parse::<u64>().ok()?;
        let name = fields.collect::<Vec<_>>().join(" ");

        let (start, end) = range.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if end < start {
            return None;
        }

        let is_shared = perms.as_bytes().get(3) == Some(&b's');

        Some(Self {
            start,
            end,
            inode,
            is_shared,
            name,
        })
    }
}

/// Source of a process's current memory areas.
pub trait VmaSource: Send + Sync {
    /// Snapshot every area mapped into `pid`, in address order.
    fn vmas(&self, pid: u32) -> Result<Vec<Vma>, ReclaimError>;
}

/// Reads areas from `<proc_root>/<pid>/maps`.
#[derive(Debug, Clone)]
pub struct ProcMaps {
    proc_root: PathBuf,
}

impl ProcMaps {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for ProcMaps {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl VmaSource for ProcMaps {
    fn vmas(&self, pid: u32) -> Result<Vec<Vma>, ReclaimError> {
        let path = self.proc_root.join(pid.to_string()).join("maps");

        // The process may exit at any point; any read failure means it is gone
        let content = fs::read(&path).map_err(|e| {
            debug!(pid, error = %e, "Failed to read maps");
            ReclaimError::ProcessNotFound(pid)
        })?;

        // Mapped paths are arbitrary bytes; only the numeric columns must be ASCII
        let vmas = content
            .split(|&b| b == b'\n')
            .filter_map(|raw| {
                let line = String::from_utf8_lossy(raw);
                let vma = Vma::parse_maps_line(&line);
                if vma.is_none() && !line.trim().is_empty() {
                    debug!(pid, line = %line, "Skipping malformed maps line");
                }
                vma
            })
            .collect();

        Ok(vmas)
    }
}
