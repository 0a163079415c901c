//! Recording doubles for the kernel-facing traits.

use crate::advice::ReclaimAdvice;
use crate::batch::{AddressRange, ReclaimBackend, ReclaimTarget};
use crate::error::ReclaimError;
use crate::fallback::LegacyReclaim;
use crate::sweep::{ProcessEntry, ProcessTable};
use crate::vma::{Vma, VmaSource};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// `n` private anonymous areas of one page each.
pub fn vmas(n: usize) -> Vec<Vma> {
    (0..n)
        .map(|i| Vma {
            start: 0x10000 + i * 0x2000,
            end: 0x10000 + i * 0x2000 + 0x1000,
            inode: 0,
            is_shared: false,
            name: String::new(),
        })
        .collect()
}

pub fn vma(start: usize, inode: u64, is_shared: bool) -> Vma {
    Vma {
        start,
        end: start + 0x1000,
        inode,
        is_shared,
        name: String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviseCall {
    pub pid: u32,
    pub advice: ReclaimAdvice,
    pub ranges: Vec<AddressRange>,
}

#[derive(Default)]
struct BackendState {
    calls: Vec<AdviseCall>,
    failures: HashMap<usize, i32>,
}

/// Backend that records every call. Failures are scripted by call index.
#[derive(Default, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
    open_errno: Option<i32>,
    opens: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn fail_open(mut self, errno: i32) -> Self {
        self.open_errno = Some(errno);
        self
    }

    pub fn fail_call(self, index: usize, errno: i32) -> Self {
        self.state.lock().unwrap().failures.insert(index, errno);
        self
    }

    pub fn calls(&self) -> Vec<AdviseCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct FakeTarget {
    pid: u32,
    state: Arc<Mutex<BackendState>>,
    live: Arc<AtomicUsize>,
}

impl ReclaimTarget for FakeTarget {
    fn advise(&self, ranges: &[AddressRange], advice: ReclaimAdvice) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let index = state.calls.len();
        state.calls.push(AdviseCall {
            pid: self.pid,
            advice,
            ranges: ranges.to_vec(),
        });

        match state.failures.get(&index) {
            Some(errno) => Err(io::Error::from_raw_os_error(*errno)),
            None => Ok(ranges.iter().map(|r| r.len).sum()),
        }
    }
}

impl Drop for FakeTarget {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReclaimBackend for FakeBackend {
    fn open(&self, pid: u32) -> io::Result<Box<dyn ReclaimTarget>> {
        if let Some(errno) = self.open_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTarget {
            pid,
            state: self.state.clone(),
            live: self.live.clone(),
        }))
    }
}

/// Fixed area lists per pid; unknown pids behave like exited processes.
#[derive(Default, Clone)]
pub struct FakeVmas {
    areas: Arc<Mutex<HashMap<u32, Vec<Vma>>>>,
    reads: Arc<AtomicUsize>,
}

impl FakeVmas {
    pub fn with(self, pid: u32, vmas: Vec<Vma>) -> Self {
        self.areas.lock().unwrap().insert(pid, vmas);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl VmaSource for FakeVmas {
    fn vmas(&self, pid: u32) -> Result<Vec<Vma>, ReclaimError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.areas
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or(ReclaimError::ProcessNotFound(pid))
    }
}

/// Records legacy keyword writes.
#[derive(Default, Clone)]
pub struct FakeLegacy {
    writes: Arc<Mutex<Vec<(u32, String)>>>,
    failing: Arc<Mutex<HashSet<u32>>>,
}

impl FakeLegacy {
    pub fn fail_for(self, pid: u32) -> Self {
        self.failing.lock().unwrap().insert(pid);
        self
    }

    pub fn writes(&self) -> Vec<(u32, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl LegacyReclaim for FakeLegacy {
    fn write(&self, pid: u32, keyword: &str) -> io::Result<()> {
        self.writes.lock().unwrap().push((pid, keyword.to_string()));
        if self.failing.lock().unwrap().contains(&pid) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        Ok(())
    }
}

/// Static process list.
#[derive(Default, Clone)]
pub struct FakeTable {
    pub entries: Vec<ProcessEntry>,
}

impl FakeTable {
    pub fn with(mut self, pid: u32, uid: Option<u32>) -> Self {
        self.entries.push(ProcessEntry { pid, uid });
        self
    }
}

impl ProcessTable for FakeTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        self.entries.clone()
    }
}
