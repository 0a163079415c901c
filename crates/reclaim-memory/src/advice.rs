//! Reclaim advice selection.
//!
//! Maps one memory area plus the caller's compaction mode to the hint the
//! kernel should receive for it.

use crate::vma::Vma;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `MADV_COLD`: deactivate pages
pub const MADV_COLD: i32 = 20;

/// `MADV_PAGEOUT`: reclaim pages
pub const MADV_PAGEOUT: i32 = 21;

/// Caller flag selecting file-backed areas
pub const COMPACT_ACTION_FILE_FLAG: u32 = 1;

/// Caller flag selecting anonymous areas
pub const COMPACT_ACTION_ANON_FLAG: u32 = 2;

/// Hint for a single area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReclaimAdvice {
    /// Leave the area alone
    None,
    /// Mark pages as less recently used
    Cold,
    /// Evict pages now
    PageOut,
}

impl ReclaimAdvice {
    /// `madvise` value, or `None` for skipped areas.
    pub fn madvise(&self) -> Option<i32> {
        match self {
            Self::None => None,
            Self::Cold => Some(MADV_COLD),
            Self::PageOut => Some(MADV_PAGEOUT),
        }
    }
}

impl fmt::Display for ReclaimAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Cold => write!(f, "cold"),
            Self::PageOut => write!(f, "pageout"),
        }
    }
}

/// Which kinds of areas a compaction touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompactionMode {
    #[serde(rename = "anon")]
    AnonymousOnly,
    #[serde(rename = "file")]
    FileOnly,
    #[serde(rename = "all")]
    Both,
}

impl CompactionMode {
    /// Decode caller flags. Returns `None` if neither kind is selected.
    pub fn from_flags(flags: u32) -> Option<Self> {
        let anon = flags & COMPACT_ACTION_ANON_FLAG != 0;
        let file = flags & COMPACT_ACTION_FILE_FLAG != 0;

        match (anon, file) {
            (true, true) => Some(Self::Both),
            (true, false) => Some(Self::AnonymousOnly),
            (false, true) => Some(Self::FileOnly),
            (false, false) => None,
        }
    }

    pub fn flags(&self) -> u32 {
        match self {
            Self::AnonymousOnly => COMPACT_ACTION_ANON_FLAG,
            Self::FileOnly => COMPACT_ACTION_FILE_FLAG,
            Self::Both => COMPACT_ACTION_ANON_FLAG | COMPACT_ACTION_FILE_FLAG,
        }
    }

    /// Keyword understood by the legacy `/proc/<pid>/reclaim` file.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::AnonymousOnly => "anon",
            Self::FileOnly => "file",
            Self::Both => "all",
        }
    }
}

impl fmt::Display for CompactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for CompactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anon" => Ok(Self::AnonymousOnly),
            "file" => Ok(Self::FileOnly),
            "all" => Ok(Self::Both),
            other => Err(format!("unknown compaction mode: {other}")),
        }
    }
}

/// Choose the advice for `vma` under `mode`.
///
/// `Both` sends shared mappings to `Cold` while the single-kind modes skip
/// them. This mirrors long-standing kernel-facing behaviour and is kept as is.
pub fn classify(vma: &Vma, mode: CompactionMode) -> ReclaimAdvice {
    let private_anon = vma.is_anonymous() && !vma.is_shared;
    let private_file = !vma.is_anonymous() && !vma.is_shared;

    match mode {
        CompactionMode::FileOnly if private_file => ReclaimAdvice::Cold,
        CompactionMode::FileOnly => ReclaimAdvice::None,
        CompactionMode::AnonymousOnly if private_anon => ReclaimAdvice::PageOut,
        CompactionMode::AnonymousOnly => ReclaimAdvice::None,
        CompactionMode::Both if private_anon => ReclaimAdvice::PageOut,
        CompactionMode::Both => ReclaimAdvice::Cold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vma(inode: u64, is_shared: bool) -> Vma {
        Vma {
            start: 0x1000,
            end: 0x2000,
            inode,
            is_shared,
            name: String::new(),
        }
    }

    #[test]
    fn test_classification_table() {
        let anon_private = vma(0, false);
        let anon_shared = vma(0, true);
        let file_private = vma(12, false);
        let file_shared = vma(12, true);

        use CompactionMode::*;
        use ReclaimAdvice as A;

        let expected = [
            (FileOnly, [A::None, A::None, A::Cold, A::None]),
            (AnonymousOnly, [A::PageOut, A::None, A::None, A::None]),
            (Both, [A::PageOut, A::Cold, A::Cold, A::Cold]),
        ];

        for (mode, advice) in expected {
            let got = [
                classify(&anon_private, mode),
                classify(&anon_shared, mode),
                classify(&file_private, mode),
                classify(&file_shared, mode),
            ];
            assert_eq!(got, advice, "mode {mode}");
        }
    }

    #[test]
    fn test_flags_decoding() {
        assert_eq!(CompactionMode::from_flags(0), None);
        assert_eq!(CompactionMode::from_flags(1), Some(CompactionMode::FileOnly));
        assert_eq!(CompactionMode::from_flags(2), Some(CompactionMode::AnonymousOnly));
        assert_eq!(CompactionMode::from_flags(3), Some(CompactionMode::Both));
        // Unknown bits are ignored
        assert_eq!(CompactionMode::from_flags(4), None);
        assert_eq!(CompactionMode::Both.flags(), 3);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(CompactionMode::AnonymousOnly.keyword(), "anon");
        assert_eq!(CompactionMode::FileOnly.keyword(), "file");
        assert_eq!(CompactionMode::Both.keyword(), "all");
        assert_eq!("ALL".parse::<CompactionMode>(), Ok(CompactionMode::Both));
        assert!("both".parse::<CompactionMode>().is_err());
    }

    #[test]
    fn test_madvise_values() {
        assert_eq!(ReclaimAdvice::Cold.madvise(), Some(20));
        assert_eq!(ReclaimAdvice::PageOut.madvise(), Some(21));
        assert_eq!(ReclaimAdvice::None.madvise(), None);
    }
}
