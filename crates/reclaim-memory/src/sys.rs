//! Linux backend: `pidfd_open` + `process_madvise`.

use crate::advice::ReclaimAdvice;
use crate::batch::{AddressRange, ReclaimBackend, ReclaimTarget};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Opens pidfds for batched reclaim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidfdBackend;

/// A pidfd, closed on drop.
struct Pidfd(OwnedFd);

impl ReclaimBackend for PidfdBackend {
    fn open(&self, pid: u32) -> io::Result<Box<dyn ReclaimTarget>> {
        // SAFETY: scalar arguments only
        let ret = unsafe { libc::syscall(libc::SYS_pidfd_open, pid as libc::pid_t, 0 as libc::c_uint) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: the kernel just handed us this descriptor and nothing else owns it
        let fd = unsafe { OwnedFd::from_raw_fd(ret as RawFd) };
        Ok(Box::new(Pidfd(fd)))
    }
}

impl ReclaimTarget for Pidfd {
    fn advise(&self, ranges: &[AddressRange], advice: ReclaimAdvice) -> io::Result<usize> {
        let Some(madvise) = advice.madvise() else {
            return Ok(0);
        };

        let iov: Vec<libc::iovec> = ranges
            .iter()
            .map(|r| libc::iovec {
                iov_base: r.base as *mut libc::c_void,
                iov_len: r.len,
            })
            .collect();

        // SAFETY: `iov` outlives the call and its length is passed alongside
        let ret = unsafe {
            libc::syscall(
                libc::SYS_process_madvise,
                self.0.as_raw_fd(),
                iov.as_ptr(),
                iov.len(),
                madvise as libc::c_int,
                0 as libc::c_uint,
            )
        };

        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }
}
