//! Thin wrappers over the inotify system calls.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd};
use std::path::Path;

/// Kernel-assigned identifier of a single watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchDescriptor(pub(crate) i32);

impl WatchDescriptor {
    /// The raw descriptor value the kernel reports in event records.
    pub fn id(&self) -> i32 {
        self.0
    }
}

/// Creates a new inotify instance, non-blocking and closed on exec.
pub(super) fn init() -> io::Result<OwnedFd> {
    let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by the kernel and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub(super) fn add_watch(fd: BorrowedFd<'_>, path: &Path, mask: u32) -> io::Result<WatchDescriptor> {
    let path = CString::new(path.as_os_str().as_bytes())?;
    let wd = unsafe { libc::inotify_add_watch(fd.as_raw_fd(), path.as_ptr(), mask) };
    match wd {
        -1 => Err(io::Error::last_os_error()),
        _ => Ok(WatchDescriptor(wd)),
    }
}

pub(super) fn rm_watch(fd: BorrowedFd<'_>, wd: WatchDescriptor) -> io::Result<()> {
    let result = unsafe { libc::inotify_rm_watch(fd.as_raw_fd(), wd.0) };
    match result {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Reads whatever the kernel has queued into `buffer`, returning the number of bytes.
///
/// Fails with `WouldBlock` if nothing is queued.
pub(super) fn read(fd: BorrowedFd<'_>, buffer: &mut [u8]) -> io::Result<usize> {
    // SAFETY: the pointer and length describe a valid, writable slice.
    let n = unsafe {
        libc::read(
            fd.as_raw_fd(),
            buffer.as_mut_ptr().cast::<libc::c_void>(),
            buffer.len(),
        )
    };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Closes the instance, reporting the error `OwnedFd`'s drop would swallow.
pub(super) fn close(fd: OwnedFd) -> io::Result<()> {
    let result = unsafe { libc::close(fd.into_raw_fd()) };
    match result {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}
