//! Linux-specific zero-copy implementations
//!
//! `copy_file_range(2)`, `sendfile(2)` and `splice(2)` selectors, plus the
//! small amount of descriptor plumbing they share.

mod pipe;
mod range_copy;
mod sendfile;
mod splice;

pub use range_copy::RangeCopy;
pub use sendfile::SendFile;
pub use splice::Splice;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use std::io;
use std::os::fd::BorrowedFd;
use std::sync::OnceLock;

/// Block until `fd` reports one of `events`
///
/// Hang-ups and errors also wake the caller; the next syscall reports them.
pub(crate) fn wait(fd: BorrowedFd<'_>, events: PollFlags) -> io::Result<()> {
    loop {
        match poll(fd, events, PollTimeout::NONE) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno.into()),
        }
    }
}

/// Whether `fd` reports one of `events` right now
pub(crate) fn is_ready(fd: BorrowedFd<'_>, events: PollFlags) -> bool {
    matches!(poll(fd, events, PollTimeout::ZERO), Ok(revents) if !revents.is_empty())
}

fn poll(fd: BorrowedFd<'_>, events: PollFlags, timeout: PollTimeout) -> nix::Result<PollFlags> {
    let mut fds = [PollFd::new(fd, events)];
    nix::poll::poll(&mut fds, timeout)?;
    Ok(fds[0].revents().unwrap_or(PollFlags::empty()))
}

/// `write(2)` the whole buffer, waiting out `EAGAIN`
pub(crate) fn write_all_fd(fd: BorrowedFd<'_>, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match nix::unistd::write(fd, buf) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => continue,
            Err(Errno::EAGAIN) => wait(fd, PollFlags::POLLOUT)?,
            Err(errno) => return Err(errno.into()),
        }
    }
    Ok(())
}

/// Running kernel as `(major, minor)`, read once per process
pub fn kernel_version() -> Option<(u32, u32)> {
    static VERSION: OnceLock<Option<(u32, u32)>> = OnceLock::new();
    *VERSION.get_or_init(|| {
        let uts = nix::sys::utsname::uname().ok()?;
        parse_release(&uts.release().to_string_lossy())
    })
}

fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
