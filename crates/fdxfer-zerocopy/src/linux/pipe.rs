//! Bridge pipes for socket-to-anything splicing

use fdxfer_types::ChunkSize;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::Mutex;
use tracing::trace;

/// Idle pipes kept for reuse
const POOL_CAPACITY: usize = 16;

static POOL: Mutex<Vec<Pipe>> = Mutex::new(Vec::new());

/// Non-blocking kernel pipe plus a count of the bytes sitting in it
#[derive(Debug)]
pub(crate) struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
    /// Bytes drained into the pipe and not yet pumped out
    pub(crate) buffered: usize,
}

impl Pipe {
    fn create() -> io::Result<Self> {
        let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK)?;

        // A larger pipe means fewer round trips. Failure only costs speed.
        let size = ChunkSize::SPLICE_DEFAULT.get() as libc::c_int;
        if let Err(errno) = fcntl(&write, FcntlArg::F_SETPIPE_SZ(size)) {
            trace!("could not grow bridge pipe to {} bytes: {}", size, errno);
        }

        Ok(Self {
            read,
            write,
            buffered: 0,
        })
    }

    /// Take an idle pipe from the pool, or create one
    pub(crate) fn acquire() -> io::Result<Self> {
        let pooled = POOL.lock().ok().and_then(|mut pool| pool.pop());
        match pooled {
            Some(pipe) => Ok(pipe),
            None => Self::create(),
        }
    }

    /// Give the pipe back; a pipe still holding data is closed instead
    pub(crate) fn release(self) {
        if self.buffered != 0 {
            trace!("destroying bridge pipe holding {} bytes", self.buffered);
            return;
        }
        if let Ok(mut pool) = POOL.lock() {
            if pool.len() < POOL_CAPACITY {
                pool.push(self);
            }
        }
    }

    pub(crate) fn read_end(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }

    pub(crate) fn write_end(&self) -> BorrowedFd<'_> {
        self.write.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_pipe_is_destroyed() {
        let mut pipe = Pipe::acquire().unwrap();
        crate::linux::write_all_fd(pipe.write_end(), b"x").unwrap();
        pipe.buffered = 1;
        let reader = pipe.read_end().try_clone_to_owned().unwrap();
        pipe.release();

        let mut buf = [0u8; 4];
        assert_eq!(nix::unistd::read(&reader, &mut buf).unwrap(), 1);
        // Write end closed: end of data instead of EAGAIN.
        assert_eq!(nix::unistd::read(&reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_clean_pipe_is_reusable() {
        let pipe = Pipe::acquire().unwrap();
        assert_eq!(pipe.buffered, 0);
        assert!(crate::linux::is_ready(
            pipe.write_end(),
            nix::poll::PollFlags::POLLOUT
        ));
        pipe.release();
        assert!(Pipe::acquire().is_ok());
    }
}
