//! `splice(2)` through pipes
//!
//! Direct mode moves bytes between a pipe and a pipe, socket or file in one
//! call. Bridged mode drains a stream socket into a pooled pipe, then pumps
//! the pipe into the destination.
//!
//! `EINVAL` here is specific to the call (a pipe spliced into itself, a
//! terminal behind the pump) and is never memoized: every pipe shares one
//! device number and so does every socket.

use super::pipe::Pipe;
use crate::endpoint::Endpoint;
use crate::methods::{Request, Selector};
use fdxfer_types::{EndpointKind, Outcome, TransferMethod};
use nix::errno::Errno;
use nix::fcntl::SpliceFFlags;
use nix::poll::PollFlags;
use std::io;
use std::os::fd::BorrowedFd;
use tracing::{debug, trace};

/// Pipe-based zero-copy between pipes, sockets and files
#[derive(Debug, Clone, Copy, Default)]
pub struct Splice;

impl Selector for Splice {
    fn method(&self) -> TransferMethod {
        TransferMethod::Splice
    }

    fn attempt(&self, request: &Request<'_>) -> Outcome {
        let (src, dst) = (request.src.kind(), request.dst.kind());
        let direct = (src == EndpointKind::Pipe && pipe_peer(dst))
            || (dst == EndpointKind::Pipe && pipe_peer(src));
        let bridged = !direct && src == EndpointKind::StreamSocket;
        if !direct && !bridged {
            return Outcome::NotApplicable;
        }
        if request.known_unsupported(self.method()) {
            return Outcome::NotApplicable;
        }

        if direct {
            splice_direct(request)
        } else {
            match Pipe::acquire() {
                Ok(pipe) => splice_bridged(request, pipe),
                Err(err) => {
                    debug!("no bridge pipe available: {}", err);
                    Outcome::NotApplicable
                }
            }
        }
    }
}

fn pipe_peer(kind: EndpointKind) -> bool {
    matches!(
        kind,
        EndpointKind::Pipe | EndpointKind::StreamSocket | EndpointKind::RegularFile
    )
}

fn splice(from: BorrowedFd<'_>, to: BorrowedFd<'_>, len: usize) -> io::Result<usize> {
    // No offsets: the kernel uses and advances any file offset.
    nix::fcntl::splice(from, None, to, None, len, SpliceFFlags::SPLICE_F_NONBLOCK)
        .map_err(io::Error::from)
}

/// Wait for whichever side made a non-blocking splice return `EAGAIN`
fn wait_either(src: &Endpoint<'_>, dst: &Endpoint<'_>) -> io::Result<()> {
    if !src.kind().is_seekable() && !super::is_ready(src.fd(), PollFlags::POLLIN) {
        super::wait(src.fd(), PollFlags::POLLIN)
    } else {
        super::wait(dst.fd(), PollFlags::POLLOUT)
    }
}

fn splice_direct(request: &Request<'_>) -> Outcome {
    let method = TransferMethod::Splice;
    let mut remaining = request.remaining;
    let mut written = 0u64;

    while !remaining.is_exhausted() {
        let chunk = remaining.chunk(request.options.splice_chunk);
        match splice(request.src.fd(), request.dst.fd(), chunk) {
            Ok(0) => break,
            Ok(n) => {
                trace!("{} moved {} bytes", method, n);
                written += n as u64;
                remaining.consume(n as u64);
            }
            Err(err) => match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => {
                    if let Err(err) = wait_either(request.src, request.dst) {
                        return Outcome::Failed(written, err);
                    }
                }
                Some(libc::ENOSYS) => {
                    request.remember_absent(method);
                    return Outcome::unsupported_after(written);
                }
                Some(libc::EINVAL) => {
                    debug!("{} rejected after {} bytes: {}", method, written, err);
                    return Outcome::unsupported_after(written);
                }
                _ => return Outcome::Failed(written, err),
            },
        }
    }
    Outcome::Completed(written)
}

fn splice_bridged(request: &Request<'_>, mut pipe: Pipe) -> Outcome {
    let outcome = bridge(request, &mut pipe);
    pipe.release();
    outcome
}

fn bridge(request: &Request<'_>, pipe: &mut Pipe) -> Outcome {
    let method = TransferMethod::Splice;
    let mut remaining = request.remaining;
    let mut written = 0u64;

    while !remaining.is_exhausted() {
        let chunk = remaining.chunk(request.options.splice_chunk);

        // Drain: socket into pipe. Zero means the peer closed.
        match splice(request.src.fd(), pipe.write_end(), chunk) {
            Ok(0) => break,
            Ok(n) => pipe.buffered = n,
            Err(err) => match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => {
                    if let Err(err) = super::wait(request.src.fd(), PollFlags::POLLIN) {
                        return Outcome::Failed(written, err);
                    }
                    continue;
                }
                Some(libc::ENOSYS) => {
                    request.remember_absent(method);
                    return Outcome::unsupported_after(written);
                }
                Some(libc::EINVAL) => {
                    debug!("{} drain rejected after {} bytes: {}", method, written, err);
                    return Outcome::unsupported_after(written);
                }
                _ => return Outcome::Failed(written, err),
            },
        }

        // Pump: pipe into destination, until the pipe is empty.
        while pipe.buffered > 0 {
            match splice(pipe.read_end(), request.dst.fd(), pipe.buffered) {
                Ok(0) => {
                    // Terminals may accept nothing without an error; this is
                    // not end of data since we own the pipe's write side.
                    if let Err(err) = super::wait(request.dst.fd(), PollFlags::POLLOUT) {
                        return Outcome::Failed(written, err);
                    }
                }
                Ok(n) => {
                    trace!("{} moved {} bytes", method, n);
                    pipe.buffered -= n;
                    written += n as u64;
                    remaining.consume(n as u64);
                }
                Err(err) => match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::EAGAIN) => {
                        if let Err(err) = super::wait(request.dst.fd(), PollFlags::POLLOUT) {
                            return Outcome::Failed(written, err);
                        }
                    }
                    Some(libc::EINVAL) => {
                        debug!(
                            "{} pump rejected with {} bytes in flight: {}",
                            method, pipe.buffered, err
                        );
                        return match rescue(pipe, request.dst.fd()) {
                            Ok(n) => Outcome::unsupported_after(written + n),
                            Err(err) => Outcome::Failed(written, err),
                        };
                    }
                    _ => return Outcome::Failed(written, err),
                },
            }
        }
    }
    Outcome::Completed(written)
}

/// Copy whatever sits in the pipe to `dst` with plain read/write
fn rescue(pipe: &mut Pipe, dst: BorrowedFd<'_>) -> io::Result<u64> {
    let mut buf = vec![0u8; pipe.buffered];
    let mut moved = 0u64;
    while pipe.buffered > 0 {
        let want = pipe.buffered.min(buf.len());
        let n = match nix::unistd::read(pipe.read_end(), &mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno.into()),
        };
        super::write_all_fd(dst, &buf[..n])?;
        pipe.buffered -= n;
        moved += n as u64;
    }
    debug!("rescued {} bytes from bridge pipe", moved);
    Ok(moved)
}
