//! `sendfile(2)` from a regular file

use crate::methods::{Request, Selector};
use fdxfer_types::{EndpointKind, Outcome, TransferMethod};
use nix::errno::Errno;
use nix::poll::PollFlags;
use nix::sys::sendfile::sendfile;
use tracing::{debug, trace};

/// Kernel-side copy from a regular file to a socket, pipe or file
#[derive(Debug, Clone, Copy, Default)]
pub struct SendFile;

impl Selector for SendFile {
    fn method(&self) -> TransferMethod {
        TransferMethod::SendFile
    }

    fn attempt(&self, request: &Request<'_>) -> Outcome {
        let method = self.method();
        if request.src.kind() != EndpointKind::RegularFile
            || !matches!(
                request.dst.kind(),
                EndpointKind::RegularFile | EndpointKind::Pipe | EndpointKind::StreamSocket
            )
        {
            return Outcome::NotApplicable;
        }
        if request.known_unsupported(method) {
            return Outcome::NotApplicable;
        }

        let mut remaining = request.remaining;
        let mut written = 0u64;
        while !remaining.is_exhausted() {
            let chunk = remaining.chunk(request.options.sendfile_chunk);
            let n = match sendfile(request.dst.fd(), request.src.fd(), None, chunk) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => {
                    if let Err(err) = super::wait(request.dst.fd(), PollFlags::POLLOUT) {
                        return Outcome::Failed(written, err);
                    }
                    continue;
                }
                Err(Errno::ENOSYS) if written == 0 => {
                    request.remember_absent(method);
                    return Outcome::NotApplicable;
                }
                Err(errno @ (Errno::EINVAL | Errno::EOPNOTSUPP)) if written == 0 => {
                    request.remember_unsupported(method);
                    debug!("{} not supported for this pair: {}", method, errno);
                    return Outcome::NotApplicable;
                }
                Err(errno) => return Outcome::Failed(written, errno.into()),
            };

            if n == 0 {
                break;
            }

            trace!("{} moved {} bytes", method, n);
            written += n as u64;
            remaining.consume(n as u64);
        }
        Outcome::Completed(written)
    }
}
