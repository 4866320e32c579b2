//! `copy_file_range(2)` between two regular files

use crate::methods::{Request, Selector};
use fdxfer_types::{EndpointKind, Outcome, TransferMethod};
use std::io;
use tracing::{debug, trace};

/// Oldest kernel whose `copy_file_range(2)` neither fails across
/// filesystems nor silently copies nothing
const MIN_KERNEL: (u32, u32) = (5, 3);

/// In-kernel file-to-file copy using the descriptors' own offsets
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeCopy;

impl Selector for RangeCopy {
    fn method(&self) -> TransferMethod {
        TransferMethod::RangeCopy
    }

    fn attempt(&self, request: &Request<'_>) -> Outcome {
        let method = self.method();
        if request.src.kind() != EndpointKind::RegularFile
            || request.dst.kind() != EndpointKind::RegularFile
        {
            return Outcome::NotApplicable;
        }
        if !super::kernel_version().is_some_and(|version| version >= MIN_KERNEL) {
            debug!("kernel older than {:?}, skipping {}", MIN_KERNEL, method);
            return Outcome::NotApplicable;
        }
        if request.known_unsupported(method) {
            return Outcome::NotApplicable;
        }

        let mut remaining = request.remaining;
        let mut written = 0u64;
        while !remaining.is_exhausted() {
            let chunk = remaining.chunk(request.options.range_copy_chunk);
            // SAFETY: null offsets make the kernel use and advance both file offsets.
            let n = unsafe {
                libc::syscall(
                    libc::SYS_copy_file_range,
                    request.src.raw(),
                    std::ptr::null_mut::<libc::loff_t>(),
                    request.dst.raw(),
                    std::ptr::null_mut::<libc::loff_t>(),
                    chunk,
                    0u32,
                )
            };

            if n < 0 {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::ENOSYS | libc::EPERM) => {
                        // Missing syscall or a seccomp filter: no pairing will work.
                        request.remember_absent(method);
                        return Outcome::unsupported_after(written);
                    }
                    Some(libc::EXDEV | libc::EOPNOTSUPP | libc::EIO) => {
                        request.remember_unsupported(method);
                        debug!("{} refused after {} bytes: {}", method, written, err);
                        return Outcome::unsupported_after(written);
                    }
                    Some(libc::EINVAL) => {
                        // Overlapping ranges of one file, or a descriptor the
                        // filesystem cannot handle.
                        debug!("{} rejected after {} bytes: {}", method, written, err);
                        return Outcome::unsupported_after(written);
                    }
                    _ => return Outcome::Failed(written, err),
                }
            }

            if n == 0 {
                if written == 0 {
                    // Files such as those in procfs report size 0 and copy nothing.
                    debug!("{} copied nothing on first call, deferring", method);
                    return Outcome::NotApplicable;
                }
                break;
            }

            trace!("{} moved {} bytes", method, n);
            written += n as u64;
            remaining.consume(n as u64);
        }
        Outcome::Completed(written)
    }
}
