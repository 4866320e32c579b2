//! Endpoint capability probe
//!
//! Classifies an open descriptor without reading from or writing to it.

use fdxfer_types::{EndpointKind, Error, FileIdentity, Result};
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use tracing::trace;

/// A caller-owned descriptor together with what the probe learned about it
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'fd> {
    fd: BorrowedFd<'fd>,
    kind: EndpointKind,
    append: bool,
    identity: Option<FileIdentity>,
}

impl<'fd> Endpoint<'fd> {
    /// Inspect `fd`
    ///
    /// Fails with [`Error::InvalidArgument`] when the descriptor is not open.
    /// A descriptor whose type cannot be determined is classified as
    /// [`EndpointKind::Other`].
    pub fn probe(fd: BorrowedFd<'fd>) -> Result<Self> {
        let raw = fd.as_raw_fd();

        // SAFETY: F_GETFL takes no argument and only reads descriptor state.
        let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
        if flags < 0 {
            let err = io::Error::last_os_error();
            return Err(Error::invalid_argument(format!(
                "descriptor {} is not usable: {}",
                raw, err
            )));
        }
        let append = flags & libc::O_APPEND != 0;

        let (kind, identity) = match fstat(raw) {
            Ok(stat) => {
                let identity = FileIdentity {
                    device: stat.st_dev as u64,
                    inode: stat.st_ino as u64,
                };
                let kind = match stat.st_mode & libc::S_IFMT {
                    libc::S_IFREG => EndpointKind::RegularFile,
                    libc::S_IFIFO => EndpointKind::Pipe,
                    libc::S_IFSOCK if is_stream_socket(raw) => EndpointKind::StreamSocket,
                    _ => EndpointKind::Other,
                };
                (kind, Some(identity))
            }
            Err(err) => {
                trace!("fstat({}) failed: {}", raw, err);
                (EndpointKind::Other, None)
            }
        };

        trace!("descriptor {} probed as {} (append: {})", raw, kind, append);
        Ok(Self {
            fd,
            kind,
            append,
            identity,
        })
    }

    /// Borrowed descriptor
    pub fn fd(&self) -> BorrowedFd<'fd> {
        self.fd
    }

    /// Raw descriptor number, for syscalls
    pub fn raw(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Endpoint classification
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Whether writes always go to the end of the file
    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Whether the endpoint is a connected-stream socket
    pub fn is_stream(&self) -> bool {
        self.kind == EndpointKind::StreamSocket
    }

    /// Device and inode, when `fstat` succeeded
    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    /// Device the descriptor lives on, or 0 when unknown
    pub fn device(&self) -> u64 {
        self.identity.map_or(0, |identity| identity.device)
    }

    /// Whether [`Endpoint::device`] names a real filesystem
    ///
    /// Pipes and sockets report a pseudo-filesystem shared by every other
    /// pipe or socket in the system.
    pub fn on_filesystem(&self) -> bool {
        self.identity.is_some() && self.kind == EndpointKind::RegularFile
    }

    /// Whether both endpoints refer to the same file
    pub fn same_file(&self, other: &Endpoint<'_>) -> bool {
        matches!((self.identity, other.identity), (Some(a), Some(b)) if a == b)
    }

    /// Current file offset, for seekable endpoints
    pub fn offset(&self) -> Option<u64> {
        if !self.kind.is_seekable() {
            return None;
        }
        // SAFETY: SEEK_CUR with a zero delta does not move the offset.
        let pos = unsafe { libc::lseek(self.raw(), 0, libc::SEEK_CUR) };
        u64::try_from(pos).ok()
    }
}

fn fstat(fd: RawFd) -> io::Result<libc::stat> {
    let mut stat = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: fstat fills the whole struct on success.
    if unsafe { libc::fstat(fd, stat.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: initialized by the successful call above.
    Ok(unsafe { stat.assume_init() })
}

fn socket_option(fd: RawFd, option: libc::c_int) -> Option<libc::c_int> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: value and len describe a valid c_int buffer.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            std::ptr::addr_of_mut!(value).cast(),
            &mut len,
        )
    };
    (rc == 0).then_some(value)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn socket_domain(fd: RawFd) -> Option<libc::c_int> {
    socket_option(fd, libc::SO_DOMAIN)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn socket_domain(fd: RawFd) -> Option<libc::c_int> {
    let mut addr = MaybeUninit::<libc::sockaddr_storage>::zeroed();
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    // SAFETY: addr is large enough for any socket address.
    let rc = unsafe { libc::getsockname(fd, addr.as_mut_ptr().cast(), &mut len) };
    if rc != 0 {
        return None;
    }
    // SAFETY: zero-initialized and partially filled by getsockname.
    Some(libc::c_int::from(unsafe { addr.assume_init() }.ss_family))
}

/// Stream socket in a supported domain that is not listening
fn is_stream_socket(fd: RawFd) -> bool {
    let stream = socket_option(fd, libc::SO_TYPE) == Some(libc::SOCK_STREAM);
    stream
        && socket_option(fd, libc::SO_ACCEPTCONN) != Some(1)
        && matches!(
            socket_domain(fd),
            Some(libc::AF_UNIX | libc::AF_INET | libc::AF_INET6)
        )
}
