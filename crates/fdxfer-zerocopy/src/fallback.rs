//! Buffered read/write copy loop
//!
//! Used by the dispatcher whenever no accelerated strategy finished the job,
//! and usable on its own with any `Read`/`Write` pair.

use crate::limit::Remaining;
use fdxfer_types::{BufferSize, Error, Result, TransferMethod};
use std::io::{self, Read, Write};
use tracing::debug;

/// Copy from `src` to `dst` through a user-space buffer
///
/// Stops at end of data or after `limit` bytes. Interrupted reads and writes
/// are retried; any other error aborts the copy and is returned with the
/// bytes already written.
pub fn copy_buffered<W, R>(
    dst: &mut W,
    src: &mut R,
    limit: Option<u64>,
    buffer_size: BufferSize,
) -> Result<u64>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    let mut written = 0;
    copy_into(dst, src, Remaining::new(limit), buffer_size, &mut written)
        .map(|()| written)
        .map_err(|err| Error::transfer(written, TransferMethod::Fallback, err))
}

pub(crate) fn copy_into<W, R>(
    dst: &mut W,
    src: &mut R,
    mut remaining: Remaining,
    buffer_size: BufferSize,
    written: &mut u64,
) -> io::Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    if remaining.is_exhausted() {
        return Ok(());
    }
    let mut buf = vec![0u8; remaining.cap(buffer_size.get())];
    loop {
        let len = remaining.cap(buf.len());
        if len == 0 {
            break;
        }
        let n = match src.read(&mut buf[..len]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let mut pending = &buf[..n];
        while !pending.is_empty() {
            match dst.write(pending) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(m) => {
                    *written += m as u64;
                    remaining.consume(m as u64);
                    pending = &pending[m..];
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
    debug!("buffered copy moved {} bytes", written);
    Ok(())
}
