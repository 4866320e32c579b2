//! Transfer dispatcher
//!
//! Probes both endpoints, tries the installed selectors in priority order,
//! and finishes with the buffered loop when no selector owned the result.

use crate::cache::UnsupportedCache;
use crate::endpoint::Endpoint;
use crate::fallback;
use crate::limit::{Limited, Remaining};
use crate::methods::{Request, Selectors};
use fdxfer_types::{
    EndpointKind, Error, Outcome, Result, TransferMethod, TransferOptions, TransferReport,
};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::sync::Arc;
use tracing::{debug, trace};

/// Bulk data mover between two open descriptors
#[derive(Debug, Clone)]
pub struct Copier {
    options: TransferOptions,
    selectors: Selectors,
    cache: Arc<UnsupportedCache>,
}

impl Copier {
    /// Create a copier with default options and the platform's selectors
    pub fn new() -> Self {
        Self::with_options(TransferOptions::default())
    }

    /// Create a copier with custom options
    pub fn with_options(options: TransferOptions) -> Self {
        Self {
            options,
            selectors: Selectors::platform(),
            cache: UnsupportedCache::global(),
        }
    }

    /// Replace the selectors used by this copier
    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Use a private unsupported-pairing cache
    pub fn with_cache(mut self, cache: Arc<UnsupportedCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Options in effect
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Installed selectors
    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    /// Move bytes from `src` to `dst` until end of data or `limit` bytes
    ///
    /// Returns the number of bytes written to `dst`. On failure the error
    /// carries the bytes written before it, see [`Error::bytes_written`].
    pub fn transfer<W, R>(&self, dst: &mut W, src: &mut R, limit: Option<u64>) -> Result<u64>
    where
        W: Write + AsFd + ?Sized,
        R: Read + AsFd + ?Sized,
    {
        self.transfer_report(dst, src, limit).map(|report| report.bytes)
    }

    /// Like [`Copier::transfer`], with the limit taken from and charged to `src`
    pub fn transfer_limited<W, R>(&self, dst: &mut W, src: &mut Limited<R>) -> Result<u64>
    where
        W: Write + AsFd + ?Sized,
        R: Read + AsFd,
    {
        let limit = src.remaining();
        let result = self.transfer(dst, src.get_mut(), Some(limit));
        match &result {
            Ok(n) => src.consume(*n),
            Err(err) => src.consume(err.bytes_written()),
        }
        result
    }

    /// Like [`Copier::transfer`], returning a per-method breakdown
    pub fn transfer_report<W, R>(
        &self,
        dst: &mut W,
        src: &mut R,
        limit: Option<u64>,
    ) -> Result<TransferReport>
    where
        W: Write + AsFd + ?Sized,
        R: Read + AsFd + ?Sized,
    {
        let mut report = TransferReport::new();
        let mut remaining = Remaining::new(limit);

        {
            let dst_endpoint = Endpoint::probe(dst.as_fd())?;
            let src_endpoint = Endpoint::probe(src.as_fd())?;
            if remaining.is_exhausted() {
                trace!("limit exhausted, nothing to do");
                return Ok(report);
            }
            if let Some(result) =
                self.accelerate(&dst_endpoint, &src_endpoint, &mut remaining, &mut report)
            {
                return result.map(|()| report);
            }
        }

        if remaining.is_exhausted() {
            return Ok(report);
        }

        debug!(
            "falling back to buffered copy after {} accelerated bytes",
            report.bytes
        );
        let mut written = 0;
        let result =
            fallback::copy_into(dst, src, remaining, self.options.buffer_size, &mut written);
        report.record(TransferMethod::Fallback, written);
        match result {
            Ok(()) => Ok(report),
            Err(err) => Err(Error::transfer(report.bytes, TransferMethod::Fallback, err)),
        }
    }

    /// Methods worth trying for this pair, in priority order
    fn plan(&self, dst: &Endpoint<'_>, src: &Endpoint<'_>) -> Vec<TransferMethod> {
        let options = &self.options;
        let (src_kind, dst_kind) = (src.kind(), dst.kind());
        let append = dst.is_append();
        let mut plan = Vec::with_capacity(3);

        if options.enable_range_copy
            && !append
            && src_kind == EndpointKind::RegularFile
            && dst_kind == EndpointKind::RegularFile
        {
            plan.push(TransferMethod::RangeCopy);
        }

        // Self-transfer through sendfile would overwrite in place instead of
        // appending a copy.
        if options.enable_sendfile
            && !append
            && !src.same_file(dst)
            && src_kind == EndpointKind::RegularFile
            && matches!(
                dst_kind,
                EndpointKind::RegularFile | EndpointKind::Pipe | EndpointKind::StreamSocket
            )
        {
            plan.push(TransferMethod::SendFile);
        }

        let pipe_peer = |kind: EndpointKind| {
            matches!(
                kind,
                EndpointKind::Pipe | EndpointKind::StreamSocket | EndpointKind::RegularFile
            )
        };
        let spliceable = (src_kind == EndpointKind::Pipe && pipe_peer(dst_kind))
            || (dst_kind == EndpointKind::Pipe && pipe_peer(src_kind))
            || src_kind == EndpointKind::StreamSocket;
        if options.enable_splice
            && spliceable
            && !(append && dst_kind == EndpointKind::RegularFile)
        {
            plan.push(TransferMethod::Splice);
        }

        plan
    }

    /// Run the selectors; `Some` means one of them owned the result
    fn accelerate(
        &self,
        dst: &Endpoint<'_>,
        src: &Endpoint<'_>,
        remaining: &mut Remaining,
        report: &mut TransferReport,
    ) -> Option<Result<()>> {
        for method in self.plan(dst, src) {
            let Some(selector) = self.selectors.get(method) else {
                continue;
            };
            if remaining.is_exhausted() {
                return Some(Ok(()));
            }

            let request = Request {
                dst,
                src,
                remaining: *remaining,
                options: &self.options,
                cache: &self.cache,
            };
            let outcome = selector.attempt(&request);
            debug!("{} from {} to {}: {:?}", method, src.kind(), dst.kind(), outcome);

            report.record(method, outcome.bytes());
            remaining.consume(outcome.bytes());
            match outcome {
                Outcome::NotApplicable | Outcome::Partial(_) => continue,
                Outcome::Completed(_) => return Some(Ok(())),
                Outcome::Failed(_, err) => {
                    return Some(Err(Error::transfer(report.bytes, method, err)))
                }
            }
        }
        None
    }
}

impl Default for Copier {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy everything from `src` to `dst` with a default [`Copier`]
pub fn copy<W, R>(dst: &mut W, src: &mut R) -> Result<u64>
where
    W: Write + AsFd + ?Sized,
    R: Read + AsFd + ?Sized,
{
    Copier::new().transfer(dst, src, None)
}

/// Copy at most `n` bytes from `src` to `dst` with a default [`Copier`]
pub fn copy_n<W, R>(dst: &mut W, src: &mut R, n: u64) -> Result<u64>
where
    W: Write + AsFd + ?Sized,
    R: Read + AsFd + ?Sized,
{
    Copier::new().transfer(dst, src, Some(n))
}

/// Copy from a [`Limited`] source with a default [`Copier`]
pub fn copy_limited<W, R>(dst: &mut W, src: &mut Limited<R>) -> Result<u64>
where
    W: Write + AsFd + ?Sized,
    R: Read + AsFd,
{
    Copier::new().transfer_limited(dst, src)
}
