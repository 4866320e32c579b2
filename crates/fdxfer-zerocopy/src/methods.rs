//! Transfer strategies and their registry
//!
//! A [`Selector`] is one kernel-assisted way of moving bytes. The dispatcher
//! asks each installed selector in priority order; [`Selectors`] is the
//! per-copier set, so tests can wrap or disable strategies without touching
//! any process-wide state.

use crate::cache::UnsupportedCache;
use crate::endpoint::Endpoint;
use crate::limit::Remaining;
use fdxfer_types::{Outcome, TransferMethod, TransferOptions};
use std::fmt;
use std::sync::Arc;

/// Everything a selector needs for one attempt
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// Destination endpoint
    pub dst: &'a Endpoint<'a>,
    /// Source endpoint
    pub src: &'a Endpoint<'a>,
    /// Bytes still allowed to move
    pub remaining: Remaining,
    /// Chunk sizes and switches
    pub options: &'a TransferOptions,
    /// Unsupported pairings seen so far
    pub cache: &'a UnsupportedCache,
}

impl Request<'_> {
    /// Whether `method` is known not to work for this pair
    pub fn known_unsupported(&self, method: TransferMethod) -> bool {
        self.options.remember_unsupported
            && self
                .cache
                .is_unsupported(method, self.src.device(), self.dst.device())
    }

    /// Remember that `method` failed for this device pairing
    ///
    /// Ignored unless both endpoints sit on a filesystem; the device numbers
    /// of pipes and sockets do not identify a pairing.
    pub fn remember_unsupported(&self, method: TransferMethod) {
        if self.options.remember_unsupported
            && self.src.on_filesystem()
            && self.dst.on_filesystem()
        {
            self.cache
                .mark_unsupported(method, self.src.device(), self.dst.device());
        }
    }

    /// Remember that the syscall behind `method` does not exist here
    pub fn remember_absent(&self, method: TransferMethod) {
        if self.options.remember_unsupported {
            self.cache.mark_absent(method);
        }
    }
}

/// A kernel-assisted transfer strategy
pub trait Selector: Send + Sync {
    /// Method this selector implements
    fn method(&self) -> TransferMethod;

    /// Try to move up to `request.remaining` bytes from source to destination
    ///
    /// Must move at most the remaining count and report exactly what it
    /// moved, also on failure.
    fn attempt(&self, request: &Request<'_>) -> Outcome;
}

/// The accelerated strategies a copier may use
#[derive(Clone, Default)]
pub struct Selectors {
    range_copy: Option<Arc<dyn Selector>>,
    sendfile: Option<Arc<dyn Selector>>,
    splice: Option<Arc<dyn Selector>>,
}

impl Selectors {
    /// The real strategies for this operating system
    #[cfg(target_os = "linux")]
    pub fn platform() -> Self {
        use crate::linux::{RangeCopy, SendFile, Splice};

        Self {
            range_copy: Some(Arc::new(RangeCopy)),
            sendfile: Some(Arc::new(SendFile)),
            splice: Some(Arc::new(Splice)),
        }
    }

    /// The real strategies for this operating system
    #[cfg(not(target_os = "linux"))]
    pub fn platform() -> Self {
        Self::none()
    }

    /// No accelerated strategy; every transfer uses the fallback loop
    pub fn none() -> Self {
        Self::default()
    }

    fn slot(&mut self, method: TransferMethod) -> Option<&mut Option<Arc<dyn Selector>>> {
        match method {
            TransferMethod::RangeCopy => Some(&mut self.range_copy),
            TransferMethod::SendFile => Some(&mut self.sendfile),
            TransferMethod::Splice => Some(&mut self.splice),
            TransferMethod::Fallback => None,
        }
    }

    /// Selector installed for `method`
    pub fn get(&self, method: TransferMethod) -> Option<&Arc<dyn Selector>> {
        match method {
            TransferMethod::RangeCopy => self.range_copy.as_ref(),
            TransferMethod::SendFile => self.sendfile.as_ref(),
            TransferMethod::Splice => self.splice.as_ref(),
            TransferMethod::Fallback => None,
        }
    }

    /// Install a selector under its own method
    pub fn with(mut self, selector: Arc<dyn Selector>) -> Self {
        if let Some(slot) = self.slot(selector.method()) {
            *slot = Some(selector);
        }
        self
    }

    /// Remove the selector for `method`
    pub fn without(mut self, method: TransferMethod) -> Self {
        if let Some(slot) = self.slot(method) {
            *slot = None;
        }
        self
    }

    /// Replace every installed selector with `wrap(selector)`
    pub fn map<F>(mut self, mut wrap: F) -> Self
    where
        F: FnMut(Arc<dyn Selector>) -> Arc<dyn Selector>,
    {
        for slot in [&mut self.range_copy, &mut self.sendfile, &mut self.splice] {
            *slot = slot.take().map(&mut wrap);
        }
        self
    }

    /// Methods with an installed selector, in priority order
    pub fn installed(&self) -> Vec<TransferMethod> {
        TransferMethod::ALL
            .into_iter()
            .filter(|&method| self.get(method).is_some())
            .collect()
    }
}

impl fmt::Debug for Selectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selectors")
            .field("installed", &self.installed())
            .finish()
    }
}
