//! Memory of pairings the kernel refused
//!
//! This is a performance hint only. A stale or missing entry costs one failed
//! syscall or one unnecessary fallback, never correctness, so racing updates
//! are harmless.

use fdxfer_types::TransferMethod;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::warn;

/// Process-wide record of unavailable syscalls and refused device pairings
#[derive(Debug, Default)]
pub struct UnsupportedCache {
    range_copy_absent: AtomicBool,
    sendfile_absent: AtomicBool,
    splice_absent: AtomicBool,
    pairings: RwLock<HashSet<(TransferMethod, u64, u64)>>,
}

impl UnsupportedCache {
    /// Create an empty, private cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance used by default copiers
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<UnsupportedCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    fn flag(&self, method: TransferMethod) -> Option<&AtomicBool> {
        match method {
            TransferMethod::RangeCopy => Some(&self.range_copy_absent),
            TransferMethod::SendFile => Some(&self.sendfile_absent),
            TransferMethod::Splice => Some(&self.splice_absent),
            TransferMethod::Fallback => None,
        }
    }

    /// Whether the syscall behind `method` was found missing or forbidden
    pub fn is_absent(&self, method: TransferMethod) -> bool {
        self.flag(method)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Whether `method` should be skipped between the two devices
    pub fn is_unsupported(&self, method: TransferMethod, src_dev: u64, dst_dev: u64) -> bool {
        if self.is_absent(method) {
            return true;
        }
        self.pairings
            .read()
            .map(|set| set.contains(&(method, src_dev, dst_dev)))
            .unwrap_or(false)
    }

    /// Remember that the syscall behind `method` is unavailable in this process
    pub fn mark_absent(&self, method: TransferMethod) {
        if let Some(flag) = self.flag(method) {
            if !flag.swap(true, Ordering::Relaxed) {
                warn!("{} unavailable, disabled for this process", method);
            }
        }
    }

    /// Remember that `method` failed between the two devices
    pub fn mark_unsupported(&self, method: TransferMethod, src_dev: u64, dst_dev: u64) {
        if let Ok(mut set) = self.pairings.write() {
            if set.insert((method, src_dev, dst_dev)) {
                warn!(
                    "{} unsupported from device {} to device {}, remembered",
                    method, src_dev, dst_dev
                );
            }
        }
    }

    /// Forget everything
    pub fn clear(&self) {
        for method in TransferMethod::ALL {
            if let Some(flag) = self.flag(method) {
                flag.store(false, Ordering::Relaxed);
            }
        }
        if let Ok(mut set) = self.pairings.write() {
            set.clear();
        }
    }
}
