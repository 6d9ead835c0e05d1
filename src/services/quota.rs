//! Per-scope storage accounting and quota enforcement.

use crate::models::{OwnerScope, StorageUsage};
use crate::storage::traits::RecordStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Computes used storage for an owner scope and gates uploads on quota.
///
/// Only originals count: a duplicate link consumes no quota regardless of
/// its size. The quota check runs before any bytes are durably written so a
/// rejection never leaves partial state.
pub struct StorageAccountant<S: RecordStore> {
    store: Arc<S>,
    quota_bytes: u64,
}

impl<S: RecordStore> StorageAccountant<S> {
    /// Creates an accountant with the given quota limit.
    #[must_use]
    pub const fn new(store: Arc<S>, quota_bytes: u64) -> Self {
        Self { store, quota_bytes }
    }

    /// Returns the configured quota in bytes.
    #[must_use]
    pub const fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Sums bytes consumed by in-scope originals.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store query fails.
    pub fn used_bytes(&self, owner: &OwnerScope) -> Result<u64> {
        self.store.used_bytes(owner)
    }

    /// Rejects the upload if it would push the scope over quota.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] when `used + incoming > limit`, or a
    /// storage error if usage cannot be computed.
    #[instrument(skip(self), fields(owner = %owner, incoming = incoming))]
    pub fn check_quota(&self, owner: &OwnerScope, incoming: u64) -> Result<()> {
        let used = self.used_bytes(owner)?;
        // checked_add: a declared size near u64::MAX must reject, not wrap.
        if used
            .checked_add(incoming)
            .is_none_or(|total| total > self.quota_bytes)
        {
            metrics::counter!("filedup_quota_rejections_total").increment(1);
            return Err(Error::QuotaExceeded {
                used,
                incoming,
                limit: self.quota_bytes,
            });
        }
        Ok(())
    }

    /// Returns the scope's usage summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store query fails.
    pub fn usage(&self, owner: &OwnerScope) -> Result<StorageUsage> {
        Ok(StorageUsage::new(self.used_bytes(owner)?, self.quota_bytes))
    }
}
