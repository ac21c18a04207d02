//! Persisted sequence counter for synthesized packets.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use crate::{store::ConfigStore, Result};

/// Monotonic counter that survives restarts.
///
/// The value handed out by [`PacketCounter::advance`] is the one to tag the current
/// packet with; the incremented value is written back before returning.
pub struct PacketCounter {
    store: Arc<dyn ConfigStore>,
    key: String,
    value: AtomicI64,
}

impl PacketCounter {
    /// Load the counter from `store`, starting at `start` if it was never saved.
    pub fn load(store: Arc<dyn ConfigStore>, key: impl Into<String>, start: i64) -> Self {
        let key = key.into();
        let value = store.get_int(&key).unwrap_or(start);
        PacketCounter {
            store,
            key,
            value: AtomicI64::new(value),
        }
    }

    /// The value the next packet will get.
    #[must_use]
    pub fn current(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Take the current value and persist its successor.
    ///
    /// # Errors
    /// Returns the store's error if the new value could not be written; the in-memory
    /// counter has advanced regardless.
    pub fn advance(&self) -> Result<i64> {
        let taken = self.value.fetch_add(1, Ordering::SeqCst);
        self.store.set_int(&self.key, taken + 1)?;
        Ok(taken)
    }
}

impl std::fmt::Debug for PacketCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCounter")
            .field("key", &self.key)
            .field("value", &self.current())
            .finish_non_exhaustive()
    }
}
