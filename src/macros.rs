//! Lock helpers shared across the crate.
//!
//! All state guarded by these locks is replaced wholesale (slot swaps, store
//! snapshots), so a panic in another holder cannot leave it half-written. The
//! macros therefore recover the guard from a poisoned lock instead of failing.

/// Acquire a `Mutex`, recovering from poisoning.
macro_rules! lock {
    ($lock:expr) => {
        $lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}

/// Acquire the read side of a `RwLock`, recovering from poisoning.
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}

/// Acquire the write side of a `RwLock`, recovering from poisoning.
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}
