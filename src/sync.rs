//! Mutex helpers.

use std::sync::{Mutex, MutexGuard};

/// Lock acquisition that survives poisoning.
///
/// Guarded sections in this crate only perform single-step map updates, so
/// state left behind by a panicking holder is still consistent.
pub(crate) trait MutexExt<T> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    mutex_type = std::any::type_name::<T>(),
                    file = loc.file(),
                    line = loc.line(),
                    column = loc.column(),
                    "mutex poisoned by a panicking holder; recovering"
                );
                poisoned.into_inner()
            }
        }
    }
}
