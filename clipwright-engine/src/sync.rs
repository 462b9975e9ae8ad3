use std::sync::{Mutex, MutexGuard, PoisonError};

// Poisoning is ignored: every critical section leaves its data consistent.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
