//! Lock-protected slots through which collectors hand results to readers.
//!
//! Each metric family owns one `Published<T>`. The collector builds the new
//! value outside the lock and only the assignment happens under it, so a
//! reader never sees a half-written family and never waits on file I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Shared, lock-protected current value of one metric family.
#[derive(Debug, Default)]
pub struct Published<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Published<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Runs `f` against the current value under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Mutates the value in place under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Replaces the whole value.
    pub fn replace(&self, value: T) -> T {
        self.update(|slot| std::mem::replace(slot, value))
    }
}

impl<T: Clone> Published<T> {
    /// Copy of the current value.
    pub fn get(&self) -> T {
        self.read(T::clone)
    }
}

/// Lower bound of the user-adjustable refresh interval, in seconds.
pub const MIN_REFRESH_SECS: f64 = 0.5;
/// Upper bound of the user-adjustable refresh interval, in seconds.
pub const MAX_REFRESH_SECS: f64 = 5.0;

/// Refresh interval shared between the consumer and the fast collectors.
///
/// Stored as milliseconds so loops can re-read it every tick without a lock.
#[derive(Debug, Clone)]
pub struct RefreshInterval {
    millis: Arc<AtomicU64>,
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::from_seconds(1.0)
    }
}

impl RefreshInterval {
    pub fn from_seconds(seconds: f64) -> Self {
        let interval = Self {
            millis: Arc::new(AtomicU64::new(1000)),
        };
        interval.set_seconds(seconds);
        interval
    }

    /// Sets the interval clamped to `[0.5, 5.0]` seconds and returns the
    /// value actually applied. NaN leaves the interval unchanged.
    pub fn set_seconds(&self, seconds: f64) -> f64 {
        if seconds.is_nan() {
            return self.seconds();
        }
        let clamped = seconds.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);
        self.millis
            .store((clamped * 1000.0).round() as u64, Ordering::Relaxed);
        clamped
    }

    pub fn seconds(&self) -> f64 {
        self.millis.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_update_and_read() {
        let slot = Published::new(vec![1, 2]);
        let reader = slot.clone();
        slot.update(|v| v.push(3));
        assert_eq!(reader.get(), vec![1, 2, 3]);
        assert_eq!(reader.read(|v| v.len()), 3);

        let old = slot.replace(vec![9]);
        assert_eq!(old, vec![1, 2, 3]);
        assert_eq!(reader.get(), vec![9]);
    }

    #[test]
    fn test_published_survives_poisoned_lock() {
        let slot = Published::new(5u32);
        let writer = slot.clone();
        let _ = std::thread::spawn(move || {
            writer.update(|_| panic!("writer panicked"));
        })
        .join();
        assert_eq!(slot.get(), 5);
        slot.update(|v| *v = 6);
        assert_eq!(slot.get(), 6);
    }

    #[test]
    fn test_refresh_interval_clamped() {
        let interval = RefreshInterval::default();
        assert_eq!(interval.seconds(), 1.0);

        assert_eq!(interval.set_seconds(0.1), 0.5);
        assert_eq!(interval.duration(), Duration::from_millis(500));

        assert_eq!(interval.set_seconds(30.0), 5.0);
        assert_eq!(interval.seconds(), 5.0);

        assert_eq!(interval.set_seconds(2.25), 2.25);
        assert_eq!(interval.set_seconds(f64::NAN), 2.25);
        assert_eq!(interval.set_seconds(f64::INFINITY), 5.0);
    }

    #[test]
    fn test_refresh_interval_shared_between_clones() {
        let a = RefreshInterval::from_seconds(3.0);
        let b = a.clone();
        a.set_seconds(0.75);
        assert_eq!(b.seconds(), 0.75);
    }
}
