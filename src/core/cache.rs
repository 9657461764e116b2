use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::Clock;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    fetched_at_ms: u64,
}

/// Single value that expires `max_age_ms` after it was set.
pub struct CachedValue<T> {
    clock: Arc<dyn Clock>,
    max_age_ms: u64,
    entry: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> CachedValue<T> {
    /// Empty cache reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>, max_age_ms: u64) -> Self {
        Self {
            clock,
            max_age_ms,
            entry: Mutex::new(None),
        }
    }

    /// Returns the value while it is younger than `max_age_ms`.
    pub fn get(&self) -> Option<T> {
        let now = self.clock.now_ms();
        let entry = self.entry.lock();
        entry
            .as_ref()
            .filter(|e| now.saturating_sub(e.fetched_at_ms) < self.max_age_ms)
            .map(|e| e.value.clone())
    }

    /// Stores `value`, stamped with the current time.
    pub fn set(&self, value: T) {
        let fetched_at_ms = self.clock.now_ms();
        *self.entry.lock() = Some(Entry {
            value,
            fetched_at_ms,
        });
    }

    /// Drops the stored value.
    pub fn invalidate(&self) {
        *self.entry.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ManualClock;

    #[test]
    fn expires_exactly_at_max_age() {
        let clock = ManualClock::new(1_000);
        let cache = CachedValue::new(Arc::new(clock.clone()), 600_000);
        cache.set(vec!["news".to_string()]);

        clock.advance(599_999);
        assert_eq!(cache.get(), Some(vec!["news".to_string()]));

        clock.advance(1);
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn clock_moving_backwards_keeps_value() {
        let clock = ManualClock::new(10_000);
        let cache = CachedValue::new(Arc::new(clock.clone()), 100);
        cache.set(7u32);
        clock.set(5_000);
        assert_eq!(cache.get(), Some(7));
    }
}
