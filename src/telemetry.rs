//! Last-use tracking.
//!
//! A database reports each time it is opened, committed or closed to an
//! optional [`UsageSink`] handed in through `OpenOptions`.

use std::cell::Cell;

pub trait UsageSink {
    /// Called with the current Unix time in seconds.
    fn record_use(&self, at: i64);
}

/// Keeps the most recent use time. Never moves backwards.
#[derive(Debug, Default)]
pub struct LastUseTime {
    last: Cell<i64>,
}

impl LastUseTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero until the first use is recorded.
    pub fn get(&self) -> i64 {
        self.last.get()
    }
}

impl UsageSink for LastUseTime {
    fn record_use(&self, at: i64) {
        if at > self.last.get() {
            self.last.set(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_use_is_monotonic() {
        let sink = LastUseTime::new();
        sink.record_use(100);
        sink.record_use(50);
        assert_eq!(sink.get(), 100);
        sink.record_use(150);
        assert_eq!(sink.get(), 150);
    }
}
