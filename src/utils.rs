/// Utility functions for data processing and formatting
use std::collections::VecDeque;
use time::{format_description, OffsetDateTime};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Current time in the local offset, falling back to UTC when the offset
/// cannot be determined
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format a timestamp as DD-MM-YYYY HH:MM:SS
///
/// Falls back to the default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day]-[month]-[year] [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Sleep for `duration` unless shutdown is signalled first
///
/// Returns true when the caller should stop.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    let sender_gone = tokio::select! {
        _ = sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err(),
    };
    sender_gone || *shutdown.borrow()
}

/// Bounded FIFO of recent samples
///
/// Pushing beyond capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy + Into<f64>> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        RollingWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the current samples
    ///
    /// 0.0 while the window is empty. That zero means "no data yet" and is
    /// not a measured value.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|v| (*v).into()).sum();
        sum / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}
