/// Process-wide sensor state behind a single lock
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AcquisitionError;
use crate::models::{CycleStats, FormatValue, PartialReading, SensorReading, Snapshot};
use crate::utils::{now, RollingWindow};

const PH_MIN: f64 = 0.0;
const PH_MAX: f64 = 14.0;

#[derive(Debug)]
struct SensorState {
    reading: SensorReading,
    ph_window: RollingWindow<f64>,
    orp_window: RollingWindow<i32>,
    stats: CycleStats,
}

/// Cloneable handle to the shared reading, windows and cycle tally
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SensorState>>,
}

impl SharedState {
    pub fn new(window_capacity: usize) -> Self {
        SharedState {
            inner: Arc::new(Mutex::new(SensorState {
                reading: SensorReading::default(),
                ph_window: RollingWindow::new(window_capacity),
                orp_window: RollingWindow::new(window_capacity),
                stats: CycleStats::default(),
            })),
        }
    }

    /// Merge a decoded response and push its sample into the matching window
    ///
    /// With `validate_range`, pH samples outside [0, 14] still update the
    /// reading but stay out of the window. ORP samples are never filtered.
    /// Returns the merged reading and whether the sample was windowed.
    pub async fn apply(
        &self,
        partial: &PartialReading,
        validate_range: bool,
    ) -> (SensorReading, bool) {
        let mut state = self.inner.lock().await;
        state.reading.merge(partial);

        let windowed = match partial.value {
            FormatValue::Ph(ph) => {
                if !validate_range || (PH_MIN..=PH_MAX).contains(&ph) {
                    state.ph_window.push(ph);
                    true
                } else {
                    state.stats.ph_rejected += 1;
                    false
                }
            }
            FormatValue::Orp(orp) => {
                state.orp_window.push(orp);
                true
            }
        };
        state.stats.succeeded += 1;

        (state.reading, windowed)
    }

    pub async fn record_failure(&self, error: &AcquisitionError) {
        let mut state = self.inner.lock().await;
        state.stats.failed += 1;
        if matches!(error, AcquisitionError::Crc(_)) {
            state.stats.crc_failures += 1;
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.inner.lock().await;
        Snapshot {
            time: now(),
            reading: state.reading,
            average_ph: state.ph_window.mean(),
            average_orp: state.orp_window.mean(),
            ph_samples: state.ph_window.len(),
            orp_samples: state.orp_window.len(),
            stats: state.stats,
        }
    }
}
