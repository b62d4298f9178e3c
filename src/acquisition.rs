/// Alternating pH/ORP acquisition cycle
use log::{error, info, warn};
use tokio::sync::watch;
use tokio::time::Duration;

use crate::config::SensorConfig;
use crate::error::AcquisitionError;
use crate::modbus::{decode, issue_read_data, issue_set_response_format};
use crate::models::{ResponseFormat, SensorReading};
use crate::state::SharedState;
use crate::transport::Transport;
use crate::utils::{format_datetime, now, sleep_or_shutdown};

/// Timing and policy of the acquisition loop
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub address: u8,
    pub initial_settle: Duration,
    pub read_interval: Duration,
    pub switch_settle: Duration,
    pub alternate_formats: bool,
    pub validate_ph_range: bool,
    /// None runs until shutdown
    pub max_cycles: Option<u64>,
}

impl From<&SensorConfig> for AcquisitionSettings {
    fn from(config: &SensorConfig) -> Self {
        AcquisitionSettings {
            address: config.device_address,
            initial_settle: config.initial_settle,
            read_interval: config.read_interval,
            switch_settle: config.format_switch_settle,
            alternate_formats: config.alternate_formats,
            validate_ph_range: config.validate_ph_range,
            max_cycles: config.max_cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Initializing,
    ReadCycle,
    FormatSwitch,
    Terminated,
}

/// Result of one successful read cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub format: ResponseFormat,
    pub reading: SensorReading,
    /// Whether the pH or ORP sample entered its rolling window
    pub windowed: bool,
}

impl CycleReport {
    pub fn ph_rejected(&self) -> bool {
        self.format == ResponseFormat::Ph && !self.windowed
    }
}

/// Drives the instrument and feeds the shared state
///
/// The probe reports either pH or ORP per reading, so the loop keeps track
/// of the format it last selected and, when alternating, flips it after
/// every successful read. Both the initial selection and each switch are
/// followed by a settling delay; reading too early can return the value of
/// the previous format.
pub struct Acquisition<T: Transport> {
    transport: T,
    settings: AcquisitionSettings,
    state: SharedState,
    format: ResponseFormat,
    phase: Phase,
    cycles: u64,
}

impl<T: Transport> Acquisition<T> {
    pub fn new(transport: T, settings: AcquisitionSettings, state: SharedState) -> Self {
        Acquisition {
            transport,
            settings,
            state,
            format: ResponseFormat::Ph,
            phase: Phase::Idle,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    #[cfg(test)]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Select the pH format before the first read
    pub async fn initialize(&mut self) -> Result<(), AcquisitionError> {
        self.phase = Phase::Initializing;
        self.format = ResponseFormat::Ph;
        issue_set_response_format(&mut self.transport, self.settings.address, self.format).await
    }

    /// Read, decode and merge one response in the current format
    ///
    /// Failures are tallied in the shared state and returned; the reading is
    /// left untouched.
    pub async fn read_cycle(&mut self) -> Result<CycleReport, AcquisitionError> {
        self.phase = Phase::ReadCycle;
        let result = self.read_and_merge().await;
        if let Err(e) = &result {
            self.state.record_failure(e).await;
        }
        result
    }

    async fn read_and_merge(&mut self) -> Result<CycleReport, AcquisitionError> {
        let response = issue_read_data(&mut self.transport, self.settings.address).await?;
        let partial = decode(&response, self.format);
        let (reading, windowed) = self
            .state
            .apply(&partial, self.settings.validate_ph_range)
            .await;

        Ok(CycleReport {
            format: self.format,
            reading,
            windowed,
        })
    }

    /// Ask the probe for the other format
    ///
    /// The tracked format only changes once the command has been written.
    pub async fn switch_format(&mut self) -> Result<(), AcquisitionError> {
        self.phase = Phase::FormatSwitch;
        let next = self.format.toggled();
        issue_set_response_format(&mut self.transport, self.settings.address, next).await?;
        self.format = next;
        Ok(())
    }

    /// Run until the cycle budget is spent or shutdown is signalled
    ///
    /// Per-cycle errors are logged and skipped. Only a failure to select the
    /// initial format ends the run with an error. Returns the number of
    /// cycles attempted.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<u64, AcquisitionError> {
        if let Err(e) = self.initialize().await {
            self.phase = Phase::Terminated;
            return Err(e);
        }
        if sleep_or_shutdown(self.settings.initial_settle, &mut shutdown).await {
            self.phase = Phase::Terminated;
            return Ok(self.cycles);
        }

        while self.settings.max_cycles.map_or(true, |max| self.cycles < max) {
            self.cycles += 1;

            let succeeded = match self.read_cycle().await {
                Ok(report) => {
                    log_report(&report);
                    true
                }
                Err(e) => {
                    error!("Cycle {} failed: {}", self.cycles, e);
                    false
                }
            };

            if sleep_or_shutdown(self.settings.read_interval, &mut shutdown).await {
                break;
            }

            if succeeded && self.settings.alternate_formats {
                if let Err(e) = self.switch_format().await {
                    error!("Failed to switch to {:?} format: {}", self.format.toggled(), e);
                    self.state.record_failure(&e).await;
                } else if sleep_or_shutdown(self.settings.switch_settle, &mut shutdown).await {
                    break;
                }
            }
        }

        self.phase = Phase::Terminated;
        Ok(self.cycles)
    }
}

fn log_report(report: &CycleReport) {
    let r = &report.reading;
    if report.ph_rejected() {
        warn!("pH {:.2} outside 0-14, kept out of the average", r.ph);
    }
    info!(
        "[{}] cf: {:.2}, ec: {:.2} mS, tds: {:.2} ppm, ph: {:.2} pH, orp: {} mV, re: {} %, temp: {:.1} C",
        format_datetime(&now()),
        r.conductivity_factor,
        r.ec,
        r.tds,
        r.ph,
        r.orp,
        r.relative_value,
        r.temperature
    );
}
