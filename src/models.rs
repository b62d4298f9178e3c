use time::OffsetDateTime;

/// Which of pH or ORP the instrument reports in register 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Ph,
    Orp,
}

impl ResponseFormat {
    /// Value written to the format register to select this format
    pub fn register_value(self) -> u16 {
        match self {
            ResponseFormat::Ph => 0x0000,
            ResponseFormat::Orp => 0x0001,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ResponseFormat::Ph => ResponseFormat::Orp,
            ResponseFormat::Orp => ResponseFormat::Ph,
        }
    }
}

/// The format-dependent channel of one response
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatValue {
    Ph(f64),
    Orp(i32),
}

/// Values decoded from a single response frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialReading {
    pub conductivity_factor: f64,
    pub relative_value: u16,
    pub temperature: f64,
    pub value: FormatValue,
}

impl PartialReading {
    pub fn format(&self) -> ResponseFormat {
        match self.value {
            FormatValue::Ph(_) => ResponseFormat::Ph,
            FormatValue::Orp(_) => ResponseFormat::Orp,
        }
    }
}

/// Latest instantaneous values
///
/// Only the channel named by `last_format` was refreshed by the most recent
/// cycle; the other one still holds whatever the previous cycle of its
/// format left behind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub conductivity_factor: f64,
    pub ec: f64,
    pub tds: f64,
    pub relative_value: u16,
    pub temperature: f64,
    pub ph: f64,
    pub orp: i32,
    pub last_format: ResponseFormat,
}

impl SensorReading {
    pub fn merge(&mut self, partial: &PartialReading) {
        self.conductivity_factor = partial.conductivity_factor;
        self.ec = partial.conductivity_factor / 10.0;
        self.tds = partial.conductivity_factor * 50.0;
        self.relative_value = partial.relative_value;
        self.temperature = partial.temperature;
        match partial.value {
            FormatValue::Ph(ph) => self.ph = ph,
            FormatValue::Orp(orp) => self.orp = orp,
        }
        self.last_format = partial.format();
    }
}

/// Tally of acquisition cycle outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub succeeded: u64,
    pub failed: u64,
    pub crc_failures: u64,
    pub ph_rejected: u64,
}

/// Consistent view of the shared state taken under a single lock
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time: OffsetDateTime,
    pub reading: SensorReading,
    /// Mean of the pH window, 0.0 while the window is empty
    pub average_ph: f64,
    /// Mean of the ORP window, 0.0 while the window is empty
    pub average_orp: f64,
    pub ph_samples: usize,
    pub orp_samples: usize,
    pub stats: CycleStats,
}

/// One line of the CSV log
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub time: OffsetDateTime,
    pub conductivity_factor: f64,
    pub ec: f64,
    pub tds: f64,
    pub ph: f64,
    pub orp: f64,
    pub relative_value: u16,
    pub temperature: f64,
}

impl From<&Snapshot> for LogRecord {
    fn from(snapshot: &Snapshot) -> Self {
        LogRecord {
            time: snapshot.time,
            conductivity_factor: snapshot.reading.conductivity_factor,
            ec: snapshot.reading.ec,
            tds: snapshot.reading.tds,
            ph: snapshot.average_ph,
            orp: snapshot.average_orp,
            relative_value: snapshot.reading.relative_value,
            temperature: snapshot.reading.temperature,
        }
    }
}
