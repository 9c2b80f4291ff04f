use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::MotionSample;

/// A value paired with its unit, persisted as `[value, unit]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement(pub f64, pub &'static str);

impl Measurement {
    pub fn g(value: f64) -> Self {
        Self(value, "g")
    }

    pub fn deg_per_sec(value: f64) -> Self {
        Self(value, "deg/sec")
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn unit(&self) -> &'static str {
        self.1
    }
}

/// Derived metrics for one logged sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub sequence: u64,
    pub time_ms: f64,
    pub long_accel: Measurement,
    pub lat_accel: Measurement,
    pub vert_accel: Measurement,
    pub pitch: Measurement,
    pub yaw: Measurement,
    pub roll: Measurement,
    pub roll_per_lat_accel: Measurement,
}

impl MetricRecord {
    pub fn from_sample(sequence: u64, sample: &MotionSample) -> Self {
        let mut time_ms = sample.t * 1000.0;
        // Anything past a second is rescaled once more; downstream tooling
        // reads the value this way.
        if time_ms > 1000.0 {
            time_ms /= 1000.0;
        }

        let roll_per_lat_accel = if sample.ay == 0.0 {
            0.0
        } else {
            sample.roll / sample.ay
        };

        Self {
            sequence,
            time_ms,
            long_accel: Measurement::g(sample.ax),
            lat_accel: Measurement::g(sample.ay),
            vert_accel: Measurement::g(sample.az),
            pitch: Measurement::deg_per_sec(sample.pitch),
            yaw: Measurement::deg_per_sec(sample.yaw),
            roll: Measurement::deg_per_sec(sample.roll),
            roll_per_lat_accel: Measurement(roll_per_lat_accel, "deg/g"),
        }
    }
}

/// Durable destination for batches of records.
///
/// A call to `append` receives one whole batch in ascending sequence order.
pub trait RecordSink {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError>;
}

impl<T: RecordSink + ?Sized> RecordSink for Box<T> {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        (**self).append(records)
    }
}

/// Collects a batch of [`MetricRecord`]s while the logger is enabled.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    records: Vec<MetricRecord>,
    enabled: bool,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn record(&mut self, sample: &MotionSample) {
        let sequence = self.records.len() as u64 + 1;
        self.records.push(MetricRecord::from_sample(sequence, sample));
    }

    /// Hands the whole batch to `sink` in one call. On success the batch is
    /// cleared and the aggregator disabled; on failure nothing changes.
    pub fn flush(&mut self, sink: &mut dyn RecordSink) -> Result<usize, SinkError> {
        let count = self.records.len();
        if count > 0 {
            if let Err(e) = sink.append(&self.records) {
                warn!("Flush of {} records failed, keeping batch: {}", count, e);
                return Err(e);
            }
        }
        debug!("Flushed {} records", count);
        self.records.clear();
        self.enabled = false;
        Ok(count)
    }
}
