//! [`RecordSink`] implementations.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::config::{RecordFormat, RecorderConfig};
use crate::error::SinkError;
use crate::metrics::{MetricRecord, RecordSink};

/// Writes each batch as newline-delimited JSON, one record per line, each
/// field a `[value, unit]` pair. A batch is encoded fully before anything
/// reaches the writer.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<File> {
    /// Opens `path` for appending, creating it if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CsvRow {
    sequence: u64,
    time_ms: f64,
    long_accel_g: f64,
    lat_accel_g: f64,
    vert_accel_g: f64,
    pitch_dps: f64,
    yaw_dps: f64,
    roll_dps: f64,
    roll_per_lat_accel_deg_per_g: f64,
}

impl From<&MetricRecord> for CsvRow {
    fn from(r: &MetricRecord) -> Self {
        Self {
            sequence: r.sequence,
            time_ms: r.time_ms,
            long_accel_g: r.long_accel.value(),
            lat_accel_g: r.lat_accel.value(),
            vert_accel_g: r.vert_accel.value(),
            pitch_dps: r.pitch.value(),
            yaw_dps: r.yaw.value(),
            roll_dps: r.roll.value(),
            roll_per_lat_accel_deg_per_g: r.roll_per_lat_accel.value(),
        }
    }
}

/// Flat CSV export with one header row per file.
pub struct CsvSink<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!self.header_written)
            .from_writer(Vec::new());
        for record in records {
            wtr.serialize(CsvRow::from(record))?;
        }
        let buf = wtr
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;

        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        self.header_written |= !records.is_empty();
        Ok(())
    }
}

/// Keeps every batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<MetricRecord>>,
}

impl MemorySink {
    pub fn total_records(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        self.batches.push(records.to_vec());
        Ok(())
    }
}

/// Opens the sink described by the recorder section of the config.
pub fn open_sink(config: &RecorderConfig) -> Result<Box<dyn RecordSink + Send>, SinkError> {
    info!(
        "Recording {:?} batches to {}",
        config.format, config.output_path
    );
    Ok(match config.format {
        RecordFormat::Jsonl => Box::new(JsonLinesSink::create(&config.output_path)?),
        RecordFormat::Csv => Box::new(CsvSink::create(&config.output_path)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MotionSample;

    fn records(n: u64) -> Vec<MetricRecord> {
        (1..=n)
            .map(|i| {
                let sample = MotionSample {
                    ax: 0.1 * i as f64,
                    ay: 0.5,
                    az: 1.0,
                    pitch: 0.0,
                    yaw: 0.0,
                    roll: 2.0,
                    t: 0.01 * i as f64,
                };
                MetricRecord::from_sample(i, &sample)
            })
            .collect()
    }

    #[test]
    fn jsonl_writes_one_line_per_record_with_units() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.append(&records(3)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["latAccel"], serde_json::json!([0.5, "g"]));
        assert_eq!(first["roll"][1], "deg/sec");
        assert_eq!(first["rollPerLatAccel"], serde_json::json!([4.0, "deg/g"]));
    }

    #[test]
    fn jsonl_file_accumulates_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.append(&records(2)).unwrap();
        sink.append(&records(3)).unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn csv_header_written_once() {
        let mut sink = CsvSink::new(Vec::new());
        sink.append(&records(2)).unwrap();
        sink.append(&records(1)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("sequence,time_ms,long_accel_g"));
        assert!(lines[3].starts_with("1,"));
    }

    #[test]
    fn open_sink_honours_format() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            output_path: dir.path().join("out.csv").to_string_lossy().into_owned(),
            format: RecordFormat::Csv,
        };

        let mut sink = open_sink(&config).unwrap();
        sink.append(&records(1)).unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&config.output_path).unwrap();
        assert!(text.starts_with("sequence,"));
    }
}
