use std::collections::VecDeque;
use std::time::Duration;

use common::{MotionSample, RawImuReading, SampleSource, SensorError, ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS};

/// Synthetic drive: alternating corners that brush the grip limit, with
/// acceleration and braking phases and a slight vertical bump.
///
/// Samples are generated as raw register counts and pass through the same
/// conversion as a real IMU.
#[derive(Debug, Clone)]
pub struct SimulatedSampleSource {
    cycle: u64,
    step_secs: f64,
    peak_lateral_g: f64,
}

impl SimulatedSampleSource {
    pub fn new(poll_period: Duration) -> Self {
        Self {
            cycle: 0,
            step_secs: poll_period.as_secs_f64(),
            peak_lateral_g: 0.92,
        }
    }

    pub fn with_peak_lateral(mut self, peak_g: f64) -> Self {
        self.peak_lateral_g = peak_g;
        self
    }

    fn raw_at(&self, t: f64) -> RawImuReading {
        let lateral = self.peak_lateral_g * (t * 0.8).sin();
        let longitudinal = 0.6 * (t * 0.5).cos();
        let vertical = 0.45 + 0.1 * (t * 7.0).sin();
        // roll follows lateral load, pitch follows longitudinal load
        let roll = -4.0 * lateral;
        let pitch = 3.0 * longitudinal;
        let yaw = 20.0 * (t * 0.8).cos();

        let accel = |g: f64| (g * ACCEL_LSB_PER_G).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        let gyro = |dps: f64| (dps * GYRO_LSB_PER_DPS).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        RawImuReading {
            accel: [accel(lateral), accel(longitudinal), accel(vertical)],
            gyro: [gyro(pitch), gyro(roll), gyro(yaw)],
        }
    }
}

impl SampleSource for SimulatedSampleSource {
    fn poll(&mut self) -> Result<MotionSample, SensorError> {
        let t = self.cycle as f64 * self.step_secs;
        self.cycle += 1;
        Ok(MotionSample::from_raw(self.raw_at(t), t))
    }
}

/// Replays a fixed sequence of readings, then reports the sensor as disconnected.
#[derive(Debug, Default)]
pub struct ScriptedSampleSource {
    script: VecDeque<Result<MotionSample, SensorError>>,
}

impl ScriptedSampleSource {
    pub fn new<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = MotionSample>,
    {
        Self {
            script: samples.into_iter().map(Ok).collect(),
        }
    }

    pub fn push(&mut self, sample: MotionSample) {
        self.script.push_back(Ok(sample));
    }

    pub fn push_failure(&mut self, error: SensorError) {
        self.script.push_back(Err(error));
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SampleSource for ScriptedSampleSource {
    fn poll(&mut self) -> Result<MotionSample, SensorError> {
        self.script.pop_front().unwrap_or(Err(SensorError::Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_source_advances_time_and_stays_in_range() {
        let mut source = SimulatedSampleSource::new(Duration::from_millis(10));
        let mut last_t = -1.0;
        let mut peak = 0.0f64;
        for _ in 0..2000 {
            let sample = source.poll().unwrap();
            assert!(sample.t > last_t);
            last_t = sample.t;
            peak = peak.max(sample.ax.abs());
            assert!(sample.ay.abs() <= 0.61);
        }
        // reaches the warning zone of the default grip limit
        assert!(peak > 0.85);
    }

    #[test]
    fn scripted_source_disconnects_when_exhausted() {
        let sample = MotionSample {
            ax: 0.1,
            ay: 0.0,
            az: 1.0,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            t: 0.0,
        };
        let mut source = ScriptedSampleSource::new([sample]);
        source.push_failure(SensorError::Read("bus timeout".to_string()));

        assert_eq!(source.poll().unwrap(), sample);
        assert!(matches!(source.poll(), Err(SensorError::Read(_))));
        assert!(matches!(source.poll(), Err(SensorError::Disconnected)));
    }
}
