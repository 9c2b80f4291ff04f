use thiserror::Error;

/// Problems with the profile set or the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown ride mode: {0}")]
    UnknownProfile(String),

    #[error("profile '{profile}': {field} must be strictly positive (got {value})")]
    InvalidTolerance {
        profile: String,
        field: &'static str,
        value: f64,
    },

    #[error("duplicate ride mode name: {0}")]
    DuplicateProfile(String),

    #[error("at least one ride mode must be configured")]
    NoProfiles,

    #[error("poll rate must be a positive number of hertz (got {0})")]
    InvalidPollRate(f64),

    #[error("{field} must be greater than {min} (got {value})")]
    InvalidLimit {
        field: &'static str,
        min: f64,
        value: f64,
    },

    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures reported by a [`crate::SampleSource`]. Always fatal to a monitoring session.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Read(String),

    #[error("sensor disconnected")]
    Disconnected,
}

/// Failures reported by a [`crate::metrics::RecordSink`].
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("record sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record sink rejected batch: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl MonitorError {
    /// Sensor faults end the session; everything else leaves the loop running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::Sensor(_))
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
