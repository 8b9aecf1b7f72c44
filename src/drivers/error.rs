use thiserror::Error;
/// Rejected waveform parameters. Raised when a spec is built, never while evaluating it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaveformError {
    #[error("invalid waveform parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}
/// Acquisition fault reported by an external driver collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error("acquisition failed: {0}")]
    Acquisition(String),
    #[error("stimulus output failed: {0}")]
    Stimulus(String),
    #[error("driver returned mismatched channels: A has {a} samples, B has {b}")]
    ChannelLengthMismatch { a: usize, b: usize },
}
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("channel length mismatch: A has {a} samples, B has {b}")]
    ChannelLengthMismatch { a: usize, b: usize },
    #[error("series resistance must be finite and greater than zero, got {0}")]
    InvalidSeriesResistance(f64),
    #[error("sample frequency must be finite and greater than zero, got {0}")]
    InvalidSampleFrequency(f64),
    #[error("smoothing constant must lie in (0, 1), got {0}")]
    InvalidSmoothingConstant(f64),
    #[error("conductance floor must be finite and non-negative, got {0}")]
    InvalidConductanceFloor(f64),
    #[error("minimum measurable amplitude must be finite and non-negative, got {0}")]
    InvalidAmplitudeThreshold(f64),
}
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("acquisition loop is already running")]
    AlreadyRunning,
    #[error("acquisition loop is not running")]
    NotRunning,
    #[error("acquisition loop terminated by driver fault: {0}")]
    Fault(#[from] DriverError),
    #[error("invalid measurement settings: {0}")]
    Settings(#[from] PipelineError),
    #[error("acquisition worker panicked")]
    WorkerPanicked,
    #[error("instrument is unavailable after a failed run")]
    DeviceUnavailable,
    #[error("loop interval `{name}` out of range: {value:?}")]
    InvalidTiming {
        name: &'static str,
        value: std::time::Duration,
    },
}
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Waveform(#[from] WaveformError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
