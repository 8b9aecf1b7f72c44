use std::collections::VecDeque;
use std::time::Duration;
use crate::drivers::error::{DriverError, PipelineError};
use crate::drivers::stimulus::{CaptureSettings, StimulusProgram};
/// One poll worth of raw dual-channel scope samples.
#[derive(Clone, Debug)]
pub struct SampleBatch {
    pub sample_frequency_hz: f64,
    channel_a: Vec<f64>,
    channel_b: Vec<f64>,
}
impl SampleBatch {
    pub fn new(
        channel_a: Vec<f64>,
        channel_b: Vec<f64>,
        sample_frequency_hz: f64,
    ) -> Result<Self, PipelineError> {
        if channel_a.len() != channel_b.len() {
            return Err(PipelineError::ChannelLengthMismatch {
                a: channel_a.len(),
                b: channel_b.len(),
            });
        }
        if !sample_frequency_hz.is_finite() || sample_frequency_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleFrequency(sample_frequency_hz));
        }
        Ok(Self {
            sample_frequency_hz,
            channel_a,
            channel_b,
        })
    }
    pub fn sample_count(&self) -> usize {
        self.channel_a.len()
    }
    pub fn is_empty(&self) -> bool {
        self.channel_a.is_empty()
    }
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.sample_count() as f64 / self.sample_frequency_hz)
    }
    pub fn into_channels(self) -> (Vec<f64>, Vec<f64>) {
        (self.channel_a, self.channel_b)
    }
}
/// Continuous two-channel acquisition side of the instrument driver.
pub trait SampleSource: Send {
    fn start_acquisition(&mut self, capture: &CaptureSettings) -> Result<(), DriverError>;
    /// Number of valid samples ready to read, zero when nothing new arrived.
    fn poll_status(&mut self) -> Result<usize, DriverError>;
    fn read_channels(&mut self, valid_samples: usize) -> Result<(Vec<f64>, Vec<f64>), DriverError>;
    fn stop_acquisition(&mut self) -> Result<(), DriverError>;
}
/// Analog-out side of the instrument driver.
pub trait StimulusOutput: Send {
    fn start_wave(&mut self, program: &StimulusProgram) -> Result<(), DriverError>;
    fn stop_wave(&mut self) -> Result<(), DriverError>;
}
/// A device that both drives the stimulus and captures the response.
pub trait Instrument: SampleSource + StimulusOutput {}
impl<T: SampleSource + StimulusOutput> Instrument for T {}
/// In-memory instrument replaying queued raw batches; useful for tests and
/// deterministic playback.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    queue: VecDeque<(Vec<f64>, Vec<f64>)>,
    script: Vec<(Vec<f64>, Vec<f64>)>,
    repeat: bool,
    fail_after_reads: Option<(usize, DriverError)>,
    fail_wave_start: Option<(usize, DriverError)>,
    reads: usize,
    acquiring: bool,
    pub programs: Vec<StimulusProgram>,
    pub captures: Vec<CaptureSettings>,
    pub wave_stops: usize,
    pub acquisition_stops: usize,
}
impl ScriptedDevice {
    pub fn new(batches: impl IntoIterator<Item = (Vec<f64>, Vec<f64>)>) -> Self {
        let script: Vec<_> = batches.into_iter().collect();
        Self {
            queue: script.iter().cloned().collect(),
            script,
            ..Self::default()
        }
    }
    /// Replays the script from the start once it runs dry.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }
    /// Makes `poll_status` fail once `reads` batches have been read.
    pub fn failing_after(mut self, reads: usize, error: DriverError) -> Self {
        self.fail_after_reads = Some((reads, error));
        self
    }
    /// Makes `start_wave` fail once `programs` successful starts are recorded.
    pub fn failing_wave_start_after(mut self, programs: usize, error: DriverError) -> Self {
        self.fail_wave_start = Some((programs, error));
        self
    }
    pub fn reads(&self) -> usize {
        self.reads
    }
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }
}
impl SampleSource for ScriptedDevice {
    fn start_acquisition(&mut self, capture: &CaptureSettings) -> Result<(), DriverError> {
        self.captures.push(*capture);
        self.acquiring = true;
        Ok(())
    }
    fn poll_status(&mut self) -> Result<usize, DriverError> {
        if let Some((limit, error)) = &self.fail_after_reads {
            if self.reads >= *limit {
                return Err(error.clone());
            }
        }
        if !self.acquiring {
            return Ok(0);
        }
        if self.queue.is_empty() && self.repeat {
            self.queue = self.script.iter().cloned().collect();
        }
        Ok(self.queue.front().map(|(a, _)| a.len()).unwrap_or(0))
    }
    fn read_channels(&mut self, valid_samples: usize) -> Result<(Vec<f64>, Vec<f64>), DriverError> {
        let (mut a, mut b) = self
            .queue
            .pop_front()
            .ok_or_else(|| DriverError::Acquisition("no samples queued".into()))?;
        a.truncate(valid_samples);
        b.truncate(valid_samples);
        self.reads += 1;
        Ok((a, b))
    }
    fn stop_acquisition(&mut self) -> Result<(), DriverError> {
        self.acquiring = false;
        self.acquisition_stops += 1;
        Ok(())
    }
}
impl StimulusOutput for ScriptedDevice {
    fn start_wave(&mut self, program: &StimulusProgram) -> Result<(), DriverError> {
        if let Some((limit, error)) = &self.fail_wave_start {
            if self.programs.len() >= *limit {
                return Err(error.clone());
            }
        }
        self.programs.push(program.clone());
        Ok(())
    }
    fn stop_wave(&mut self) -> Result<(), DriverError> {
        self.wave_stops += 1;
        Ok(())
    }
}
