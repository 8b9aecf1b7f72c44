//! Software stand-in for the measurement board.
//!
//! The stimulus drives a series resistor into a memristor to ground; channel
//! wiring and polarity follow the configured topology. The memristor is a
//! bounded linear-drift model, enough to trace a pinched hysteresis loop.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::error::DriverError;
use crate::drivers::source::{SampleSource, StimulusOutput};
use crate::drivers::stimulus::{CaptureSettings, StimulusProgram};
use crate::drivers::topology::TopologyConvention;
const NANOS_PER_SECOND: f64 = 1.0e9;
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemristorModel {
    pub conductance_s: f64,
    pub min_conductance_s: f64,
    pub max_conductance_s: f64,
    /// Conductance drift per volt-second across the device.
    pub drift_s_per_vs: f64,
}
impl Default for MemristorModel {
    fn default() -> Self {
        Self {
            conductance_s: 2.0e-4,
            min_conductance_s: 5.0e-5,
            max_conductance_s: 1.0e-3,
            drift_s_per_vs: 5.0e-2,
        }
    }
}
impl MemristorModel {
    fn step(&mut self, device_v: f64, dt_s: f64) {
        let g = self.conductance_s + self.drift_s_per_vs * device_v * dt_s;
        self.conductance_s = g.clamp(self.min_conductance_s, self.max_conductance_s);
    }
}
pub struct SimulatedBoard {
    topology: TopologyConvention,
    series_resistance_ohms: f64,
    memristor: MemristorModel,
    noise_std_v: f64,
    rng: StdRng,
    program: Option<StimulusProgram>,
    capture: Option<CaptureSettings>,
    sample_index: u64,
}
impl SimulatedBoard {
    pub fn new(topology: TopologyConvention, series_resistance_ohms: f64) -> Self {
        Self {
            topology,
            series_resistance_ohms,
            memristor: MemristorModel::default(),
            noise_std_v: 0.0,
            rng: StdRng::seed_from_u64(0),
            program: None,
            capture: None,
            sample_index: 0,
        }
    }
    pub fn with_memristor(mut self, memristor: MemristorModel) -> Self {
        self.memristor = memristor;
        self
    }
    /// Adds uniform noise of roughly `std_v` standard deviation to both channels.
    pub fn with_noise(mut self, std_v: f64, seed: u64) -> Self {
        self.noise_std_v = std_v.max(0.0);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
    pub fn memristor(&self) -> &MemristorModel {
        &self.memristor
    }
    pub fn is_running(&self) -> bool {
        self.program.is_some() && self.capture.is_some()
    }
    fn noise(&mut self) -> f64 {
        if self.noise_std_v == 0.0 {
            return 0.0;
        }
        // Uniform on [-a, a] has std a / sqrt(3).
        let a = self.noise_std_v * 3.0_f64.sqrt();
        self.rng.gen_range(-a..=a)
    }
    fn next_sample(&mut self, program: &StimulusProgram, dt_s: f64) -> (f64, f64) {
        let t_ns = self.sample_index as f64 * dt_s * NANOS_PER_SECOND;
        self.sample_index += 1;
        let out_v = program.value_at(t_ns);
        let g = self.memristor.conductance_s;
        let node_v = out_v / (1.0 + g * self.series_resistance_ohms);
        // The memristor sees the polarity-corrected node voltage on either board.
        self.memristor
            .step(self.topology.stimulus_polarity() * node_v, dt_s);
        let (a, b) = match self.topology {
            TopologyConvention::Standard => (out_v, node_v),
            TopologyConvention::Inverted => (node_v, out_v),
        };
        (a + self.noise(), b + self.noise())
    }
}
impl SampleSource for SimulatedBoard {
    fn start_acquisition(&mut self, capture: &CaptureSettings) -> Result<(), DriverError> {
        if capture.sample_frequency_hz <= 0.0 || capture.buffer_size == 0 {
            return Err(DriverError::Acquisition(format!(
                "unsupported capture settings {capture:?}"
            )));
        }
        self.capture = Some(*capture);
        self.sample_index = 0;
        Ok(())
    }
    fn poll_status(&mut self) -> Result<usize, DriverError> {
        match (&self.program, &self.capture) {
            (Some(_), Some(capture)) => Ok(capture.buffer_size),
            _ => Ok(0),
        }
    }
    fn read_channels(&mut self, valid_samples: usize) -> Result<(Vec<f64>, Vec<f64>), DriverError> {
        let capture = self
            .capture
            .ok_or_else(|| DriverError::Acquisition("acquisition not started".into()))?;
        let program = self
            .program
            .clone()
            .ok_or_else(|| DriverError::Stimulus("stimulus not started".into()))?;
        let dt_s = capture.time_step_s();
        let mut a = Vec::with_capacity(valid_samples);
        let mut b = Vec::with_capacity(valid_samples);
        for _ in 0..valid_samples {
            let (va, vb) = self.next_sample(&program, dt_s);
            a.push(va);
            b.push(vb);
        }
        Ok((a, b))
    }
    fn stop_acquisition(&mut self) -> Result<(), DriverError> {
        self.capture = None;
        Ok(())
    }
}
impl StimulusOutput for SimulatedBoard {
    fn start_wave(&mut self, program: &StimulusProgram) -> Result<(), DriverError> {
        self.program = Some(program.clone());
        Ok(())
    }
    fn stop_wave(&mut self) -> Result<(), DriverError> {
        self.program = None;
        Ok(())
    }
}
