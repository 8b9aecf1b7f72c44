// src/config.rs
//! JSON run configuration. Every field has a default, so `{}` is a valid file.
use std::path::Path;
use std::time::Duration;
use log::info;
use serde::{Deserialize, Serialize};
use crate::drivers::error::ConfigError;
use crate::drivers::pipeline::MeasurementSettings;
use crate::drivers::simulated::{MemristorModel, SimulatedBoard};
use crate::drivers::smoother::ConductanceSmoother;
use crate::drivers::topology::TopologyConvention;
use crate::drivers::units::{ConductanceUnit, CurrentUnit};
use crate::engine::{LoopConfig, LoopTiming, MAX_LOOP_INTERVAL};
use crate::types::TransformMode;
use crate::waveform::{WaveShape, WaveformSpec};

// 波形参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformSection {
    pub id: String,
    pub shape: WaveShape,
    pub dc_offset: f64,
    pub pulse_width_ns: f64,
    pub duty_cycle: f64,
    pub amplitude: f64,
}
impl Default for WaveformSection {
    fn default() -> Self {
        // 5 ms half-sine at 50% duty: 100 Hz.
        Self {
            id: "default".into(),
            shape: WaveShape::HalfSine,
            dc_offset: 0.0,
            pulse_width_ns: 5.0e6,
            duty_cycle: 0.5,
            amplitude: 1.0,
        }
    }
}
impl WaveformSection {
    pub fn spec(&self) -> Result<WaveformSpec, ConfigError> {
        Ok(WaveformSpec::new(
            self.id.clone(),
            self.shape.clone(),
            self.dc_offset,
            self.pulse_width_ns,
            self.duty_cycle,
            self.amplitude,
        )?)
    }
}

// 采集参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub buffer_size: usize,
    pub period_count: usize,
    /// Resolution of the uploaded stimulus period.
    pub samples_per_period: usize,
}
impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            buffer_size: 8000,
            period_count: 2,
            samples_per_period: 1024,
        }
    }
}

// 测量参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementSection {
    pub mode: TransformMode,
    pub topology: TopologyConvention,
    pub series_resistance_ohms: f64,
    pub current_unit: CurrentUnit,
    pub conductance_unit: ConductanceUnit,
    pub smoothing_k: f64,
    pub min_measurable_amplitude_v: f64,
    pub conductance_floor: f64,
}
impl Default for MeasurementSection {
    fn default() -> Self {
        Self {
            mode: TransformMode::CurrentVoltage,
            topology: TopologyConvention::Standard,
            series_resistance_ohms: 5000.0,
            current_unit: CurrentUnit::MicroAmps,
            conductance_unit: ConductanceUnit::MilliSiemens,
            smoothing_k: 0.1,
            min_measurable_amplitude_v: 0.005,
            conductance_floor: 0.0,
        }
    }
}
impl MeasurementSection {
    pub fn settings(&self) -> MeasurementSettings {
        MeasurementSettings {
            mode: self.mode,
            topology: self.topology,
            series_resistance_ohms: self.series_resistance_ohms,
            current_unit: self.current_unit,
            conductance_unit: self.conductance_unit,
            min_measurable_amplitude_v: self.min_measurable_amplitude_v,
        }
    }
}

// 轮询节奏（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub poll_interval_ms: u64,
    pub frame_interval_ms: u64,
}
impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            frame_interval_ms: 50,
        }
    }
}

// 模拟板卡
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub run_seconds: f64,
    pub noise_std_v: f64,
    pub seed: u64,
    pub initial_conductance_s: f64,
    pub min_conductance_s: f64,
    pub max_conductance_s: f64,
    pub drift_s_per_vs: f64,
}
impl Default for SimulationSection {
    fn default() -> Self {
        let model = MemristorModel::default();
        Self {
            run_seconds: 2.0,
            noise_std_v: 0.002,
            seed: 42,
            initial_conductance_s: model.conductance_s,
            min_conductance_s: model.min_conductance_s,
            max_conductance_s: model.max_conductance_s,
            drift_s_per_vs: model.drift_s_per_vs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub waveform: WaveformSection,
    pub capture: CaptureSection,
    pub measurement: MeasurementSection,
    pub timing: TimingSection,
    pub simulation: SimulationSection,
}
impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.waveform.spec()?;
        self.measurement.settings().validate()?;
        self.smoother()?;
        if self.capture.buffer_size == 0 {
            return Err(invalid("capture.buffer_size", "must be at least 1"));
        }
        if self.capture.period_count == 0 {
            return Err(invalid("capture.period_count", "must be at least 1"));
        }
        if self.capture.samples_per_period < 2 {
            return Err(invalid("capture.samples_per_period", "must be at least 2"));
        }
        let max_ms = MAX_LOOP_INTERVAL.as_millis() as u64;
        if self.timing.poll_interval_ms == 0 || self.timing.poll_interval_ms > max_ms {
            return Err(invalid(
                "timing.poll_interval_ms",
                &format!("must lie in 1..={max_ms}"),
            ));
        }
        if self.timing.frame_interval_ms > max_ms {
            return Err(invalid(
                "timing.frame_interval_ms",
                &format!("must not exceed {max_ms}"),
            ));
        }
        let sim = &self.simulation;
        if !sim.run_seconds.is_finite() || sim.run_seconds < 0.0 {
            return Err(invalid("simulation.run_seconds", "must be finite and non-negative"));
        }
        if !sim.noise_std_v.is_finite() || sim.noise_std_v < 0.0 {
            return Err(invalid("simulation.noise_std_v", "must be finite and non-negative"));
        }
        if !(sim.min_conductance_s >= 0.0 && sim.min_conductance_s <= sim.max_conductance_s) {
            return Err(invalid(
                "simulation.min_conductance_s",
                "must be non-negative and not above max_conductance_s",
            ));
        }
        Ok(())
    }
    pub fn smoother(&self) -> Result<ConductanceSmoother, ConfigError> {
        Ok(ConductanceSmoother::new(
            self.measurement.smoothing_k,
            self.measurement.conductance_floor,
        )?)
    }
    pub fn timing(&self) -> LoopTiming {
        LoopTiming {
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
            frame_interval: Duration::from_millis(self.timing.frame_interval_ms),
        }
    }
    pub fn loop_config(&self) -> Result<LoopConfig, ConfigError> {
        Ok(LoopConfig {
            waveform: self.waveform.spec()?,
            measurement: self.measurement.settings(),
            buffer_size: self.capture.buffer_size,
            period_count: self.capture.period_count,
            samples_per_period: self.capture.samples_per_period,
            timing: self.timing(),
        })
    }
    pub fn simulated_board(&self) -> SimulatedBoard {
        let sim = &self.simulation;
        let model = MemristorModel {
            conductance_s: sim
                .initial_conductance_s
                .clamp(sim.min_conductance_s, sim.max_conductance_s),
            min_conductance_s: sim.min_conductance_s,
            max_conductance_s: sim.max_conductance_s,
            drift_s_per_vs: sim.drift_s_per_vs,
        };
        SimulatedBoard::new(
            self.measurement.topology,
            self.measurement.series_resistance_ohms,
        )
        .with_memristor(model)
        .with_noise(sim.noise_std_v, sim.seed)
    }
}
fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
