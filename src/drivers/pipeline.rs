use std::fmt;
use log::debug;
use crate::drivers::error::PipelineError;
use crate::drivers::smoother::ConductanceSmoother;
use crate::drivers::source::SampleBatch;
use crate::drivers::topology::TopologyConvention;
use crate::drivers::units::{ConductanceUnit, CurrentUnit};
use crate::types::TransformMode;
/// Everything the transform needs besides the samples and the smoother.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementSettings {
    pub mode: TransformMode,
    pub topology: TopologyConvention,
    pub series_resistance_ohms: f64,
    pub current_unit: CurrentUnit,
    pub conductance_unit: ConductanceUnit,
    /// Device voltages below this magnitude are too small to divide by.
    pub min_measurable_amplitude_v: f64,
}
impl MeasurementSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.series_resistance_ohms.is_finite() || self.series_resistance_ohms <= 0.0 {
            return Err(PipelineError::InvalidSeriesResistance(
                self.series_resistance_ohms,
            ));
        }
        if !self.min_measurable_amplitude_v.is_finite() || self.min_measurable_amplitude_v < 0.0 {
            return Err(PipelineError::InvalidAmplitudeThreshold(
                self.min_measurable_amplitude_v,
            ));
        }
        Ok(())
    }
}
/// Derived traces for one batch, in input sample order.
///
/// `source_v` and `device_v` are always the topology-corrected node voltages;
/// `quantity` depends on the mode: time in seconds (capture), current in the
/// configured current unit, or smoothed conductance in the conductance unit.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedBatch {
    pub mode: TransformMode,
    pub source_v: Vec<f64>,
    pub device_v: Vec<f64>,
    pub quantity: Vec<f64>,
}
impl DerivedBatch {
    fn with_capacity(mode: TransformMode, n: usize) -> Self {
        Self {
            mode,
            source_v: Vec::with_capacity(n),
            device_v: Vec::with_capacity(n),
            quantity: Vec::with_capacity(n),
        }
    }
    pub fn len(&self) -> usize {
        self.quantity.len()
    }
    pub fn is_empty(&self) -> bool {
        self.quantity.is_empty()
    }
}
/// The voltage across the memristor in a conductance batch was too small to
/// compute anything from: its peak stayed under the threshold, or no single
/// sample cleared it.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementWarning {
    pub peak_device_v: f64,
    pub degenerate_samples: usize,
    pub total_samples: usize,
    pub threshold_v: f64,
}
impl fmt::Display for MeasurementWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "voltage drop across memristor is less than {} V (peak {:.4} V, {}/{} samples unusable); \
             conductance will not be computed and the batch is not displayed",
            self.threshold_v, self.peak_device_v, self.degenerate_samples, self.total_samples
        )
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct TransformOutput {
    pub batch: DerivedBatch,
    pub warning: Option<MeasurementWarning>,
}
/// Turns raw scope batches into voltage/current/conductance traces.
#[derive(Clone, Debug)]
pub struct AcquisitionTransformPipeline {
    settings: MeasurementSettings,
}
impl AcquisitionTransformPipeline {
    pub fn new(settings: MeasurementSettings) -> Result<Self, PipelineError> {
        settings.validate()?;
        Ok(Self { settings })
    }
    pub fn settings(&self) -> &MeasurementSettings {
        &self.settings
    }
    /// Swaps in a whole new settings snapshot; the old one stays if invalid.
    pub fn set_settings(&mut self, settings: MeasurementSettings) -> Result<(), PipelineError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }
    /// Single pass over the batch. Only conductance mode touches `smoother`.
    ///
    /// Unusable samples hold the previous average. A warning is raised only
    /// when the batch as a whole is unusable.
    pub fn transform(
        &self,
        batch: SampleBatch,
        smoother: &mut ConductanceSmoother,
    ) -> TransformOutput {
        let s = &self.settings;
        let sample_frequency_hz = batch.sample_frequency_hz;
        let (raw_a, raw_b) = batch.into_channels();
        let n = raw_a.len();
        let mut out = DerivedBatch::with_capacity(s.mode, n);
        let mut degenerate = 0usize;
        let mut peak_device_v = 0.0_f64;
        let time_step_s = 1.0 / sample_frequency_hz;
        for (i, (&a, &b)) in raw_a.iter().zip(&raw_b).enumerate() {
            let c = s.topology.correct(a, b);
            peak_device_v = peak_device_v.max(c.device_v.abs());
            let quantity = match s.mode {
                TransformMode::Capture => i as f64 * time_step_s,
                TransformMode::CurrentVoltage => {
                    self.current_amps(c.source_v, c.device_v) * s.current_unit.divisor()
                }
                TransformMode::ConductanceVoltage => {
                    if is_measurable(c.device_v, s.min_measurable_amplitude_v) {
                        let current = self.current_amps(c.source_v, c.device_v);
                        let g_raw = current / c.device_v * s.conductance_unit.divisor();
                        if g_raw.is_finite() {
                            smoother.update(g_raw)
                        } else {
                            degenerate += 1;
                            smoother.average()
                        }
                    } else {
                        degenerate += 1;
                        smoother.average()
                    }
                }
            };
            out.source_v.push(c.source_v);
            out.device_v.push(c.device_v);
            out.quantity.push(quantity);
        }
        let unusable = s.mode == TransformMode::ConductanceVoltage
            && n > 0
            && (peak_device_v < s.min_measurable_amplitude_v || degenerate == n);
        let warning = unusable.then(|| MeasurementWarning {
            peak_device_v,
            degenerate_samples: degenerate,
            total_samples: n,
            threshold_v: s.min_measurable_amplitude_v,
        });
        debug!(
            "transformed {} samples in {:?} mode ({} degenerate)",
            n, s.mode, degenerate
        );
        TransformOutput {
            batch: out,
            warning,
        }
    }
    /// Ohm's law across the series resistor.
    fn current_amps(&self, source_v: f64, device_v: f64) -> f64 {
        let delta_v = device_v - source_v;
        -delta_v / self.settings.series_resistance_ohms
    }
}
fn is_measurable(voltage: f64, threshold: f64) -> bool {
    let magnitude = voltage.abs();
    magnitude > 0.0 && magnitude >= threshold
}
