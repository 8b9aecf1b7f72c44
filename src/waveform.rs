// src/waveform.rs
//! Periodic stimulus synthesis.
//!
//! Every shape follows the same two-phase contract: inside the active window
//! `[0, pulse_width)` of each period the normalized shape is scaled by the
//! amplitude and lifted by the DC offset, for the rest of the period the
//! signal rests at the offset. Evaluation is a pure function of `(spec, t)`.
use std::f64::consts::PI;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use crate::drivers::error::WaveformError;
const NANOS_PER_SECOND: f64 = 1.0e9;
/// Normalized shape of the active window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveShape {
    /// One half-cycle of a sine: peak at half the window, back to zero at its end.
    HalfSine,
    /// One full sine cycle across the window.
    Sine,
    Square,
    Triangle,
    RampUp,
    RampDown,
    /// Normalized point table, linearly interpolated across the window.
    Custom(Vec<f64>),
}
impl WaveShape {
    /// Shape value at `phase = t' / pulse_width`, `phase` in `[0, 1)`.
    fn unit_value(&self, phase: f64) -> f64 {
        match self {
            WaveShape::HalfSine => (PI * phase).sin(),
            WaveShape::Sine => (2.0 * PI * phase).sin(),
            WaveShape::Square => 1.0,
            WaveShape::Triangle => 1.0 - (2.0 * phase - 1.0).abs(),
            WaveShape::RampUp => phase,
            WaveShape::RampDown => 1.0 - phase,
            WaveShape::Custom(points) => interpolate(points, phase),
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            WaveShape::HalfSine => "HalfSine",
            WaveShape::Sine => "Sine",
            WaveShape::Square => "Square",
            WaveShape::Triangle => "Triangle",
            WaveShape::RampUp => "RampUp",
            WaveShape::RampDown => "RampDown",
            WaveShape::Custom(_) => "Custom",
        }
    }
}
fn interpolate(points: &[f64], phase: f64) -> f64 {
    // Construction guarantees at least two points.
    let last = points.len() - 1;
    let position = phase.clamp(0.0, 1.0) * last as f64;
    let index = (position.floor() as usize).min(last - 1);
    let frac = position - index as f64;
    points[index] + (points[index + 1] - points[index]) * frac
}
/// Immutable stimulus description. Edit a parameter by building a new spec.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformSpec {
    id: String,
    shape: WaveShape,
    dc_offset: f64,
    pulse_width_ns: f64,
    duty_cycle: f64,
    amplitude: f64,
}
impl WaveformSpec {
    pub fn new(
        id: impl Into<String>,
        shape: WaveShape,
        dc_offset: f64,
        pulse_width_ns: f64,
        duty_cycle: f64,
        amplitude: f64,
    ) -> Result<Self, WaveformError> {
        if !pulse_width_ns.is_finite() || pulse_width_ns <= 0.0 {
            return Err(WaveformError::InvalidParameter {
                name: "pulse_width_ns",
                value: pulse_width_ns,
                reason: "must be finite and greater than zero",
            });
        }
        if !duty_cycle.is_finite() || duty_cycle <= 0.0 || duty_cycle > 1.0 {
            return Err(WaveformError::InvalidParameter {
                name: "duty_cycle",
                value: duty_cycle,
                reason: "must lie in (0, 1]",
            });
        }
        if !amplitude.is_finite() {
            return Err(WaveformError::InvalidParameter {
                name: "amplitude",
                value: amplitude,
                reason: "must be finite",
            });
        }
        if !dc_offset.is_finite() {
            return Err(WaveformError::InvalidParameter {
                name: "dc_offset",
                value: dc_offset,
                reason: "must be finite",
            });
        }
        if let WaveShape::Custom(points) = &shape {
            if points.len() < 2 {
                return Err(WaveformError::InvalidParameter {
                    name: "custom_points",
                    value: points.len() as f64,
                    reason: "custom shape needs at least two points",
                });
            }
            if let Some(bad) = points.iter().copied().find(|p| !p.is_finite()) {
                return Err(WaveformError::InvalidParameter {
                    name: "custom_points",
                    value: bad,
                    reason: "custom points must be finite",
                });
            }
        }
        Ok(Self {
            id: id.into(),
            shape,
            dc_offset,
            pulse_width_ns,
            duty_cycle,
            amplitude,
        })
    }
    /// Shorthand for the half-sine pulse used by the hysteresis and pulse experiments.
    pub fn half_sine(
        id: impl Into<String>,
        dc_offset: f64,
        pulse_width_ns: f64,
        duty_cycle: f64,
        amplitude: f64,
    ) -> Result<Self, WaveformError> {
        Self::new(
            id,
            WaveShape::HalfSine,
            dc_offset,
            pulse_width_ns,
            duty_cycle,
            amplitude,
        )
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn shape(&self) -> &WaveShape {
        &self.shape
    }
    pub fn dc_offset(&self) -> f64 {
        self.dc_offset
    }
    pub fn pulse_width_ns(&self) -> f64 {
        self.pulse_width_ns
    }
    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }
    pub fn period_ns(&self) -> f64 {
        self.pulse_width_ns / self.duty_cycle
    }
    pub fn frequency_hz(&self) -> f64 {
        NANOS_PER_SECOND / self.period_ns()
    }
    /// Signal value at `t_ns` nanoseconds. Any real `t` is accepted; it is
    /// reduced modulo the period. A non-finite `t` yields the baseline.
    pub fn evaluate(&self, t_ns: f64) -> f64 {
        let t = t_ns.rem_euclid(self.period_ns());
        if t < self.pulse_width_ns {
            self.amplitude * self.shape.unit_value(t / self.pulse_width_ns) + self.dc_offset
        } else {
            self.dc_offset
        }
    }
    fn sample_step_ns(&self, samples_per_period: usize) -> f64 {
        self.period_ns() / samples_per_period.max(1) as f64
    }
    /// Sample times (ns) matching [`WaveformSpec::render`].
    pub fn time_axis(&self, samples_per_period: usize) -> Array1<f64> {
        let step = self.sample_step_ns(samples_per_period);
        Array1::from_shape_fn(samples_per_period, |i| i as f64 * step)
    }
    /// One period sampled at `samples_per_period` evenly spaced points.
    pub fn render(&self, samples_per_period: usize) -> Array1<f64> {
        self.render_train(1, samples_per_period)
    }
    /// `pulses` consecutive periods, e.g. for a custom pulse-train upload.
    pub fn render_train(&self, pulses: usize, samples_per_period: usize) -> Array1<f64> {
        let step = self.sample_step_ns(samples_per_period);
        Array1::from_shape_fn(pulses * samples_per_period, |i| {
            self.evaluate(i as f64 * step)
        })
    }
}
/// Free-function form of [`WaveformSpec::evaluate`].
pub fn evaluate(spec: &WaveformSpec, t_ns: f64) -> f64 {
    spec.evaluate(t_ns)
}
#[cfg(test)]
mod tests {
    use super::*;
    const EPS: f64 = 1e-9;
    fn half_sine() -> WaveformSpec {
        WaveformSpec::half_sine("hs", 0.1, 500.0, 0.25, 1.5).unwrap()
    }
    #[test]
    fn rejects_bad_pulse_width_and_duty_cycle() {
        assert!(WaveformSpec::half_sine("a", 0.0, 0.0, 0.5, 1.0).is_err());
        assert!(WaveformSpec::half_sine("a", 0.0, -10.0, 0.5, 1.0).is_err());
        assert!(WaveformSpec::half_sine("a", 0.0, 10.0, 0.0, 1.0).is_err());
        assert!(WaveformSpec::half_sine("a", 0.0, 10.0, 1.01, 1.0).is_err());
        assert!(WaveformSpec::half_sine("a", 0.0, f64::NAN, 0.5, 1.0).is_err());
        assert!(WaveformSpec::half_sine("a", 0.0, 10.0, 1.0, 1.0).is_ok());
        let err = WaveformSpec::new("c", WaveShape::Custom(vec![1.0]), 0.0, 10.0, 0.5, 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            WaveformError::InvalidParameter { name: "custom_points", .. }
        ));
    }
    #[test]
    fn period_derives_from_duty_cycle() {
        let spec = half_sine();
        assert!((spec.period_ns() - 2000.0).abs() < EPS);
        assert!((spec.frequency_hz() - 500_000.0).abs() < 1e-3);
    }
    #[test]
    fn half_sine_peaks_mid_window_and_returns_to_baseline() {
        let spec = half_sine();
        assert!((spec.evaluate(250.0) - 1.6).abs() < EPS);
        assert!((spec.evaluate(500.0) - 0.1).abs() < EPS);
        assert!((spec.evaluate(0.0) - 0.1).abs() < EPS);
    }
    #[test]
    fn rests_at_offset_outside_active_window() {
        let spec = half_sine();
        for t in [500.0, 750.0, 1234.5, 1999.0] {
            assert_eq!(spec.evaluate(t), 0.1);
        }
    }
    #[test]
    fn evaluation_is_periodic() {
        let shapes = vec![
            WaveShape::HalfSine,
            WaveShape::Sine,
            WaveShape::Square,
            WaveShape::Triangle,
            WaveShape::RampUp,
            WaveShape::RampDown,
            WaveShape::Custom(vec![0.0, 1.0, -0.5, 0.0]),
        ];
        for shape in shapes {
            let spec = WaveformSpec::new("p", shape, -0.2, 400.0, 0.8, 0.7).unwrap();
            let period = spec.period_ns();
            for t in [3.0, 77.7, 199.0, 321.9, 450.0, 12_345.6] {
                let a = spec.evaluate(t);
                let b = spec.evaluate(t + period);
                let c = spec.evaluate(t + 7.0 * period);
                assert!((a - b).abs() < 1e-6, "{} at {t}", spec.shape().label());
                assert!((a - c).abs() < 1e-6, "{} at {t}", spec.shape().label());
            }
        }
    }
    #[test]
    fn shape_values_inside_window() {
        let make = |shape| WaveformSpec::new("s", shape, 0.0, 100.0, 0.5, 2.0).unwrap();
        assert!((make(WaveShape::Triangle).evaluate(50.0) - 2.0).abs() < EPS);
        assert!((make(WaveShape::Triangle).evaluate(25.0) - 1.0).abs() < EPS);
        assert!((make(WaveShape::Sine).evaluate(75.0) + 2.0).abs() < EPS);
        assert_eq!(make(WaveShape::Square).evaluate(99.0), 2.0);
        assert!((make(WaveShape::RampUp).evaluate(25.0) - 0.5).abs() < EPS);
        assert!((make(WaveShape::RampDown).evaluate(25.0) - 1.5).abs() < EPS);
        let custom = make(WaveShape::Custom(vec![0.0, 1.0, 0.0]));
        assert!((custom.evaluate(25.0) - 1.0).abs() < EPS);
        assert!((custom.evaluate(50.0) - 2.0).abs() < EPS);
    }
    #[test]
    fn negative_time_wraps_into_period() {
        let spec = half_sine();
        assert!((spec.evaluate(-1750.0) - spec.evaluate(250.0)).abs() < EPS);
    }
    #[test]
    fn render_matches_pointwise_evaluation() {
        let spec = WaveformSpec::new("r", WaveShape::Square, 0.5, 100.0, 0.5, 1.0).unwrap();
        let buffer = spec.render(8);
        let times = spec.time_axis(8);
        assert_eq!(buffer.len(), 8);
        for (t, v) in times.iter().zip(buffer.iter()) {
            assert_eq!(evaluate(&spec, *t), *v);
        }
        assert_eq!(buffer[0], 1.5);
        assert_eq!(buffer[7], 0.5);
        let train = spec.render_train(3, 8);
        assert_eq!(train.len(), 24);
        assert_eq!(train[8], buffer[0]);
        assert_eq!(train[20], buffer[4]);
    }
}
