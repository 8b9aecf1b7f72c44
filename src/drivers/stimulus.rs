use ndarray::Array1;
use crate::drivers::topology::TopologyConvention;
use crate::waveform::WaveformSpec;
/// What the analog-out channel is asked to play.
///
/// Amplitude, offset and the rendered period already carry the board
/// polarity: inverted boards are driven with negated amplitude and offset.
#[derive(Clone, Debug, PartialEq)]
pub struct StimulusProgram {
    spec: WaveformSpec,
    polarity: f64,
    pub frequency_hz: f64,
    pub amplitude: f64,
    pub dc_offset: f64,
    /// One period, polarity applied, for custom pulse-train upload.
    pub samples: Array1<f64>,
}
impl StimulusProgram {
    pub fn new(spec: &WaveformSpec, topology: TopologyConvention, samples_per_period: usize) -> Self {
        let polarity = topology.stimulus_polarity();
        Self {
            frequency_hz: spec.frequency_hz(),
            amplitude: polarity * spec.amplitude(),
            dc_offset: polarity * spec.dc_offset(),
            samples: spec.render(samples_per_period) * polarity,
            spec: spec.clone(),
            polarity,
        }
    }
    /// Programmed output voltage at `t_ns`, polarity included.
    pub fn value_at(&self, t_ns: f64) -> f64 {
        self.polarity * self.spec.evaluate(t_ns)
    }
}
/// Continuous two-channel capture parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSettings {
    pub sample_frequency_hz: f64,
    pub buffer_size: usize,
    pub period_count: usize,
}
impl CaptureSettings {
    pub fn new(sample_frequency_hz: f64, buffer_size: usize, period_count: usize) -> Self {
        Self {
            sample_frequency_hz,
            buffer_size,
            period_count,
        }
    }
    /// Sizes the capture so one buffer holds `period_count` stimulus periods.
    pub fn for_stimulus(frequency_hz: f64, buffer_size: usize, period_count: usize) -> Self {
        let period_count = period_count.max(1);
        Self {
            sample_frequency_hz: frequency_hz * buffer_size as f64 / period_count as f64,
            buffer_size,
            period_count,
        }
    }
    /// Seconds between samples: `period_count / (frequency * buffer_size)`.
    pub fn time_step_s(&self) -> f64 {
        1.0 / self.sample_frequency_hz
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::WaveShape;
    #[test]
    fn inverted_board_negates_programmed_stimulus() {
        let spec = WaveformSpec::new("tri", WaveShape::Triangle, 0.1, 1.0e7, 1.0, 0.8).unwrap();
        let standard = StimulusProgram::new(&spec, TopologyConvention::Standard, 16);
        let inverted = StimulusProgram::new(&spec, TopologyConvention::Inverted, 16);
        assert_eq!(standard.amplitude, 0.8);
        assert_eq!(inverted.amplitude, -0.8);
        assert_eq!(inverted.dc_offset, -0.1);
        assert!((standard.frequency_hz - 100.0).abs() < 1e-9);
        for (s, i) in standard.samples.iter().zip(inverted.samples.iter()) {
            assert_eq!(*s, -*i);
        }
        assert_eq!(inverted.value_at(5.0e6), -spec.evaluate(5.0e6));
    }
    #[test]
    fn capture_spans_requested_periods() {
        let capture = CaptureSettings::for_stimulus(100.0, 8000, 2);
        assert!((capture.sample_frequency_hz - 400_000.0).abs() < 1e-6);
        let span = capture.time_step_s() * capture.buffer_size as f64;
        assert!((span - 0.02).abs() < 1e-12);
    }
}
