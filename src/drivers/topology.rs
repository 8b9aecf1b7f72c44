//! Per-board wiring conventions.
//!
//! Standard boards put the stimulus source on scope channel 1 and the
//! resistor/memristor node on channel 2. The inverted revision is mounted
//! upside down: the node sits on channel 1, the source on channel 2, and the
//! memristor polarity is reversed. Correcting here keeps every downstream
//! formula topology-agnostic.
use serde::{Deserialize, Serialize};
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyConvention {
    #[default]
    Standard,
    Inverted,
}
/// Topology-corrected sample pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectedSample {
    pub source_v: f64,
    pub device_v: f64,
}
impl TopologyConvention {
    /// Maps a raw `(A, B)` channel pair to `(source, device node)`.
    pub fn correct(self, raw_a: f64, raw_b: f64) -> CorrectedSample {
        match self {
            TopologyConvention::Standard => CorrectedSample {
                source_v: raw_a,
                device_v: raw_b,
            },
            TopologyConvention::Inverted => CorrectedSample {
                source_v: -raw_b,
                device_v: -raw_a,
            },
        }
    }
    /// Sign applied to programmed stimulus amplitude and offset.
    pub fn stimulus_polarity(self) -> f64 {
        match self {
            TopologyConvention::Standard => 1.0,
            TopologyConvention::Inverted => -1.0,
        }
    }
}
/// Free-function form of [`TopologyConvention::correct`] returning a tuple.
pub fn correct(topology: TopologyConvention, raw_a: f64, raw_b: f64) -> (f64, f64) {
    let c = topology.correct(raw_a, raw_b);
    (c.source_v, c.device_v)
}
