use crate::drivers::error::PipelineError;
/// Exponential moving average over per-sample conductance with a lower floor.
///
/// `ave_new = (1 - k) * ave_old + k * max(floor, g_raw)`
///
/// With a non-negative floor and a non-negative starting average the output
/// can never go negative.
#[derive(Clone, Debug, PartialEq)]
pub struct ConductanceSmoother {
    k: f64,
    floor: f64,
    average: f64,
}
impl ConductanceSmoother {
    pub fn new(k: f64, floor: f64) -> Result<Self, PipelineError> {
        if !k.is_finite() || k <= 0.0 || k >= 1.0 {
            return Err(PipelineError::InvalidSmoothingConstant(k));
        }
        if !floor.is_finite() || floor < 0.0 {
            return Err(PipelineError::InvalidConductanceFloor(floor));
        }
        Ok(Self {
            k,
            floor,
            average: 0.0,
        })
    }
    pub fn k(&self) -> f64 {
        self.k
    }
    pub fn floor(&self) -> f64 {
        self.floor
    }
    pub fn average(&self) -> f64 {
        self.average
    }
    /// Applies the floor, folds the sample into the average and returns it.
    pub fn update(&mut self, g_raw: f64) -> f64 {
        let g = g_raw.max(self.floor);
        self.average = (1.0 - self.k) * self.average + self.k * g;
        self.average
    }
    pub fn reset(&mut self) {
        self.average = 0.0;
    }
    /// Starts the recurrence from a chosen average (clamped to the floor).
    pub fn seed(&mut self, average: f64) {
        self.average = if average.is_finite() {
            average.max(self.floor)
        } else {
            self.floor
        };
    }
}
