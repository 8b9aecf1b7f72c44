// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod error;
pub mod pipeline;
pub mod simulated;
pub mod smoother;
pub mod source;
pub mod stimulus;
pub mod topology;
pub mod units;
// 公开导出这些模块里的结构体，方便外部调用
pub use error::{ConfigError, DriverError, LoopError, PipelineError, WaveformError};
pub use pipeline::{
    AcquisitionTransformPipeline, DerivedBatch, MeasurementSettings, MeasurementWarning,
    TransformOutput,
};
pub use simulated::{MemristorModel, SimulatedBoard};
pub use smoother::ConductanceSmoother;
pub use source::{Instrument, SampleBatch, SampleSource, ScriptedDevice, StimulusOutput};
pub use stimulus::{CaptureSettings, StimulusProgram};
pub use topology::{CorrectedSample, TopologyConvention};
pub use units::{ConductanceUnit, CurrentUnit};
