// src/types.rs
use serde::{Deserialize, Serialize};
use crate::drivers::pipeline::MeasurementSettings;
use crate::waveform::WaveformSpec;

// 变换模式
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Both node voltages against reconstructed time.
    Capture,
    /// Current through the series resistor against device voltage.
    #[default]
    CurrentVoltage,
    /// Smoothed conductance against device voltage.
    ConductanceVoltage,
}
impl TransformMode {
    pub fn quantity_label(self) -> &'static str {
        match self {
            TransformMode::Capture => "time",
            TransformMode::CurrentVoltage => "current",
            TransformMode::ConductanceVoltage => "conductance",
        }
    }
}

// 控制面发给采集线程的命令
#[derive(Clone, Debug)]
pub enum LoopCommand {
    /// Replace the measurement snapshot before the next batch.
    Reconfigure(MeasurementSettings),
    /// Reprogram the stimulus and restart the capture around it.
    RestartStimulus(Box<WaveformSpec>),
    Stop,
}

// 采集循环状态
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LoopState {
    Idle,
    Running,
    /// Cancellation requested or the worker already exited; not yet joined.
    Stopping,
}

// 一次采集会话的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub polls: usize,
    pub empty_polls: usize,
    pub batches_delivered: usize,
    /// Batches held back because of a degenerate-measurement warning.
    pub batches_suppressed: usize,
}
