// src/main.rs
use std::thread;
use std::time::Duration;
use anyhow::{Context, Result};
use log::{info, warn};
use memristor_rig::config::RigConfig;
use memristor_rig::drivers::{DerivedBatch, MeasurementWarning};
use memristor_rig::engine::{AcquisitionLoop, BatchConsumer};
use memristor_rig::types::TransformMode;

// 控制台输出：每批数据打印一行范围
struct ConsoleSink {
    batches: usize,
    unit_label: &'static str,
}
impl BatchConsumer for ConsoleSink {
    fn on_batch(&mut self, batch: DerivedBatch) {
        self.batches += 1;
        let (lo, hi) = span(&batch.device_v);
        let (q_lo, q_hi) = span(&batch.quantity);
        info!(
            "batch {}: {} samples, device {:.4}..{:.4} V, {} {:.4}..{:.4} {}",
            self.batches,
            batch.len(),
            lo,
            hi,
            batch.mode.quantity_label(),
            q_lo,
            q_hi,
            self.unit_label
        );
    }
    fn on_warning(&mut self, warning: &MeasurementWarning) {
        warn!("{warning}");
    }
}
fn span(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}
// 入口函数：无界面地跑一段模拟测量
fn main() -> Result<()> {
    env_logger::init();
    let config = match std::env::args().nth(1) {
        Some(path) => RigConfig::load(&path).with_context(|| format!("loading config {path}"))?,
        None => RigConfig::default(),
    };
    let loop_config = config.loop_config().context("building loop config")?;
    let smoother = config.smoother().context("building conductance smoother")?;
    let m = &config.measurement;
    let unit_label = match m.mode {
        TransformMode::Capture => "s",
        TransformMode::CurrentVoltage => m.current_unit.symbol(),
        TransformMode::ConductanceVoltage => m.conductance_unit.symbol(),
    };
    info!(
        "driving {} at {:.3} Hz into {:?} board, {:?} mode",
        loop_config.waveform.shape().label(),
        loop_config.waveform.frequency_hz(),
        m.topology,
        m.mode
    );
    let mut acquisition = AcquisitionLoop::new(config.simulated_board(), smoother);
    acquisition
        .start(
            loop_config,
            ConsoleSink {
                batches: 0,
                unit_label,
            },
        )
        .context("starting acquisition")?;
    thread::sleep(Duration::from_secs_f64(config.simulation.run_seconds));
    let summary = acquisition.stop().context("stopping acquisition")?;
    info!(
        "done: {} polls ({} empty), {} batches delivered, {} suppressed",
        summary.polls, summary.empty_polls, summary.batches_delivered, summary.batches_suppressed
    );
    if let Some(board) = acquisition.device() {
        info!(
            "final simulated conductance {:.6e} S",
            board.memristor().conductance_s
        );
    }
    Ok(())
}
