// src/engine.rs
//! Background acquisition loop.
//!
//! One worker thread owns the instrument and the conductance smoother while
//! the loop is running. The control plane talks to it only through a command
//! channel and a cancellation flag; `stop` joins the worker and takes both
//! back.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use crate::drivers::error::{DriverError, LoopError, PipelineError};
use crate::drivers::pipeline::{
    AcquisitionTransformPipeline, DerivedBatch, MeasurementSettings, MeasurementWarning,
};
use crate::drivers::smoother::ConductanceSmoother;
use crate::drivers::source::{Instrument, SampleBatch};
use crate::drivers::stimulus::{CaptureSettings, StimulusProgram};
use crate::types::{LoopCommand, LoopState, RunSummary, TransformMode};
use crate::waveform::WaveformSpec;
/// Receives derived batches on the acquisition thread.
pub trait BatchConsumer: Send {
    fn on_batch(&mut self, batch: DerivedBatch);
    /// Called instead of `on_batch` when a batch carries a degenerate-measurement warning.
    fn on_warning(&mut self, _warning: &MeasurementWarning) {}
}
impl<F> BatchConsumer for F
where
    F: FnMut(DerivedBatch) + Send,
{
    fn on_batch(&mut self, batch: DerivedBatch) {
        self(batch)
    }
}
/// Longest accepted poll or frame interval.
pub const MAX_LOOP_INTERVAL: Duration = Duration::from_secs(60);
/// Polls start every `poll_interval`, measured from the start of the
/// previous cycle; a cycle that delivered a batch also lasts at least
/// `frame_interval`. Slow cycles are followed immediately by the next poll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopTiming {
    pub poll_interval: Duration,
    /// Minimum spacing between consumer deliveries.
    pub frame_interval: Duration,
}
impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            frame_interval: Duration::from_millis(50),
        }
    }
}
/// Snapshot handed to [`AcquisitionLoop::start`].
#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub waveform: WaveformSpec,
    pub measurement: MeasurementSettings,
    pub buffer_size: usize,
    pub period_count: usize,
    pub samples_per_period: usize,
    pub timing: LoopTiming,
}
impl LoopTiming {
    pub fn validate(&self) -> Result<(), LoopError> {
        if self.poll_interval.is_zero() || self.poll_interval > MAX_LOOP_INTERVAL {
            return Err(LoopError::InvalidTiming {
                name: "poll_interval",
                value: self.poll_interval,
            });
        }
        if self.frame_interval > MAX_LOOP_INTERVAL {
            return Err(LoopError::InvalidTiming {
                name: "frame_interval",
                value: self.frame_interval,
            });
        }
        Ok(())
    }
    fn cycle_budget(&self, delivered: bool) -> Duration {
        if delivered {
            self.poll_interval.max(self.frame_interval)
        } else {
            self.poll_interval
        }
    }
}
impl LoopConfig {
    pub fn capture(&self) -> CaptureSettings {
        capture_for(&self.waveform, self.buffer_size, self.period_count)
    }
    pub fn stimulus(&self) -> StimulusProgram {
        StimulusProgram::new(
            &self.waveform,
            self.measurement.topology,
            self.samples_per_period,
        )
    }
}
fn capture_for(waveform: &WaveformSpec, buffer_size: usize, period_count: usize) -> CaptureSettings {
    CaptureSettings::for_stimulus(waveform.frequency_hz(), buffer_size, period_count)
}
/// Cloneable, thread-safe way to ask a running loop to stop.
#[derive(Clone, Debug)]
pub struct StopHandle {
    cancel: Arc<AtomicBool>,
    commands: Sender<LoopCommand>,
}
impl StopHandle {
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        // The worker may already be gone; the flag alone is enough then.
        self.commands.send(LoopCommand::Stop).ok();
    }
    pub fn is_stop_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
struct WorkerExit<D> {
    device: D,
    smoother: ConductanceSmoother,
    result: Result<RunSummary, LoopError>,
}
struct RunningLoop<D> {
    stop: StopHandle,
    worker: JoinHandle<WorkerExit<D>>,
}
/// Drives stimulus, acquisition and transform until stopped.
pub struct AcquisitionLoop<D: Instrument + 'static> {
    idle: Option<(D, ConductanceSmoother)>,
    running: Option<RunningLoop<D>>,
}
impl<D: Instrument + 'static> AcquisitionLoop<D> {
    pub fn new(device: D, smoother: ConductanceSmoother) -> Self {
        Self {
            idle: Some((device, smoother)),
            running: None,
        }
    }
    pub fn state(&self) -> LoopState {
        match &self.running {
            None => LoopState::Idle,
            Some(run) if run.stop.is_stop_requested() || run.worker.is_finished() => {
                LoopState::Stopping
            }
            Some(_) => LoopState::Running,
        }
    }
    /// Programs the stimulus, starts the capture and spawns the worker.
    pub fn start<C>(&mut self, config: LoopConfig, consumer: C) -> Result<(), LoopError>
    where
        C: BatchConsumer + 'static,
    {
        if self.running.is_some() {
            return Err(LoopError::AlreadyRunning);
        }
        config.timing.validate()?;
        let pipeline = AcquisitionTransformPipeline::new(config.measurement)?;
        let capture = config.capture();
        if !capture.sample_frequency_hz.is_finite() || capture.sample_frequency_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleFrequency(capture.sample_frequency_hz).into());
        }
        let (mut device, mut smoother) = self.idle.take().ok_or(LoopError::DeviceUnavailable)?;
        if let Err(e) = start_instrument(&mut device, &config.stimulus(), &capture) {
            self.idle = Some((device, smoother));
            return Err(e.into());
        }
        smoother.reset();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = channel();
        let stop = StopHandle {
            cancel: cancel.clone(),
            commands: tx,
        };
        info!(
            "acquisition started: {} ({}) at {:.3} Hz, sampling {:.1} Hz, {:?} mode",
            config.waveform.id(),
            config.waveform.shape().label(),
            config.waveform.frequency_hz(),
            capture.sample_frequency_hz,
            config.measurement.mode
        );
        let worker = Worker {
            device,
            smoother,
            pipeline,
            consumer,
            capture,
            config,
            commands: rx,
            cancel,
            summary: RunSummary::default(),
        };
        let worker = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || worker.run());
        match worker {
            Ok(worker) => {
                self.running = Some(RunningLoop { stop, worker });
                Ok(())
            }
            Err(e) => {
                // The closure owning the device is dropped with the failed spawn.
                error!("failed to spawn acquisition thread: {e}");
                Err(LoopError::DeviceUnavailable)
            }
        }
    }
    /// Requests cancellation, waits for the worker and returns to `Idle`.
    ///
    /// A driver fault that ended the loop early is reported here.
    pub fn stop(&mut self) -> Result<RunSummary, LoopError> {
        let run = self.running.take().ok_or(LoopError::NotRunning)?;
        run.stop.request_stop();
        match run.worker.join() {
            Ok(exit) => {
                self.idle = Some((exit.device, exit.smoother));
                match &exit.result {
                    Ok(summary) => info!("acquisition stopped: {summary:?}"),
                    Err(e) => error!("acquisition ended with error: {e}"),
                }
                exit.result
            }
            Err(_) => Err(LoopError::WorkerPanicked),
        }
    }
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.running.as_ref().map(|run| run.stop.clone())
    }
    /// Hands a complete settings snapshot to the running worker.
    pub fn reconfigure(&self, settings: MeasurementSettings) -> Result<(), LoopError> {
        settings.validate()?;
        self.send(LoopCommand::Reconfigure(settings))
    }
    /// Replaces the stimulus waveform of a running loop.
    pub fn restart_stimulus(&self, waveform: WaveformSpec) -> Result<(), LoopError> {
        self.send(LoopCommand::RestartStimulus(Box::new(waveform)))
    }
    fn send(&self, command: LoopCommand) -> Result<(), LoopError> {
        let run = self.running.as_ref().ok_or(LoopError::NotRunning)?;
        run.stop
            .commands
            .send(command)
            .map_err(|_| LoopError::NotRunning)
    }
    /// Clears the running average. Only allowed while idle.
    pub fn reset_smoother(&mut self) -> Result<(), LoopError> {
        if self.running.is_some() {
            return Err(LoopError::AlreadyRunning);
        }
        let (_, smoother) = self.idle.as_mut().ok_or(LoopError::DeviceUnavailable)?;
        smoother.reset();
        Ok(())
    }
    pub fn smoother(&self) -> Option<&ConductanceSmoother> {
        self.idle.as_ref().map(|(_, smoother)| smoother)
    }
    pub fn device(&self) -> Option<&D> {
        self.idle.as_ref().map(|(device, _)| device)
    }
    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.idle.as_mut().map(|(device, _)| device)
    }
}
impl<D: Instrument + 'static> Drop for AcquisitionLoop<D> {
    fn drop(&mut self) {
        if self.running.is_some() {
            if let Err(e) = self.stop() {
                warn!("acquisition loop dropped while running: {e}");
            }
        }
    }
}
fn start_instrument<D: Instrument>(
    device: &mut D,
    program: &StimulusProgram,
    capture: &CaptureSettings,
) -> Result<(), DriverError> {
    device.start_wave(program)?;
    if let Err(e) = device.start_acquisition(capture) {
        device.stop_wave().ok();
        return Err(e);
    }
    Ok(())
}
struct Worker<D, C> {
    device: D,
    smoother: ConductanceSmoother,
    pipeline: AcquisitionTransformPipeline,
    consumer: C,
    capture: CaptureSettings,
    config: LoopConfig,
    commands: Receiver<LoopCommand>,
    cancel: Arc<AtomicBool>,
    summary: RunSummary,
}
impl<D: Instrument, C: BatchConsumer> Worker<D, C> {
    fn run(mut self) -> WorkerExit<D> {
        let outcome = self.drive();
        let shutdown = self.shutdown();
        let result = match (outcome, shutdown) {
            (Err(fault), _) => {
                error!("acquisition fault: {fault}");
                Err(LoopError::Fault(fault))
            }
            (Ok(()), Err(e)) => Err(LoopError::Fault(e)),
            (Ok(()), Ok(())) => Ok(self.summary),
        };
        WorkerExit {
            device: self.device,
            smoother: self.smoother,
            result,
        }
    }
    fn drive(&mut self) -> Result<(), DriverError> {
        let timing = self.config.timing;
        let mut next_poll = Instant::now() + timing.poll_interval;
        loop {
            if self.wait_until(next_poll)? {
                return Ok(());
            }
            let cycle_start = Instant::now();
            let delivered = self.cycle()?;
            next_poll = cycle_start + timing.cycle_budget(delivered);
        }
    }
    /// One poll. Returns whether a batch reached the consumer.
    fn cycle(&mut self) -> Result<bool, DriverError> {
        self.summary.polls += 1;
        let valid = self.device.poll_status()?;
        if valid == 0 {
            self.summary.empty_polls += 1;
            return Ok(false);
        }
        let (a, b) = self.device.read_channels(valid)?;
        if a.len() != b.len() {
            return Err(DriverError::ChannelLengthMismatch {
                a: a.len(),
                b: b.len(),
            });
        }
        let batch = SampleBatch::new(a, b, self.capture.sample_frequency_hz)
            .map_err(|e| DriverError::Acquisition(e.to_string()))?;
        let output = self.pipeline.transform(batch, &mut self.smoother);
        match output.warning {
            Some(warning) => {
                warn!("{warning}");
                self.consumer.on_warning(&warning);
                self.summary.batches_suppressed += 1;
                Ok(false)
            }
            None => {
                self.consumer.on_batch(output.batch);
                self.summary.batches_delivered += 1;
                Ok(true)
            }
        }
    }
    /// Sleeps until `deadline` while serving commands. Returns `true` once
    /// cancellation is requested or the control side hung up.
    fn wait_until(&mut self, deadline: Instant) -> Result<bool, DriverError> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(remaining) {
                Ok(LoopCommand::Stop) => return Ok(true),
                Ok(LoopCommand::Reconfigure(settings)) => self.reconfigure(settings)?,
                Ok(LoopCommand::RestartStimulus(waveform)) => self.restart_stimulus(*waveform)?,
                Err(RecvTimeoutError::Timeout) => {
                    return Ok(self.cancel.load(Ordering::SeqCst));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(true),
            }
        }
    }
    fn reconfigure(&mut self, settings: MeasurementSettings) -> Result<(), DriverError> {
        let previous = *self.pipeline.settings();
        if let Err(e) = self.pipeline.set_settings(settings) {
            warn!("ignoring invalid measurement settings: {e}");
            return Ok(());
        }
        if settings.mode == TransformMode::ConductanceVoltage
            && previous.mode != TransformMode::ConductanceVoltage
        {
            self.smoother.reset();
        }
        self.config.measurement = settings;
        debug!("measurement settings updated: {settings:?}");
        // Stimulus polarity follows the board wiring.
        if settings.topology != previous.topology {
            self.reprogram()?;
        }
        Ok(())
    }
    fn restart_stimulus(&mut self, waveform: WaveformSpec) -> Result<(), DriverError> {
        self.config.waveform = waveform;
        self.reprogram()
    }
    fn reprogram(&mut self) -> Result<(), DriverError> {
        self.device.stop_wave()?;
        self.device.stop_acquisition()?;
        self.capture = self.config.capture();
        start_instrument(&mut self.device, &self.config.stimulus(), &self.capture)?;
        info!(
            "stimulus restarted at {:.3} Hz, sampling {:.1} Hz",
            self.config.waveform.frequency_hz(),
            self.capture.sample_frequency_hz
        );
        Ok(())
    }
    fn shutdown(&mut self) -> Result<(), DriverError> {
        let wave = self.device.stop_wave();
        let acquisition = self.device.stop_acquisition();
        if let Err(e) = &wave {
            warn!("failed to stop stimulus: {e}");
        }
        if let Err(e) = &acquisition {
            warn!("failed to stop acquisition: {e}");
        }
        wave.and(acquisition)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use crate::drivers::source::ScriptedDevice;
    use crate::drivers::topology::TopologyConvention;
    use crate::drivers::units::{ConductanceUnit, CurrentUnit};
    use crate::waveform::WaveShape;
    const WAIT: Duration = Duration::from_secs(5);
    fn settings(mode: TransformMode) -> MeasurementSettings {
        MeasurementSettings {
            mode,
            topology: TopologyConvention::Standard,
            series_resistance_ohms: 1000.0,
            current_unit: CurrentUnit::MicroAmps,
            conductance_unit: ConductanceUnit::MilliSiemens,
            min_measurable_amplitude_v: 0.01,
        }
    }
    fn config(mode: TransformMode) -> LoopConfig {
        LoopConfig {
            waveform: WaveformSpec::new("sine", WaveShape::Sine, 0.0, 1.0e7, 1.0, 0.5).unwrap(),
            measurement: settings(mode),
            buffer_size: 2,
            period_count: 1,
            samples_per_period: 8,
            timing: LoopTiming {
                poll_interval: Duration::from_millis(1),
                frame_interval: Duration::from_millis(2),
            },
        }
    }
    fn new_loop(device: ScriptedDevice) -> AcquisitionLoop<ScriptedDevice> {
        AcquisitionLoop::new(device, ConductanceSmoother::new(0.1, 0.0).unwrap())
    }
    fn scripted() -> ScriptedDevice {
        ScriptedDevice::new(vec![(vec![1.0, 0.5], vec![0.2, 0.1])]).repeating()
    }
    #[test]
    fn delivers_derived_batches_until_stopped() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::CurrentVoltage), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        assert_eq!(acq.state(), LoopState::Running);
        for _ in 0..3 {
            let batch = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(batch.mode, TransformMode::CurrentVoltage);
            assert!((batch.quantity[0] - 800.0).abs() < 1e-9);
            assert!((batch.quantity[1] - 400.0).abs() < 1e-9);
            assert_eq!(batch.device_v, vec![0.2, 0.1]);
        }
        let summary = acq.stop().unwrap();
        assert_eq!(acq.state(), LoopState::Idle);
        assert!(summary.batches_delivered >= 3);
        assert_eq!(summary.batches_suppressed, 0);
        let device = acq.device().unwrap();
        assert_eq!(device.programs.len(), 1);
        assert_eq!(device.captures.len(), 1);
        assert_eq!(device.captures[0].sample_frequency_hz, 200.0);
        assert_eq!(device.wave_stops, 1);
        assert_eq!(device.acquisition_stops, 1);
    }
    struct Recorder {
        batches: mpsc::Sender<DerivedBatch>,
        warnings: mpsc::Sender<String>,
    }
    impl BatchConsumer for Recorder {
        fn on_batch(&mut self, batch: DerivedBatch) {
            self.batches.send(batch).ok();
        }
        fn on_warning(&mut self, warning: &MeasurementWarning) {
            self.warnings.send(warning.to_string()).ok();
        }
    }
    #[test]
    fn degenerate_batches_raise_warnings_instead_of_deliveries() {
        // Device voltage never clears the 10 mV threshold.
        let device = ScriptedDevice::new(vec![(vec![1.0, 1.0], vec![0.005, 0.0])]).repeating();
        let mut acq = new_loop(device);
        let (batch_tx, batch_rx) = mpsc::channel();
        let (warn_tx, warn_rx) = mpsc::channel();
        let recorder = Recorder {
            batches: batch_tx,
            warnings: warn_tx,
        };
        acq.start(config(TransformMode::ConductanceVoltage), recorder)
            .unwrap();
        let message = warn_rx.recv_timeout(WAIT).unwrap();
        assert!(message.contains("less than"));
        let summary = acq.stop().unwrap();
        assert!(summary.batches_suppressed >= 1);
        assert_eq!(summary.batches_delivered, 0);
        assert!(batch_rx.try_recv().is_err());
        assert_eq!(acq.smoother().unwrap().average(), 0.0);
    }
    #[test]
    fn conductance_batches_with_a_rest_window_are_delivered() {
        // Half-sine drive: active samples followed by a 0 V rest.
        let device =
            ScriptedDevice::new(vec![(vec![0.0, 0.6, 1.0, 0.6, 0.0, 0.0], vec![0.0, 0.2, 0.5, 0.2, 0.0, 0.0])])
                .repeating();
        let mut acq = new_loop(device);
        let (batch_tx, batch_rx) = mpsc::channel();
        let (warn_tx, warn_rx) = mpsc::channel();
        let recorder = Recorder {
            batches: batch_tx,
            warnings: warn_tx,
        };
        acq.start(config(TransformMode::ConductanceVoltage), recorder)
            .unwrap();
        let batch = batch_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(batch.mode, TransformMode::ConductanceVoltage);
        assert!(batch.quantity.iter().all(|g| g.is_finite() && *g >= 0.0));
        assert_eq!(batch.quantity[4], batch.quantity[3]);
        let summary = acq.stop().unwrap();
        assert_eq!(summary.batches_suppressed, 0);
        assert!(warn_rx.try_recv().is_err());
    }
    #[test]
    fn driver_fault_ends_loop_and_still_stops_instrument() {
        let device =
            scripted().failing_after(2, DriverError::Acquisition("usb disconnected".into()));
        let mut acq = new_loop(device);
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::Capture), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        // Exactly two batches, then the sender is dropped with the worker.
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_err());
        let deadline = Instant::now() + WAIT;
        while acq.state() != LoopState::Stopping && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(acq.state(), LoopState::Stopping);
        let err = acq.stop().unwrap_err();
        assert!(matches!(err, LoopError::Fault(DriverError::Acquisition(_))));
        let device = acq.device().unwrap();
        assert_eq!(device.wave_stops, 1);
        assert_eq!(device.acquisition_stops, 1);
        assert_eq!(acq.state(), LoopState::Idle);
    }
    #[test]
    fn stop_handle_works_from_another_thread() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::CurrentVoltage), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        let handle = acq.stop_handle().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        thread::spawn(move || handle.request_stop()).join().unwrap();
        assert_eq!(acq.state(), LoopState::Stopping);
        assert!(acq.stop().is_ok());
    }
    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut acq = new_loop(scripted());
        assert!(matches!(acq.stop(), Err(LoopError::NotRunning)));
        assert!(matches!(
            acq.reconfigure(settings(TransformMode::Capture)),
            Err(LoopError::NotRunning)
        ));
        acq.reset_smoother().unwrap();
        acq.start(config(TransformMode::Capture), |_batch: DerivedBatch| {})
            .unwrap();
        assert!(matches!(
            acq.start(config(TransformMode::Capture), |_batch: DerivedBatch| {}),
            Err(LoopError::AlreadyRunning)
        ));
        assert!(matches!(acq.reset_smoother(), Err(LoopError::AlreadyRunning)));
        let mut bad = settings(TransformMode::Capture);
        bad.series_resistance_ohms = -5.0;
        assert!(matches!(acq.reconfigure(bad), Err(LoopError::Settings(_))));
        acq.stop().unwrap();
    }
    #[test]
    fn reconfigure_switches_mode_between_batches() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::Capture), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().mode, TransformMode::Capture);
        acq.reconfigure(settings(TransformMode::CurrentVoltage))
            .unwrap();
        let switched = loop {
            let batch = rx.recv_timeout(WAIT).unwrap();
            if batch.mode == TransformMode::CurrentVoltage {
                break batch;
            }
        };
        assert!((switched.quantity[0] - 800.0).abs() < 1e-9);
        acq.stop().unwrap();
    }
    #[test]
    fn restart_stimulus_reprograms_output_and_capture() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::Capture), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        rx.recv_timeout(WAIT).unwrap();
        let faster = WaveformSpec::new("sine", WaveShape::Sine, 0.0, 5.0e6, 1.0, 0.5).unwrap();
        acq.restart_stimulus(faster).unwrap();
        // Wait until batches carry the doubled sample rate: 2 samples over 5 ms.
        loop {
            let batch = rx.recv_timeout(WAIT).unwrap();
            if (batch.quantity[1] - 0.0025).abs() < 1e-9 {
                break;
            }
        }
        acq.stop().unwrap();
        let device = acq.device().unwrap();
        assert_eq!(device.programs.len(), 2);
        assert!((device.programs[1].frequency_hz - 200.0).abs() < 1e-9);
        assert_eq!(device.captures[1].sample_frequency_hz, 400.0);
        assert_eq!(device.wave_stops, 2);
    }
    #[test]
    fn failed_topology_reprogram_ends_loop_with_fault() {
        let device =
            scripted().failing_wave_start_after(1, DriverError::Stimulus("awg busy".into()));
        let mut acq = new_loop(device);
        let (tx, rx) = mpsc::channel();
        acq.start(config(TransformMode::CurrentVoltage), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        rx.recv_timeout(WAIT).unwrap();
        let mut inverted = settings(TransformMode::CurrentVoltage);
        inverted.topology = TopologyConvention::Inverted;
        acq.reconfigure(inverted).unwrap();
        let deadline = Instant::now() + WAIT;
        while acq.state() != LoopState::Stopping && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let err = acq.stop().unwrap_err();
        assert!(matches!(err, LoopError::Fault(DriverError::Stimulus(_))));
        let device = acq.device().unwrap();
        assert_eq!(device.programs.len(), 1);
        // Once while reprogramming, once more on shutdown.
        assert_eq!(device.wave_stops, 2);
        assert_eq!(device.acquisition_stops, 2);
        assert!(!device.is_acquiring());
    }
    fn timed(poll_ms: u64, frame_ms: u64) -> LoopConfig {
        let mut config = config(TransformMode::CurrentVoltage);
        config.timing = LoopTiming {
            poll_interval: Duration::from_millis(poll_ms),
            frame_interval: Duration::from_millis(frame_ms),
        };
        config
    }
    #[test]
    fn frame_interval_alone_sets_delivery_rate() {
        let mut acq = new_loop(scripted());
        acq.start(timed(50, 50), |_batch: DerivedBatch| {}).unwrap();
        thread::sleep(Duration::from_secs(1));
        let summary = acq.stop().unwrap();
        // One delivery per 50 ms, first poll after 50 ms.
        assert!(
            (14..=21).contains(&summary.batches_delivered),
            "{summary:?}"
        );
        assert_eq!(summary.polls, summary.batches_delivered);
    }
    #[test]
    fn slow_consumer_is_polled_again_immediately() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(timed(100, 100), move |_batch: DerivedBatch| {
            tx.send(Instant::now()).ok();
            thread::sleep(Duration::from_millis(150));
        })
        .unwrap();
        let stamps: Vec<Instant> = (0..4).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        acq.stop().unwrap();
        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(140), "{gap:?}");
            // No frame budget is slept on top of the slow work.
            assert!(gap < Duration::from_millis(220), "{gap:?}");
        }
    }
    #[test]
    fn stop_interrupts_a_long_frame_wait() {
        let mut acq = new_loop(scripted());
        let (tx, rx) = mpsc::channel();
        acq.start(timed(1, 10_000), move |batch: DerivedBatch| {
            tx.send(batch).ok();
        })
        .unwrap();
        rx.recv_timeout(WAIT).unwrap();
        let asked = Instant::now();
        let summary = acq.stop().unwrap();
        assert!(asked.elapsed() < Duration::from_secs(1));
        assert_eq!(summary.batches_delivered, 1);
        assert_eq!(acq.state(), LoopState::Idle);
    }
    #[test]
    fn out_of_range_timing_is_rejected_before_starting() {
        let mut acq = new_loop(scripted());
        let zero_poll = timed(0, 50);
        assert!(matches!(
            acq.start(zero_poll, |_batch: DerivedBatch| {}),
            Err(LoopError::InvalidTiming { name: "poll_interval", .. })
        ));
        let mut huge_frame = timed(50, 50);
        huge_frame.timing.frame_interval = Duration::from_secs(u64::MAX);
        assert!(matches!(
            acq.start(huge_frame, |_batch: DerivedBatch| {}),
            Err(LoopError::InvalidTiming { name: "frame_interval", .. })
        ));
        assert_eq!(acq.state(), LoopState::Idle);
        assert!(acq.device().unwrap().programs.is_empty());
    }
}
