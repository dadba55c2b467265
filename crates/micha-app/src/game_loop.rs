//! Fixed-update / variable-render game loop.
//!
//! [`GameLoop::start`] takes over the calling thread and runs iterations until
//! a stop is requested. Each iteration measures the time since the previous
//! one, hands the simulation a `delta` expressed in target-update units, renders,
//! counts the frame, and then waits out the rest of the minimum frame interval
//! so iteration speed never exceeds the configured cap.
//!
//! Observers (and the callbacks themselves) talk to the loop through a
//! [`LoopHandle`], which reads and writes atomics only. The scheduler is the
//! single writer of phase and FPS; `stop()` is the only external write.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use micha_config::LoopSettings;
use micha_log::{phase_debug, phase_error, phase_info};

use crate::clock::{Clock, MonotonicClock, WaitError};
use crate::crash::{CrashMode, CrashReport, CrashSink, LogOnlySink};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Longest single pause taken while waiting for the frame deadline.
pub const WAIT_QUANTUM: Duration = Duration::from_millis(1);

/// Rates above this would round the derived interval down to zero nanoseconds.
pub const MAX_RATE: u32 = 1_000_000_000;

/// Error type callbacks may fail with.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
/// Return type of every loop callback.
pub type CallbackResult = Result<(), CallbackError>;

/// Called once per iteration with the elapsed time in target-update units.
pub type UpdateFn = Box<dyn FnMut(f64, &LoopHandle) -> CallbackResult>;
/// Called once per iteration after the update.
pub type RenderFn = Box<dyn FnMut(&LoopHandle) -> CallbackResult>;
/// Called at the very end of every iteration, after the pacing wait.
pub type IterationEndFn = Box<dyn FnMut(&LoopHandle) -> CallbackResult>;

/// Errors surfaced by the game loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// A rate parameter is zero or too large to give a non-zero interval.
    #[error("`{name}` must be between 1 and {MAX_RATE}, got {value}")]
    InvalidRate { name: &'static str, value: u32 },

    /// A callback failed. The loop stops without running further callbacks.
    #[error("{hook} callback failed: {source}")]
    Callback {
        hook: Hook,
        #[source]
        source: CallbackError,
    },

    /// The pacing wait failed. Already reported to the crash sink as fatal.
    #[error(transparent)]
    WaitInterrupted(#[from] WaitError),
}

/// Identifies which callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Update,
    Render,
    IterationEnd,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Update => "update",
            Self::Render => "render",
            Self::IterationEnd => "end-of-iteration",
        })
    }
}

/// Where the loop currently is within an iteration.
///
/// Cycles `Updating -> Rendering -> Waiting` while running. The phase is left
/// at `Waiting` when the loop exits; only a loop that never started reports
/// `Stopped`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Stopped = 0,
    Updating = 1,
    Rendering = 2,
    Waiting = 3,
}

impl Phase {
    /// Label used in log prefixes.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Updating => "Updating",
            Self::Rendering => "Rendering",
            Self::Waiting => "Waiting",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Updating,
            2 => Self::Rendering,
            3 => Self::Waiting,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Validated loop rates and the intervals derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    target_updates_per_second: u32,
    max_updates_per_second: u32,
    target_update_interval: Duration,
    min_frame_interval: Duration,
}

impl LoopConfig {
    /// Derive intervals from the two rates. Both must be in `1..=MAX_RATE`.
    pub fn new(
        target_updates_per_second: u32,
        max_updates_per_second: u32,
    ) -> Result<Self, LoopError> {
        Ok(Self {
            target_updates_per_second,
            max_updates_per_second,
            target_update_interval: interval_for(
                "target_updates_per_second",
                target_updates_per_second,
            )?,
            min_frame_interval: interval_for("max_updates_per_second", max_updates_per_second)?,
        })
    }

    /// Validate the raw rates read from `config.ron`.
    pub fn from_settings(settings: &LoopSettings) -> Result<Self, LoopError> {
        Self::new(
            settings.target_updates_per_second,
            settings.max_updates_per_second,
        )
    }

    /// Returns the desired update+render iterations per second.
    pub fn target_updates_per_second(&self) -> u32 {
        self.target_updates_per_second
    }

    /// Returns the hard ceiling on iterations per second.
    pub fn max_updates_per_second(&self) -> u32 {
        self.max_updates_per_second
    }

    /// `1s / target_updates_per_second`.
    pub fn target_update_interval(&self) -> Duration {
        self.target_update_interval
    }

    /// `1s / max_updates_per_second`.
    pub fn min_frame_interval(&self) -> Duration {
        self.min_frame_interval
    }
}

fn interval_for(name: &'static str, rate: u32) -> Result<Duration, LoopError> {
    if rate == 0 || rate > MAX_RATE {
        return Err(LoopError::InvalidRate { name, value: rate });
    }
    Ok(ONE_SECOND / rate)
}

/// Ratio of `elapsed` to `target`; `1.0` means exactly one target interval.
pub fn delta_for(elapsed: Duration, target: Duration) -> f64 {
    elapsed.as_nanos() as f64 / target.as_nanos() as f64
}

#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    phase: AtomicU8,
    fps: AtomicU32,
    fps_fresh: AtomicBool,
}

/// Cheap, cloneable view of a running loop. Safe to use from any thread.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Takes effect once the in-flight iteration,
    /// including its end-of-iteration hook, has completed.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            phase_debug!(self.current_phase(), "Stop requested");
        }
    }

    /// Returns `true` between `start()` and the next observed stop.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Frames counted in the last complete one-second window, 0 before the first.
    /// The iteration that closes a window is counted toward the next one.
    pub fn current_fps(&self) -> u32 {
        self.shared.fps.load(Ordering::Acquire)
    }

    /// True from the iteration whose accounting closed an FPS window until the
    /// next iteration's accounting.
    pub fn is_fps_fresh(&self) -> bool {
        self.shared.fps_fresh.load(Ordering::Acquire)
    }

    /// Returns the phase most recently entered by the scheduler.
    pub fn current_phase(&self) -> Phase {
        Phase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    /// Flip to running. Returns `false` if the loop was already running.
    pub(crate) fn mark_running(&self) -> bool {
        self.shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_phase(&self, phase: Phase) {
        self.shared.phase.store(phase as u8, Ordering::Release);
    }

    fn publish_fps(&self, fps: u32) {
        self.shared.fps.store(fps, Ordering::Release);
    }

    fn set_fps_fresh(&self, fresh: bool) {
        self.shared.fps_fresh.store(fresh, Ordering::Release);
    }
}

/// The three hooks the loop drives. Unset hooks do nothing.
pub struct LoopCallbacks {
    update: UpdateFn,
    render: RenderFn,
    iteration_end: IterationEndFn,
}

impl LoopCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(
        mut self,
        update: impl FnMut(f64, &LoopHandle) -> CallbackResult + 'static,
    ) -> Self {
        self.update = Box::new(update);
        self
    }

    pub fn on_render(
        mut self,
        render: impl FnMut(&LoopHandle) -> CallbackResult + 'static,
    ) -> Self {
        self.render = Box::new(render);
        self
    }

    /// Fires at the end of every iteration, not only the last one.
    pub fn on_iteration_end(
        mut self,
        iteration_end: impl FnMut(&LoopHandle) -> CallbackResult + 'static,
    ) -> Self {
        self.iteration_end = Box::new(iteration_end);
        self
    }
}

impl Default for LoopCallbacks {
    fn default() -> Self {
        Self {
            update: Box::new(|_, _| Ok(())),
            render: Box::new(|_| Ok(())),
            iteration_end: Box::new(|_| Ok(())),
        }
    }
}

/// Paced update/render scheduler.
pub struct GameLoop<C: Clock = MonotonicClock> {
    config: LoopConfig,
    clock: C,
    crash_sink: Arc<dyn CrashSink>,
    callbacks: LoopCallbacks,
    handle: LoopHandle,
    last_iteration_time: Duration,
    next_deadline: Duration,
    fps_window_start: Duration,
    frames_this_window: u32,
    iterations: u64,
}

impl GameLoop<MonotonicClock> {
    /// A loop on the real clock whose fatal wait errors are only logged.
    pub fn new(config: LoopConfig, callbacks: LoopCallbacks) -> Self {
        Self::with_clock(config, callbacks, MonotonicClock::new(), Arc::new(LogOnlySink))
    }
}

impl<C: Clock> GameLoop<C> {
    /// A loop on a caller-supplied clock and crash sink.
    pub fn with_clock(
        config: LoopConfig,
        callbacks: LoopCallbacks,
        clock: C,
        crash_sink: Arc<dyn CrashSink>,
    ) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            crash_sink,
            callbacks,
            handle: LoopHandle::new(),
            last_iteration_time: now,
            next_deadline: now + config.min_frame_interval(),
            fps_window_start: now,
            frames_this_window: 0,
            iterations: 0,
        }
    }

    /// Run iterations on the calling thread until [`stop`](Self::stop) is
    /// observed. Returns immediately if the loop is already running.
    ///
    /// A failing callback or pacing wait ends the loop with an error; nothing
    /// is retried.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if !self.handle.mark_running() {
            phase_debug!(self.current_phase(), "Game loop already running");
            return Ok(());
        }

        phase_info!(
            self.current_phase(),
            "Game loop started: {} updates/s target, {} updates/s cap",
            self.config.target_updates_per_second(),
            self.config.max_updates_per_second()
        );

        let result = self.run();
        self.handle.stop();

        match &result {
            Ok(()) => phase_info!(
                self.current_phase(),
                "Game loop stopped after {} iterations",
                self.iterations
            ),
            Err(err) => phase_error!(self.current_phase(), "Game loop aborted: {err}"),
        }
        result
    }

    fn run(&mut self) -> Result<(), LoopError> {
        while self.handle.is_running() {
            self.iterate()?;
        }
        Ok(())
    }

    fn iterate(&mut self) -> Result<(), LoopError> {
        self.next_deadline = self.clock.now() + self.config.min_frame_interval();

        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_iteration_time);
        self.last_iteration_time = now;
        let delta = delta_for(elapsed, self.config.target_update_interval());

        self.handle.set_phase(Phase::Updating);
        (self.callbacks.update)(delta, &self.handle).map_err(|source| LoopError::Callback {
            hook: Hook::Update,
            source,
        })?;

        self.handle.set_phase(Phase::Rendering);
        (self.callbacks.render)(&self.handle).map_err(|source| LoopError::Callback {
            hook: Hook::Render,
            source,
        })?;

        self.handle.set_phase(Phase::Waiting);
        self.account_frame(now);
        self.wait_for_deadline()?;

        (self.callbacks.iteration_end)(&self.handle).map_err(|source| LoopError::Callback {
            hook: Hook::IterationEnd,
            source,
        })?;

        self.iterations += 1;
        Ok(())
    }

    /// Count this iteration. An iteration starting at or past the end of the
    /// current window closes it and is counted in the next one, so the
    /// boundary iteration always belongs to the new window.
    fn account_frame(&mut self, now: Duration) {
        let rolled_over = now.saturating_sub(self.fps_window_start) >= ONE_SECOND;
        if rolled_over {
            self.handle.publish_fps(self.frames_this_window);
            self.frames_this_window = 0;
            self.fps_window_start = now;
        }
        self.frames_this_window = self.frames_this_window.saturating_add(1);
        self.handle.set_fps_fresh(rolled_over);
    }

    fn wait_for_deadline(&mut self) -> Result<(), LoopError> {
        loop {
            let now = self.clock.now();
            if now >= self.next_deadline {
                return Ok(());
            }
            let remaining = self.next_deadline - now;
            if let Err(err) = self.clock.pause(remaining.min(WAIT_QUANTUM)) {
                phase_error!(self.current_phase(), "Frame pacing wait failed: {err}");
                self.crash_sink
                    .handle(&CrashReport::from_error(&err), CrashMode::Kill);
                return Err(LoopError::WaitInterrupted(err));
            }
        }
    }

    /// Request a cooperative stop. See [`LoopHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Returns `true` while iterations are being run.
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Returns the last published FPS. See [`LoopHandle::current_fps`].
    pub fn current_fps(&self) -> u32 {
        self.handle.current_fps()
    }

    /// Returns `true` on the iteration that published a new FPS value.
    pub fn is_fps_fresh(&self) -> bool {
        self.handle.is_fps_fresh()
    }

    /// Returns the current phase; [`Phase::Stopped`] until the first start.
    pub fn current_phase(&self) -> Phase {
        self.handle.current_phase()
    }

    /// A handle observers and other threads can hold on to.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Returns the validated rates this loop was built with.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Iterations completed since construction.
    pub fn iteration_count(&self) -> u64 {
        self.iterations
    }
}
