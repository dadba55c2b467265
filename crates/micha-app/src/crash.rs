//! Crash reporting and the process-wide fallback error path.
//!
//! Every fatal condition ends up in a [`CrashSink`] together with a
//! [`CrashMode`] chosen by whoever detected it. The production sink,
//! [`ProcessCrashHandler`], always logs a structured multi-line report first
//! and then either terminates the process or asks the running game loop to
//! stop. Tests swap in a [`CapturingSink`].

use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, warn};

use crate::game_loop::LoopHandle;

/// Process exit code used when a crash kills the process.
pub const CRASH_EXIT_CODE: i32 = -1;

/// How severe a crash is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashMode {
    /// Terminate the process immediately after logging.
    Kill,
    /// The game session is over; ask the loop to stop at its next check.
    RequestStop,
}

impl CrashMode {
    pub fn kills_process(self) -> bool {
        matches!(self, Self::Kill)
    }
}

/// Everything needed to diagnose a crash after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    /// Name of the thread the failure happened on.
    pub context: String,
    /// One-line description.
    pub summary: String,
    /// Cause chain and backtrace.
    pub trace: String,
}

impl CrashReport {
    /// Build a report for `error` on the current thread, including its
    /// `source()` chain and a backtrace (when `RUST_BACKTRACE` enables one).
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut trace = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace.push('\n');
        trace.push_str(&Backtrace::capture().to_string());

        Self {
            context: current_context(),
            summary: error.to_string(),
            trace,
        }
    }

    /// Build a report from a panic. The backtrace is always captured.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        Self {
            context: current_context(),
            summary: message.clone(),
            trace: format!(
                "panicked at {location}: {message}\n{}",
                Backtrace::force_capture()
            ),
        }
    }

    /// The report as it is written to the log, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            "A fatal error has occurred and the game must close.".to_string(),
            format!("Thread in question: {}", self.context),
            format!("Error summary: {}", self.summary),
            "Complete error:".to_string(),
        ];
        lines.extend(self.trace.lines().map(str::to_string));
        lines
    }
}

fn current_context() -> String {
    std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Write `report` to the error log.
pub fn log_report(report: &CrashReport) {
    for line in report.lines() {
        error!("{line}");
    }
}

/// Receiver for fatal conditions.
pub trait CrashSink: Send + Sync {
    fn handle(&self, report: &CrashReport, mode: CrashMode);
}

/// Logs reports and nothing else. Used when no handler has been supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlySink;

impl CrashSink for LogOnlySink {
    fn handle(&self, report: &CrashReport, mode: CrashMode) {
        log_report(report);
        if mode.kills_process() {
            warn!("Crash requested process termination, but no crash handler is installed");
        }
    }
}

/// The production crash handler.
#[derive(Debug, Default)]
pub struct ProcessCrashHandler {
    target: Mutex<Option<LoopHandle>>,
}

impl ProcessCrashHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the loop that [`CrashMode::RequestStop`] should stop.
    pub fn attach(&self, handle: LoopHandle) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn request_stop(&self) {
        match &*self.target.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(handle) => handle.stop(),
            None => warn!("Stop requested after a crash, but no game loop is attached"),
        }
    }
}

impl CrashSink for ProcessCrashHandler {
    fn handle(&self, report: &CrashReport, mode: CrashMode) {
        log_report(report);
        match mode {
            CrashMode::Kill => std::process::exit(CRASH_EXIT_CODE),
            CrashMode::RequestStop => {
                error!("Shutting game down nicely due to error: {}", report.summary);
                self.request_stop();
            }
        }
    }
}

/// Records every report it receives.
#[derive(Debug, Default)]
pub struct CapturingSink {
    reports: Mutex<Vec<(CrashReport, CrashMode)>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything handled so far, oldest first.
    pub fn reports(&self) -> Vec<(CrashReport, CrashMode)> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CrashSink for CapturingSink {
    fn handle(&self, report: &CrashReport, mode: CrashMode) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((report.clone(), mode));
    }
}

/// Route panics on any thread to `sink` in [`CrashMode::Kill`].
///
/// This replaces the current panic hook for the whole process.
pub fn install_panic_hook(sink: Arc<dyn CrashSink>) {
    std::panic::set_hook(Box::new(move |info| {
        let report = CrashReport::from_panic(info);
        sink.handle(&report, CrashMode::Kill);
    }));
}
