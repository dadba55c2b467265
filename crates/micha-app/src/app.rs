//! The engine's application object.
//!
//! [`App`] ties the pieces together: it validates the config, builds the game
//! loop with the engine's own hooks, registers the loop with the crash handler
//! so session-fatal errors can stop it, and owns the window for the lifetime
//! of the loop.

use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use micha_config::{Config, ConfigError, DebugConfig};
use micha_log::phase_info;
use tracing::info;

use crate::clock::{Clock, MonotonicClock};
use crate::crash::{CrashMode, CrashReport, CrashSink, ProcessCrashHandler};
use crate::game_loop::{GameLoop, LoopCallbacks, LoopConfig, LoopError, LoopHandle};
use crate::version::{Version, VersionError};
use crate::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Loop(#[from] LoopError),
}

pub struct App {
    version: Version,
    window: Window,
    game_loop: GameLoop,
    crash: Arc<ProcessCrashHandler>,
}

impl App {
    /// Validate `config` and build a stopped loop attached to `crash`.
    pub fn new(config: &Config, crash: Arc<ProcessCrashHandler>) -> Result<Self, AppError> {
        info!("Creating Micha");
        config.validate()?;
        let version = Version::engine()?;

        let clock = MonotonicClock::new();
        let game_loop = GameLoop::with_clock(
            LoopConfig::from_settings(&config.game_loop)?,
            engine_callbacks(&config.debug, clock),
            clock,
            crash.clone(),
        );
        crash.attach(game_loop.handle());
        info!("Created game loop");

        let window = Window::from_config(&config.window);
        info!("Micha {version} created");

        Ok(Self {
            version,
            window,
            game_loop,
            crash,
        })
    }

    /// Show the window and run the game loop on this thread until it stops.
    pub fn launch(&mut self, args: &[String]) -> Result<(), AppError> {
        info!("Launching Micha {} with arguments: {:?}", self.version, args);
        self.init_game();

        info!("Starting game loop");
        let result = self.game_loop.start();
        self.window.destroy();
        Ok(result?)
    }

    fn init_game(&mut self) {
        info!("Initializing the game");
        let title = format!("{} {}", self.window.title(), self.version);
        self.window.set_title(title);
        self.window.show();
    }

    /// The game session cannot continue: log a crash report and ask the loop
    /// to stop at its next check.
    pub fn on_fatal_error(&self, error: &(dyn Error + 'static)) {
        self.crash
            .handle(&CrashReport::from_error(error), CrashMode::RequestStop);
    }

    /// Returns the engine version shown in the window title.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the game window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Returns the scheduler driving this app.
    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    /// Returns a handle that other threads can use to observe or stop the loop.
    pub fn loop_handle(&self) -> LoopHandle {
        self.game_loop.handle()
    }
}

/// The run limit is measured from the first update of each run, not from
/// construction.
fn engine_callbacks<C: Clock + Clone + 'static>(debug: &DebugConfig, clock: C) -> LoopCallbacks {
    let show_fps = debug.show_fps;
    let run_limit = debug.run_seconds.map(Duration::from_secs_f64);
    let run_started = Rc::new(Cell::new(None::<Duration>));
    let started = run_started.clone();
    let update_clock = clock.clone();

    LoopCallbacks::new()
        .on_update(move |_, _| {
            if started.get().is_none() {
                started.set(Some(update_clock.now()));
            }
            Ok(())
        })
        .on_render(move |handle| {
            if show_fps && handle.is_fps_fresh() && handle.current_fps() != 0 {
                phase_info!(handle.current_phase(), "FPS: {}", handle.current_fps());
            }
            Ok(())
        })
        .on_iteration_end(move |handle| {
            if !handle.is_running() {
                run_started.set(None);
                return Ok(());
            }
            if let Some(limit) = run_limit
                && let Some(since) = run_started.get()
                && clock.now().saturating_sub(since) >= limit
            {
                phase_info!(
                    handle.current_phase(),
                    "Run limit of {:.2}s reached",
                    limit.as_secs_f64()
                );
                handle.stop();
                run_started.set(None);
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crash::CapturingSink;
    use crate::game_loop::Phase;

    fn quick_config(run_seconds: Option<f64>) -> Config {
        let mut config = Config::default();
        config.debug.run_seconds = run_seconds;
        config.game_loop.max_updates_per_second = 500;
        config
    }

    #[test]
    fn test_new_rejects_zero_rate() {
        let mut config = Config::default();
        config.game_loop.target_updates_per_second = 0;
        let result = App::new(&config, Arc::new(ProcessCrashHandler::new()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_launch_runs_until_limit() {
        let mut app = App::new(
            &quick_config(Some(0.05)),
            Arc::new(ProcessCrashHandler::new()),
        )
        .unwrap();
        assert_eq!(app.game_loop().current_phase(), Phase::Stopped);

        app.launch(&["--demo".to_string()]).unwrap();

        assert!(app.game_loop().iteration_count() > 0);
        assert_eq!(app.game_loop().current_phase(), Phase::Waiting);
        assert!(!app.window().is_visible());
        assert!(app.window().title().ends_with(&app.version().to_string()));
    }

    #[test]
    fn test_run_limit_measured_from_loop_start() {
        let clock = ManualClock::new();
        let debug = DebugConfig {
            show_fps: false,
            run_seconds: Some(1.0),
            ..DebugConfig::default()
        };
        let mut game_loop = GameLoop::with_clock(
            LoopConfig::new(60, 320).unwrap(),
            engine_callbacks(&debug, clock.clone()),
            clock.clone(),
            Arc::new(CapturingSink::new()),
        );

        // Time spent between construction and start does not count.
        clock.advance(Duration::from_secs(10));
        game_loop.start().unwrap();
        assert_eq!(game_loop.iteration_count(), 320);
        assert_eq!(clock.now(), Duration::from_secs(11));

        // A restart gets a fresh limit.
        game_loop.start().unwrap();
        assert_eq!(game_loop.iteration_count(), 640);
        assert_eq!(clock.now(), Duration::from_secs(12));
    }

    #[test]
    fn test_launch_after_delay_still_runs_full_limit() {
        let mut app = App::new(
            &quick_config(Some(0.05)),
            Arc::new(ProcessCrashHandler::new()),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let started = std::time::Instant::now();
        app.launch(&[]).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(app.game_loop().iteration_count() > 1);
    }

    #[test]
    fn test_session_fatal_error_stops_loop_from_another_thread() {
        let crash = Arc::new(ProcessCrashHandler::new());
        let mut app = App::new(&quick_config(None), crash.clone()).unwrap();
        let handle = app.loop_handle();

        let reporter = std::thread::spawn(move || {
            while !handle.is_running() {
                std::thread::sleep(Duration::from_millis(1));
            }
            std::thread::sleep(Duration::from_millis(20));
            let err = std::io::Error::other("lost connection to save server");
            crash.handle(&CrashReport::from_error(&err), CrashMode::RequestStop);
        });

        app.launch(&[]).unwrap();
        reporter.join().unwrap();
        assert!(!app.loop_handle().is_running());
    }

    #[test]
    fn test_on_fatal_error_before_launch_is_harmless() {
        let app = App::new(&quick_config(None), Arc::new(ProcessCrashHandler::new())).unwrap();
        app.on_fatal_error(&std::io::Error::other("nothing running yet"));
        assert!(!app.loop_handle().is_running());
    }
}
