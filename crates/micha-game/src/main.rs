//! Game entry point for the Micha engine.
//!
//! Loads `config.ron` (creating it on first run), applies CLI overrides,
//! installs logging and the crash handler, then hands the thread to the game
//! loop until it stops.
//!
//! Run with: `cargo run -p micha-game -- --run-seconds 5`

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use micha_app::platform::PlatformDirs;
use micha_app::{App, CrashMode, CrashReport, CrashSink, ProcessCrashHandler, install_panic_hook};
use micha_config::{CliArgs, Config};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(root) => {
            let dirs = PlatformDirs::resolve_with_root(root);
            dirs.create_dirs().map(|()| dirs)
        }
        None => PlatformDirs::resolve_and_create(),
    };
    let dirs = match dirs {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize platform directories: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = match Config::load_or_create(&dirs.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli_overrides(&args);

    micha_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    info!("Config: {}", dirs.config_dir.display());
    info!("Logs:   {}", dirs.log_dir.display());
    info!("Data:   {}", dirs.data_dir.display());
    info!("Cache:  {}", dirs.cache_dir.display());

    let crash = Arc::new(ProcessCrashHandler::new());
    install_panic_hook(crash.clone());
    info!("Set default error handler");

    let mut app = match App::new(&config, crash.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to create Micha: {e}");
            return ExitCode::FAILURE;
        }
    };

    match app.launch(&args.game_args) {
        Ok(()) => {
            info!("Micha closed");
            ExitCode::SUCCESS
        }
        // Errors that escape the loop are process-fatal; this does not return.
        Err(e) => {
            crash.handle(&CrashReport::from_error(&e), CrashMode::Kill);
            ExitCode::FAILURE
        }
    }
}
