//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Micha command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "micha", about = "Micha game engine", version)]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Window title.
    #[arg(long)]
    pub title: Option<String>,

    /// Target updates per second.
    #[arg(long)]
    pub ups: Option<u32>,

    /// Maximum updates per second.
    #[arg(long)]
    pub update_cap: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log the measured FPS once per second.
    #[arg(long)]
    pub show_fps: Option<bool>,

    /// Stop after this many seconds.
    #[arg(long)]
    pub run_seconds: Option<f64>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Extra arguments handed to the game on launch.
    #[arg(last = true)]
    pub game_args: Vec<String>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(ref title) = args.title {
            self.window.title = title.clone();
        }
        if let Some(ups) = args.ups {
            self.game_loop.target_updates_per_second = ups;
        }
        if let Some(cap) = args.update_cap {
            self.game_loop.max_updates_per_second = cap;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(show) = args.show_fps {
            self.debug.show_fps = show;
        }
        if let Some(secs) = args.run_seconds {
            self.debug.run_seconds = Some(secs);
        }
    }
}
