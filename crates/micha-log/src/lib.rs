//! Structured logging for the Micha engine.
//!
//! Wraps the `tracing` ecosystem: console output with uptime timestamps and
//! thread names, plus JSON file logging in debug builds for post-mortem
//! analysis. The log level comes from `RUST_LOG`, then the config file.
//!
//! The `phase_*!` macros prefix a message with a caller-supplied label, which
//! is how the game loop tags every line with the phase it was in.

use micha_config::Config;
use std::fmt;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

#[doc(hidden)]
pub use tracing as __tracing;

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "micha.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether file logging is enabled
/// * `config` - optional configuration whose `debug.log_level` is used as the
///   filter when `RUST_LOG` is unset
///
/// Calling this twice in one process is harmless; the second call is ignored.
///
/// ```no_run
/// use micha_config::Config;
/// use micha_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_for(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = tfmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(tfmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = tfmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(tfmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

/// Filter string for the given config, falling back to [`DEFAULT_FILTER`].
pub fn filter_for(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => {
            config.debug.log_level.clone()
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Render `message` behind a bracketed label: `[label] message`.
pub fn prefixed(label: impl fmt::Display, message: fmt::Arguments<'_>) -> String {
    format!("[{label}] {message}")
}

/// Log at info level with a bracketed label in front of the message.
///
/// ```
/// micha_log::phase_info!("Updating", "delta {:.2}", 1.0);
/// ```
#[macro_export]
macro_rules! phase_info {
    ($label:expr, $($arg:tt)+) => {
        $crate::__tracing::info!("{}", $crate::prefixed(&$label, format_args!($($arg)+)))
    };
}

/// Log at debug level with a bracketed label in front of the message.
#[macro_export]
macro_rules! phase_debug {
    ($label:expr, $($arg:tt)+) => {
        $crate::__tracing::debug!("{}", $crate::prefixed(&$label, format_args!($($arg)+)))
    };
}

/// Log at error level with a bracketed label in front of the message.
#[macro_export]
macro_rules! phase_error {
    ($label:expr, $($arg:tt)+) => {
        $crate::__tracing::error!("{}", $crate::prefixed(&$label, format_args!($($arg)+)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_to_info() {
        assert_eq!(filter_for(None), "info");
    }

    #[test]
    fn test_filter_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "debug,micha_app=trace".to_string();
        assert_eq!(filter_for(Some(&config)), "debug,micha_app=trace");
    }

    #[test]
    fn test_blank_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_for(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_parsing() {
        for filter_str in ["info", "debug,micha_app=trace", "warn,micha_config=debug"] {
            assert!(
                EnvFilter::try_from(filter_str).is_ok(),
                "Failed to parse filter: {filter_str}"
            );
        }
    }

    #[test]
    fn test_prefixed_message() {
        assert_eq!(
            prefixed("Rendering", format_args!("FPS: {}", 320)),
            "[Rendering] FPS: 320"
        );
    }

    #[test]
    fn test_macros_expand_without_subscriber() {
        phase_info!("Waiting", "value {}", 1);
        phase_debug!(String::from("Stopped"), "plain");
        phase_error!("Updating", "failed: {}", "boom");
    }

    #[test]
    fn test_init_logging_creates_log_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs");
        init_logging(Some(&log_dir), true, None);
        assert!(log_dir.join(LOG_FILE_NAME).exists());
        // A second init must not panic.
        init_logging(None, false, None);
    }
}
