//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name used inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Update and frame pacing.
    pub game_loop: LoopSettings,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Window title. The engine version is appended at launch.
    pub title: String,
}

/// Raw game loop rates as written in `config.ron`.
///
/// These are only numbers; the scheduler turns them into intervals and rejects
/// zero values when it is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoopSettings {
    /// Desired update+render iterations per second.
    pub target_updates_per_second: u32,
    /// Hard ceiling on iterations per second.
    pub max_updates_per_second: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log the measured FPS once per second.
    pub show_fps: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Stop the loop cooperatively after this many seconds. `None` runs
    /// until something else requests a stop.
    pub run_seconds: Option<f64>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Micha".to_string(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target_updates_per_second: 60,
            max_updates_per_second: 320,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_fps: true,
            log_level: "info".to_string(),
            run_seconds: None,
        }
    }
}

// --- Validation ---

impl Config {
    /// Reject settings the engine cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_loop.target_updates_per_second == 0 {
            return Err(ConfigError::InvalidValue {
                field: "game_loop.target_updates_per_second",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.game_loop.max_updates_per_second == 0 {
            return Err(ConfigError::InvalidValue {
                field: "game_loop.max_updates_per_second",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(secs) = self.debug.run_seconds
            && !(secs.is_finite() && secs > 0.0)
        {
            return Err(ConfigError::InvalidValue {
                field: "debug.run_seconds",
                reason: format!("expected a positive number of seconds, got {secs}"),
            });
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let config = Config::default();
        assert_eq!(config.game_loop.target_updates_per_second, 60);
        assert_eq!(config.game_loop.max_updates_per_second, 320);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("width: 1280"));
        assert!(ron_str.contains("target_updates_per_second: 60"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(window: (width: 800))").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.game_loop, LoopSettings::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_target_rate_rejected() {
        let mut config = Config::default();
        config.game_loop.target_updates_per_second = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "game_loop.target_updates_per_second",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_update_cap_rejected() {
        let mut config = Config::default();
        config.game_loop.max_updates_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_run_seconds_rejected() {
        let mut config = Config::default();
        config.debug.run_seconds = Some(0.0);
        assert!(config.validate().is_err());
        config.debug.run_seconds = Some(f64::NAN);
        assert!(config.validate().is_err());
        config.debug.run_seconds = Some(2.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.window.title = "Sandbox".to_string();
        config.game_loop.max_updates_per_second = 144;
        config.debug.run_seconds = Some(3.0);

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.game_loop.target_updates_per_second = 30;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap();
        assert_eq!(
            reloaded.map(|c| c.game_loop.target_updates_per_second),
            Some(30)
        );
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
