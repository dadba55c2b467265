//! Per-user directories for config, data, cache and logs.
//!
//! Resolves the platform-appropriate locations (XDG on Linux, Known Folders on
//! Windows, Library on macOS) through the `dirs` crate.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur during platform operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    /// Directory creation failed.
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// OS-specific directory paths for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// `config.ron` lives here.
    pub config_dir: PathBuf,
    /// Persistent data such as saves.
    pub data_dir: PathBuf,
    /// Disposable files that can be regenerated.
    pub cache_dir: PathBuf,
    /// Log files.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "micha";

impl PlatformDirs {
    /// Resolve directories without creating them on disk.
    pub fn resolve() -> Result<Self, PlatformError> {
        let app_config = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);

        let data_dir = dirs::data_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| app_config.join("data"));

        let cache_dir = dirs::cache_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| app_config.join("cache"));

        Ok(Self {
            config_dir: app_config.clone(),
            data_dir,
            cache_dir,
            log_dir: app_config.join("logs"),
        })
    }

    /// Resolve directories and create them on disk.
    pub fn resolve_and_create() -> Result<Self, PlatformError> {
        let dirs = Self::resolve()?;
        dirs.create_dirs()?;
        Ok(dirs)
    }

    /// Resolve directories rooted under a custom base path, e.g. one passed
    /// with `--config` or a temp dir in tests.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            log_dir: root.join("logs"),
        }
    }

    /// Create every directory in `self`.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.log_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_root_layout() {
        let root = Path::new("/tmp/micha-root");
        let dirs = PlatformDirs::resolve_with_root(root);
        assert_eq!(dirs.config_dir, root);
        assert_eq!(dirs.log_dir, root.join("logs"));
        assert_eq!(dirs.data_dir, root.join("data"));
        assert_eq!(dirs.cache_dir, root.join("cache"));
    }

    #[test]
    fn test_directory_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(&tmp.path().join("micha"));
        dirs.create_dirs().unwrap();

        assert!(dirs.config_dir.is_dir());
        assert!(dirs.data_dir.is_dir());
        assert!(dirs.cache_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
    }

    #[test]
    fn test_resolved_paths_are_absolute() {
        // Headless CI images may not expose a config dir at all.
        let Ok(dirs) = PlatformDirs::resolve() else {
            return;
        };
        assert!(dirs.config_dir.is_absolute());
        assert!(dirs.data_dir.is_absolute());
        assert!(dirs.cache_dir.is_absolute());
        assert!(dirs.log_dir.is_absolute());
        assert!(dirs.config_dir.ends_with(APP_NAME));
    }
}
