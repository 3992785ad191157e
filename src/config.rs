use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::WorkDir;

pub const GALLERY_DIR_ENV: &str = "RETROCAM_GALLERY_DIR";
const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Serialize, Deserialize)]
/// Persisted application settings for retrocam.
pub struct AppConfig {
    pub gallery_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub capture_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("retrocam").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
            Self::default()
        })
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    /// Gallery location: env override, then config, then `~/Pictures/retrocam`.
    pub fn gallery_dir(&self) -> PathBuf {
        resolve_gallery_dir(std::env::var_os(GALLERY_DIR_ENV).map(PathBuf::from), self)
    }

    pub fn work_dir(&self) -> WorkDir {
        self.work_dir
            .clone()
            .map(WorkDir::new)
            .unwrap_or_else(WorkDir::system_default)
    }

    /// Where finished photos land before they are saved to the gallery.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("retrocam")
                .join("captures")
        })
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(
            self.capture_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_CAPTURE_TIMEOUT_SECS),
        )
    }
}

fn resolve_gallery_dir(env_override: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    if let Some(dir) = env_override.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    if let Some(dir) = config.gallery_dir.clone() {
        return dir;
    }
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retrocam")
}
