use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fixed storage key the settings blob lives under.
pub const SETTINGS_KEY: &str = "03cam_settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Output resolution. Only these two sizes are ever produced.
pub enum Resolution {
    #[serde(rename = "640x480")]
    R640x480,
    #[serde(rename = "320x240")]
    R320x240,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::R640x480, Resolution::R320x240];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::R640x480 => (640, 480),
            Resolution::R320x240 => (320, 240),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resolution::R640x480 => "640x480",
            Resolution::R320x240 => "320x240",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "640x480" | "vga" => Some(Resolution::R640x480),
            "320x240" | "qvga" => Some(Resolution::R320x240),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// User-facing capture settings; one snapshot parameterizes a pipeline run.
pub struct CameraSettings {
    pub resolution: Resolution,
    pub compression_quality: f32,
    pub effect_intensity: f32,
    pub vignette_enabled: bool,
    pub noise_enabled: bool,
    pub default_camera: CameraFacing,
    pub flash_mode: FlashMode,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::R640x480,
            compression_quality: 0.3,
            effect_intensity: 1.0,
            vignette_enabled: true,
            noise_enabled: true,
            default_camera: CameraFacing::Back,
            flash_mode: FlashMode::Auto,
        }
    }
}

impl CameraSettings {
    /// Whether the retro effect stage has anything to do.
    pub fn effects_enabled(&self) -> bool {
        self.noise_enabled || self.vignette_enabled
    }

    /// Pulls numeric fields back into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.compression_quality = if self.compression_quality.is_nan() {
            defaults.compression_quality
        } else {
            self.compression_quality.clamp(0.01, 1.0)
        };
        self.effect_intensity = if self.effect_intensity.is_nan() {
            defaults.effect_intensity
        } else {
            self.effect_intensity.clamp(0.0, 1.0)
        };
        self
    }
}

/// JSON-backed persistence for [`CameraSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the user data directory, if one is available.
    pub fn open_default() -> Option<Self> {
        dirs::data_dir().map(|d| Self::new(d.join("retrocam")))
    }

    pub fn path(&self) -> PathBuf {
        blob_path(&self.dir, SETTINGS_KEY)
    }

    /// Loads settings, falling back to defaults on missing or corrupt data.
    /// Fields absent from the stored blob take their default values.
    pub fn load(&self) -> CameraSettings {
        let path = self.path();
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CameraSettings::default();
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read settings");
                return CameraSettings::default();
            }
        };
        match serde_json::from_str::<CameraSettings>(&json) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to parse settings");
                CameraSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &CameraSettings) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(self.path(), json)?;
        tracing::debug!(path = %self.path().display(), "saved settings");
        Ok(())
    }
}

fn blob_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::testing::temp_dir;

    #[test]
    fn blob_path_uses_storage_key() {
        let p = blob_path(Path::new("/data/retrocam"), SETTINGS_KEY);
        assert_eq!(p, PathBuf::from("/data/retrocam/03cam_settings.json"));
    }

    #[test]
    fn missing_blob_loads_defaults() {
        let store = SettingsStore::new(temp_dir("settings-missing"));
        assert_eq!(store.load(), CameraSettings::default());
    }

    #[test]
    fn corrupt_blob_loads_defaults() {
        let dir = temp_dir("settings-corrupt");
        let store = SettingsStore::new(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), CameraSettings::default());
    }

    #[test]
    fn partial_blob_is_merged_over_defaults() {
        let dir = temp_dir("settings-partial");
        let store = SettingsStore::new(&dir);
        std::fs::write(
            store.path(),
            r#"{"resolution":"320x240","noiseEnabled":false}"#,
        )
        .unwrap();
        let s = store.load();
        assert_eq!(s.resolution, Resolution::R320x240);
        assert!(!s.noise_enabled);
        assert!(s.vignette_enabled);
        assert_eq!(s.compression_quality, 0.3);
        assert_eq!(s.flash_mode, FlashMode::Auto);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let store = SettingsStore::new(temp_dir("settings-save"));
        let settings = CameraSettings {
            resolution: Resolution::R320x240,
            compression_quality: 0.5,
            effect_intensity: 0.25,
            vignette_enabled: false,
            noise_enabled: true,
            default_camera: CameraFacing::Front,
            flash_mode: FlashMode::Off,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let json = serde_json::to_string(&CameraSettings::default()).unwrap();
        assert!(json.contains("\"compressionQuality\":0.3"));
        assert!(json.contains("\"resolution\":\"640x480\""));
        assert!(json.contains("\"defaultCamera\":\"back\""));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let s = CameraSettings {
            compression_quality: 4.0,
            effect_intensity: -1.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(s.compression_quality, 1.0);
        assert_eq!(s.effect_intensity, 0.0);
    }

    #[test]
    fn resolution_parse_accepts_labels() {
        for r in Resolution::ALL {
            assert_eq!(Resolution::parse(r.label()), Some(r));
        }
        assert_eq!(Resolution::parse("1024x768"), None);
    }
}
