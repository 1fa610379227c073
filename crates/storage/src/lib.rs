use directories::ProjectDirs;
use portfolio_model::Settings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;

pub const ENV_VIEWER_SCALE: &str = "FOLIO_VIEWER_SCALE";
pub const ENV_PREVIEW_SCALE: &str = "FOLIO_PREVIEW_SCALE";
pub const ENV_COUNTER_SPEED: &str = "FOLIO_COUNTER_SPEED";
pub const ENV_CONTENT_ROOT: &str = "FOLIO_CONTENT_ROOT";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported settings version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Folio", "Folio").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }

        let settings = read_settings_file(&path)?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }
}

/// Reads a settings envelope from an explicit file.
pub fn read_settings_file(path: &Path) -> Result<Settings, StorageError> {
    let bytes = fs::read(path)?;
    let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;

    if envelope.version > SETTINGS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(envelope.version));
    }

    check_scales(&envelope.settings)?;
    Ok(envelope.settings)
}

fn check_scales(settings: &Settings) -> Result<(), StorageError> {
    for (name, scale) in
        [("viewer_scale", settings.viewer_scale), ("preview_scale", settings.preview_scale)]
    {
        if !viewer_core::is_usable_scale(scale) {
            return Err(StorageError::InvalidValue { name, value: scale.to_string() });
        }
    }

    Ok(())
}

/// Applies `FOLIO_*` overrides from the process environment.
pub fn apply_env_overrides(settings: Settings) -> Result<Settings, StorageError> {
    apply_overrides(settings, |name| std::env::var(name).ok())
}

/// Applies overrides looked up by variable name.
pub fn apply_overrides<F>(mut settings: Settings, lookup: F) -> Result<Settings, StorageError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_VIEWER_SCALE) {
        settings.viewer_scale = parse_scale(ENV_VIEWER_SCALE, value)?;
    }

    if let Some(value) = lookup(ENV_PREVIEW_SCALE) {
        settings.preview_scale = parse_scale(ENV_PREVIEW_SCALE, value)?;
    }

    if let Some(value) = lookup(ENV_COUNTER_SPEED) {
        settings.counter_speed = match value.trim().parse::<u32>() {
            Ok(speed) if speed > 0 => speed,
            _ => return Err(StorageError::InvalidValue { name: ENV_COUNTER_SPEED, value }),
        };
    }

    if let Some(value) = lookup(ENV_CONTENT_ROOT) {
        settings.content_root = PathBuf::from(value);
    }

    Ok(settings)
}

fn parse_scale(name: &'static str, value: String) -> Result<f32, StorageError> {
    match value.trim().parse::<f32>() {
        Ok(scale) if viewer_core::is_usable_scale(scale) => Ok(scale),
        _ => Err(StorageError::InvalidValue { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn settings_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let settings = Settings { viewer_scale: 2.0, counter_speed: 50, ..Settings::default() };

        store.save_settings(&settings).expect("save should succeed");
        let loaded = store.load_settings().expect("load should succeed");

        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_settings().expect("load should succeed");
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{ "version": 99, "settings": {} }"#).expect("write should succeed");

        let err = read_settings_file(&path).expect_err("future version should fail");
        assert!(matches!(err, StorageError::UnsupportedVersion(99)));
    }

    #[test]
    fn overrides_replace_values() {
        let settings = apply_overrides(
            Settings::default(),
            lookup(&[
                (ENV_VIEWER_SCALE, "2.5"),
                (ENV_COUNTER_SPEED, "100"),
                (ENV_CONTENT_ROOT, "/srv/site"),
            ]),
        )
        .expect("overrides should apply");

        assert_eq!(settings.viewer_scale, 2.5);
        assert_eq!(settings.counter_speed, 100);
        assert_eq!(settings.content_root, PathBuf::from("/srv/site"));
        assert_eq!(settings.preview_scale, Settings::default().preview_scale);
    }

    #[test]
    fn invalid_override_is_an_error() {
        let err = apply_overrides(Settings::default(), lookup(&[(ENV_PREVIEW_SCALE, "-1")]))
            .expect_err("negative scale should fail");

        assert!(matches!(err, StorageError::InvalidValue { name: ENV_PREVIEW_SCALE, .. }));

        let err = apply_overrides(Settings::default(), lookup(&[(ENV_COUNTER_SPEED, "0")]))
            .expect_err("zero speed should fail");

        assert!(matches!(err, StorageError::InvalidValue { name: ENV_COUNTER_SPEED, .. }));
    }

    #[test]
    fn scale_beyond_limit_is_an_error() {
        let err = apply_overrides(Settings::default(), lookup(&[(ENV_VIEWER_SCALE, "1e9")]))
            .expect_err("huge scale should fail");

        assert!(matches!(err, StorageError::InvalidValue { name: ENV_VIEWER_SCALE, .. }));
    }

    #[test]
    fn settings_file_with_unusable_scale_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{ "version": 1, "settings": { "preview_scale": 0.0 } }"#)
            .expect("write should succeed");

        let err = read_settings_file(&path).expect_err("zero scale should fail");
        assert!(matches!(err, StorageError::InvalidValue { name: "preview_scale", .. }));
    }
}
