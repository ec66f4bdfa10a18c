//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use inkling_core::SessionConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "en-US";
const MAX_DOWNLOAD_LATENCY_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub default_model: String,
    /// Catalog accepted by the in-memory store. Empty means the built-in one.
    pub supported_models: Vec<String>,
    /// Models treated as already on device at startup.
    pub preinstalled_models: Vec<String>,
    /// Simulated time per transfer/deletion.
    pub download_latency_ms: u64,
    pub download_default_on_start: bool,
    pub event_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.into(),
            supported_models: Vec::new(),
            preinstalled_models: Vec::new(),
            download_latency_ms: 250,
            download_default_on_start: true,
            event_capacity: 64,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let default_model = self.default_model.trim();
        self.default_model = if default_model.is_empty() {
            DEFAULT_MODEL.into()
        } else {
            default_model.into()
        };
        self.supported_models = normalize_tags(&self.supported_models);
        self.preinstalled_models = normalize_tags(&self.preinstalled_models);
        self.download_latency_ms = self.download_latency_ms.min(MAX_DOWNLOAD_LATENCY_MS);
        self.event_capacity = self.event_capacity.clamp(1, 4096);
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_model: self.default_model.clone(),
            event_capacity: self.event_capacity,
            download_default_on_start: self.download_default_on_start,
        }
    }
}

fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for tag in raw {
        let normalized = tag.trim();
        if normalized.is_empty() {
            continue;
        }
        if out.iter().any(|t: &String| t.eq_ignore_ascii_case(normalized)) {
            continue;
        }
        out.push(normalized.to_string());
    }
    out
}

/// `INKLING_SETTINGS` if set, else the platform data directory.
pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("INKLING_SETTINGS") {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Inkling")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("inkling")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn normalize_cleans_tags_and_clamps() {
        let mut settings = AppSettings {
            default_model: "  ".into(),
            supported_models: vec!["en-US".into(), " EN-us ".into(), "".into(), "ja".into()],
            download_latency_ms: 10_000_000,
            event_capacity: 0,
            ..AppSettings::default()
        };
        settings.normalize();

        assert_eq!(settings.default_model, "en-US");
        assert_eq!(settings.supported_models, vec!["en-US", "ja"]);
        assert_eq!(settings.download_latency_ms, MAX_DOWNLOAD_LATENCY_MS);
        assert_eq!(settings.event_capacity, 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"defaultModel":"fr-FR"}"#).expect("parse settings");
        assert_eq!(settings.default_model, "fr-FR");
        assert_eq!(settings.download_latency_ms, 250);
        assert!(settings.download_default_on_start);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!(
            "inkling_settings_{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        ));
        let path = dir.join("settings.json");
        let settings = AppSettings {
            preinstalled_models: vec!["de-DE".into()],
            ..AppSettings::default()
        };

        save_settings(&path, &settings).expect("save settings");
        let loaded = load_settings(&path);
        assert_eq!(loaded.preinstalled_models, vec!["de-DE"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let loaded = load_settings(Path::new("/nonexistent/inkling/settings.json"));
        assert_eq!(loaded.default_model, DEFAULT_MODEL);
    }
}
