//! User settings snapshot persistence.
//!
//! The snapshot carries the last UI selections, the push endpoint, and the
//! full watch list, so a restart can restore everything the user had set
//! up. Loading is best-effort: a missing file yields defaults, and the host
//! decides when to save (after a successful add, and on clean).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::watch_list::WatchItem;

/// Persisted engine/UI state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub selected_area: String,
    #[serde(default)]
    pub selected_store: String,
    #[serde(default)]
    pub selected_product: String,
    #[serde(default)]
    pub notify_endpoint: String,
    #[serde(default)]
    pub listen_items: Vec<WatchItem>,
    /// RFC 3339 timestamp of the last save; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl Settings {
    /// Location of the settings snapshot in the user config directory.
    pub fn settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pickup-watch")
            .join("settings.yaml")
    }

    /// Load the snapshot from the default location. A missing file is not
    /// an error; defaults are returned.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings snapshot at {:?}; using defaults", path);
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {:?}", path))?;
        let settings: Settings = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("failed to parse settings at {:?}", path))?;
        Ok(settings)
    }

    /// Save the snapshot to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut snapshot = self.clone();
        snapshot.saved_at = Some(chrono::Utc::now().to_rfc3339());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create settings directory {:?}", parent))?;
        }
        let yaml = serde_yaml_ng::to_string(&snapshot)
            .context("failed to serialize settings snapshot")?;
        fs::write(path, yaml)
            .with_context(|| format!("failed to write settings to {:?}", path))?;
        log::info!("Saved settings snapshot to {:?}", path);
        Ok(())
    }

    /// Remove the snapshot file (watch list was cleaned). Idempotent.
    pub fn clear() -> Result<()> {
        Self::clear_at(&Self::settings_path())
    }

    pub fn clear_at(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove settings at {:?}", path))?;
        }
        Ok(())
    }
}
