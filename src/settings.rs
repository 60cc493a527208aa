use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dates::DateOrder;
use crate::dedup::DedupKeyKind;
use crate::error::{HisaabError, Result};

pub const DB_FILE: &str = "hisaab.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub date_order: DateOrder,
    #[serde(default)]
    pub dedup_key: DedupKeyKind,
    #[serde(default)]
    pub default_account: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            date_order: DateOrder::default(),
            dedup_key: DedupKeyKind::default(),
            default_account: None,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hisaab")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("hisaab")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| HisaabError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            date_order: DateOrder::MonthFirst,
            dedup_key: DedupKeyKind::Party,
            default_account: Some("0012345678".to_string()),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.date_order, DateOrder::MonthFirst);
        assert_eq!(loaded.dedup_key, DedupKeyKind::Party);
        assert_eq!(loaded.default_account.as_deref(), Some("0012345678"));
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.date_order, DateOrder::DayFirst);
        assert_eq!(s.dedup_key, DedupKeyKind::Composite);
        assert!(s.default_account.is_none());
        assert!(s.data_dir.ends_with("hisaab"));
        assert!(s.db_path().ends_with(DB_FILE));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "dedup_key": "party"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.date_order, DateOrder::DayFirst);
        assert_eq!(s.dedup_key, DedupKeyKind::Party);
    }

    #[test]
    fn test_wire_names_are_snake_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"day_first\""), "{json}");
        assert!(json.contains("\"composite\""), "{json}");
    }
}
