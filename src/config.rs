use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const SCHEMA_VERSION: &str = "1.0";

/// Per-project settings stored as `config.json` in the project directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub source_language: String,
    pub target_language: String,
    pub log_dir: PathBuf,
    pub max_session_logs: usize,
    pub gzip_export: bool,
    pub schema_version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            source_language: "grc".to_string(),
            target_language: "en".to_string(),
            log_dir: PathBuf::from("logs"),
            max_session_logs: 10,
            gzip_export: false,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn new(source_language: &str, target_language: &str) -> Self {
        ProjectConfig {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            ..Default::default()
        }
    }

    /// Reads `config.json`, falling back to defaults when it does not exist
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(ProjectConfig::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))
    }

    pub fn save(&self, project_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(project_dir)
            .with_context(|| format!("Failed to create project directory: {:?}", project_dir))?;
        let path = project_dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config: {:?}", path))?;
        Ok(path)
    }

    /// Log directory, relative paths taken from the project directory
    pub fn resolved_log_dir(&self, project_dir: &Path) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            project_dir.join(&self.log_dir)
        }
    }
}
