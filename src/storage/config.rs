//! Configuration handling for eview
//!
//! Configuration is read from `~/.config/eview/config.toml` (global) and
//! `.eview.toml` (project, found by walking up from the current directory).
//! Project values override global ones field by field; viewers from both
//! files are merged by key.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{builtin_presets, merge_presets, ViewerPreset};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".eview.toml";

/// Default debounce delay before re-running a preview
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// One configuration file as written on disk. Every field is optional so
/// that layering can tell "unset" from "default".
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    /// Delay in milliseconds between the last edit and the next run
    pub debounce_ms: Option<u64>,

    /// Editor command for Ctrl+E (falls back to $EDITOR, then vi)
    pub editor: Option<String>,

    /// Command used to open the graphic (Ctrl+O)
    pub opener: Option<String>,

    /// Devtools log location
    pub devtools_log: Option<PathBuf>,

    /// Extra or replacement viewers
    pub viewers: Vec<ViewerPreset>,
}

impl ConfigFile {
    /// Reads and parses a config file
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Layers `other` over `self`
    fn overlay(mut self, other: ConfigFile) -> Self {
        self.debounce_ms = other.debounce_ms.or(self.debounce_ms);
        self.editor = other.editor.or(self.editor);
        self.opener = other.opener.or(self.opener);
        self.devtools_log = other.devtools_log.or(self.devtools_log);
        self.viewers = merge_presets(self.viewers, &other.viewers);
        self
    }
}

/// Effective configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub debounce_ms: u64,
    pub editor: Option<String>,
    pub opener: Option<String>,
    pub devtools_log: Option<PathBuf>,

    /// Built-in presets merged with configured ones, in tab order
    pub viewers: Vec<ViewerPreset>,

    /// Files that contributed to this configuration
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            editor: None,
            opener: None,
            devtools_log: None,
            viewers: builtin_presets(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations. `explicit` replaces the
    /// project file lookup.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(global) = Self::global_config_path().filter(|p| p.is_file()) {
            layers.push(global);
        }

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                layers.push(path.to_path_buf());
            }
            None => {
                if let Some(project) = Self::find_project_config() {
                    layers.push(project);
                }
            }
        }

        Self::from_files(&layers)
    }

    /// Builds the configuration from files in increasing priority
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = ConfigFile::default();
        for path in paths {
            merged = merged.overlay(ConfigFile::read(path)?);
        }

        let mut config = Self::resolve(merged)?;
        config.sources = paths.to_vec();
        Ok(config)
    }

    /// Applies defaults and validates a merged file
    pub fn resolve(file: ConfigFile) -> Result<Self> {
        let debounce_ms = file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            return Err(ConfigError::Invalid("debounce_ms must be greater than 0".to_string()).into());
        }

        for viewer in &file.viewers {
            viewer
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        Ok(Self {
            debounce_ms,
            editor: file.editor.filter(|e| !e.trim().is_empty()),
            opener: file.opener.filter(|o| !o.trim().is_empty()),
            devtools_log: file.devtools_log,
            viewers: merge_presets(builtin_presets(), &file.viewers),
            sources: Vec::new(),
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Editor command: config, then $VISUAL, then $EDITOR, then vi
    pub fn editor_command(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok().filter(|v| !v.is_empty()))
            .or_else(|| std::env::var("EDITOR").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "vi".to_string())
    }

    /// Command that opens a graphic in an external viewer
    pub fn opener_command(&self) -> String {
        self.opener.clone().unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "open".to_string()
            } else {
                "xdg-open".to_string()
            }
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "eview", "eview").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Finds `.eview.toml` in the current directory or a parent
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let candidate = current.join(PROJECT_CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
