//! Devtools log
//!
//! The interactive app owns stdout, so diagnostics go to a log file that
//! `eview console` tails. Logging is off unless `EVIEW_DEVTOOLS` is set or
//! `--verbose` is passed.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Environment variable that enables the devtools log
pub const DEVTOOLS_ENV: &str = "EVIEW_DEVTOOLS";

/// Environment variable overriding the log location
pub const DEVTOOLS_LOG_ENV: &str = "EVIEW_DEVTOOLS_LOG";

/// Size at which the devtools log moves to `.1`
const MAX_LOG_SIZE: u64 = 1024 * 1024;

/// Live log plus rotated copies
const LOG_ROTATION_COUNT: usize = 7;

#[derive(Debug, Clone)]
pub struct DevLog {
    path: PathBuf,
    enabled: bool,
}

impl DevLog {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// A log that never writes
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    /// Returns true if `EVIEW_DEVTOOLS` holds a truthy value
    pub fn env_enabled() -> bool {
        std::env::var(DEVTOOLS_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false)
    }

    /// Resolves the log path: `EVIEW_DEVTOOLS_LOG`, then `configured`, then
    /// the platform cache directory.
    pub fn resolve_path(configured: Option<&Path>) -> PathBuf {
        if let Ok(p) = std::env::var(DEVTOOLS_LOG_ENV) {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        if let Some(p) = configured {
            return p.to_path_buf();
        }
        ProjectDirs::from("dev", "eview", "eview")
            .map(|dirs| dirs.cache_dir().join("devtools.log"))
            .unwrap_or_else(|| std::env::temp_dir().join("eview-devtools.log"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a timestamped line. Failures are swallowed so a broken log
    /// never takes the UI down.
    pub fn log(&self, context: &str, message: &str) {
        if self.enabled {
            let _ = self.write_line(context, message);
        }
    }

    fn write_line(&self, context: &str, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        rotate_logs_if_needed(&self.path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open devtools log")?;

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        for line in message.lines() {
            writeln!(file, "[{}] [{}] {}", timestamp, context, line)?;
        }

        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "devtools"
    )
}

/// `devtools.log` -> `devtools.log.3`; the whole file name is kept so
/// logs without a `.log` extension rotate beside themselves.
fn rotated_path(log_path: &Path, index: usize) -> PathBuf {
    let mut name = log_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(format!(".{}", index));
    log_path.with_file_name(name)
}

/// Moves an oversized log to `.1`, shifting older ones up. At most
/// `LOG_ROTATION_COUNT` files exist afterwards, the live one included.
fn rotate_logs_if_needed(log_path: &Path) -> Result<()> {
    let len = match fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).context("Failed to stat devtools log"),
    };
    if len < MAX_LOG_SIZE {
        return Ok(());
    }

    let oldest = rotated_path(log_path, LOG_ROTATION_COUNT - 1);
    match fs::remove_file(&oldest) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            return Err(e).with_context(|| format!("Failed to remove {}", oldest.display()));
        }
        _ => {}
    }

    for index in (1..LOG_ROTATION_COUNT - 1).rev() {
        let from = rotated_path(log_path, index);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, index + 1))
                .with_context(|| format!("Failed to rotate {}", from.display()))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1)).context("Failed to rotate devtools log")
}
