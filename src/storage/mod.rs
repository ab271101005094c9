//! # Storage Layer
//!
//! Files eview reads and writes.
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Global config | TOML | `<config dir>/eview/config.toml` |
//! | Project config | TOML | `.eview.toml` in the working directory or a parent |
//! | Scratch files | cmd, script, graphic | `$TMPDIR/eview-*/` per tab |
//! | Devtools log | timestamped text, rotated | `<cache dir>/eview/devtools.log` |
//!
//! ## Key Types
//!
//! - [`Config`] - Layered global and project configuration
//! - [`Workspace`] - One tab's scratch folder and file paths
//! - [`DevLog`] - Diagnostic log read by `eview console`

mod config;
mod devlog;
mod workspace;

pub use config::{Config, ConfigError, ConfigFile, DEFAULT_DEBOUNCE_MS, PROJECT_CONFIG_FILE};
pub use devlog::{DevLog, DEVTOOLS_ENV, DEVTOOLS_LOG_ENV};
pub use workspace::{Workspace, WorkspaceError};
