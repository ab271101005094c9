//! Per-tab scratch workspace
//!
//! Each viewer tab owns a temporary directory holding its command file,
//! script file and graphic file. Any of the three paths can be pointed
//! elsewhere; the directory itself is removed when the workspace drops.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use thiserror::Error;

use crate::domain::ViewerPreset;
use crate::runner::RunRequest;

const CMD_FILE: &str = "run";
const SCRIPT_FILE: &str = "in.txt";
const GRAPHIC_FILE: &str = "out.png";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("File path must not be empty")]
    EmptyPath,

    #[error("Not a file: {0}")]
    NotAFile(PathBuf),
}

pub struct Workspace {
    scratch: TempDir,
    cmd_file: PathBuf,
    script_file: PathBuf,
    graphic_file: PathBuf,
    cmd_text: String,
    script_text: String,
}

impl Workspace {
    /// Creates a fresh scratch directory seeded with the preset's texts
    pub fn new(preset: &ViewerPreset) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("eview-")
            .tempdir()
            .context("Failed to create scratch directory")?;

        let dir = scratch.path().to_path_buf();

        Ok(Self {
            scratch,
            cmd_file: dir.join(CMD_FILE),
            script_file: dir.join(SCRIPT_FILE),
            graphic_file: dir.join(GRAPHIC_FILE),
            cmd_text: preset.command.clone(),
            script_text: preset.script.clone(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn cmd_file(&self) -> &Path {
        &self.cmd_file
    }

    pub fn script_file(&self) -> &Path {
        &self.script_file
    }

    pub fn graphic_file(&self) -> &Path {
        &self.graphic_file
    }

    pub fn cmd_text(&self) -> &str {
        &self.cmd_text
    }

    pub fn script_text(&self) -> &str {
        &self.script_text
    }

    pub fn set_cmd_text(&mut self, text: impl Into<String>) {
        self.cmd_text = text.into();
    }

    pub fn set_script_text(&mut self, text: impl Into<String>) {
        self.script_text = text.into();
    }

    /// Points the script at `path`.
    ///
    /// A missing file is created with the current script; an existing file
    /// replaces the current script with its content.
    pub fn set_input_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = checked_path(path.as_ref())?;
        self.script_text = adopt_file(&path, &self.script_text)?;
        self.script_file = path;
        Ok(())
    }

    /// Points the command at `path`, with the same rules as
    /// [`set_input_file`](Self::set_input_file).
    pub fn set_cmd_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = checked_path(path.as_ref())?;
        self.cmd_text = adopt_file(&path, &self.cmd_text)?;
        self.cmd_file = path;
        Ok(())
    }

    /// Changes where the command is asked to write its graphic
    pub fn set_output_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.graphic_file = checked_path(path.as_ref())?;
        Ok(())
    }

    /// Writes both texts to disk, makes the command executable and returns
    /// the request the runner needs.
    pub fn prepare_run(&self) -> Result<RunRequest> {
        write_if_changed(&self.cmd_file, &self.cmd_text)
            .with_context(|| format!("Failed to write command file: {}", self.cmd_file.display()))?;
        make_executable(&self.cmd_file)?;

        write_if_changed(&self.script_file, &self.script_text).with_context(|| {
            format!("Failed to write script file: {}", self.script_file.display())
        })?;

        Ok(RunRequest {
            cmd_file: self.cmd_file.clone(),
            script_file: self.script_file.clone(),
            graphic_file: self.graphic_file.clone(),
        })
    }
}

fn checked_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(WorkspaceError::EmptyPath.into());
    }
    if path.is_dir() {
        return Err(WorkspaceError::NotAFile(path.to_path_buf()).into());
    }
    Ok(path.to_path_buf())
}

/// Seeds a missing file with `current`, or returns the existing content
fn adopt_file(path: &Path, current: &str) -> Result<String> {
    if path.exists() {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, current).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(current.to_string())
    }
}

/// Skips the write when the file already holds `text`, so watchers on
/// user files are not woken by our own runs.
fn write_if_changed(path: &Path, text: &str) -> std::io::Result<()> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == text => Ok(()),
        _ => fs::write(path, text),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtin_presets;

    fn workspace() -> Workspace {
        Workspace::new(&builtin_presets()[0]).unwrap()
    }

    #[test]
    fn defaults_live_in_scratch_dir() {
        let ws = workspace();
        assert!(ws.scratch_dir().is_dir());
        assert_eq!(ws.cmd_file(), ws.scratch_dir().join("run"));
        assert_eq!(ws.script_file(), ws.scratch_dir().join("in.txt"));
        assert_eq!(ws.graphic_file(), ws.scratch_dir().join("out.png"));
        assert!(ws.cmd_text().contains("gnuplot"));
    }

    #[test]
    fn scratch_dir_removed_on_drop() {
        let ws = workspace();
        let dir = ws.scratch_dir().to_path_buf();
        drop(ws);
        assert!(!dir.exists());
    }

    #[test]
    fn set_input_file_seeds_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.gp");
        let mut ws = workspace();
        ws.set_script_text("plot cos(x)");

        ws.set_input_file(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "plot cos(x)");
        assert_eq!(ws.script_file(), path);
        assert_eq!(ws.script_text(), "plot cos(x)");
    }

    #[test]
    fn set_input_file_adopts_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.gp");
        fs::write(&path, "plot tan(x)").unwrap();
        let mut ws = workspace();

        ws.set_input_file(&path).unwrap();

        assert_eq!(ws.script_text(), "plot tan(x)");
    }

    #[test]
    fn set_cmd_file_adopts_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmd.sh");
        fs::write(&path, "#!/bin/sh\necho hi\n").unwrap();
        let mut ws = workspace();

        ws.set_cmd_file(&path).unwrap();

        assert_eq!(ws.cmd_text(), "#!/bin/sh\necho hi\n");
        assert_eq!(ws.cmd_file(), path);
    }

    #[test]
    fn set_output_file_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("plot.png");
        let mut ws = workspace();

        ws.set_output_file(&path).unwrap();

        assert_eq!(ws.graphic_file(), path);
        assert!(!path.exists());
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut ws = workspace();
        let before = ws.script_file().to_path_buf();
        assert!(ws.set_input_file("").is_err());
        assert!(ws.set_output_file("  ").is_err());
        assert_eq!(ws.script_file(), before);
    }

    #[test]
    fn directory_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut ws = workspace();
        assert!(ws.set_cmd_file(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn prepare_run_writes_executable_command() {
        use std::os::unix::fs::PermissionsExt;

        let mut ws = workspace();
        ws.set_script_text("plot x");
        let request = ws.prepare_run().unwrap();

        let mode = fs::metadata(&request.cmd_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        assert_eq!(fs::read_to_string(&request.script_file).unwrap(), "plot x");
        assert_eq!(request.graphic_file, ws.graphic_file());
    }

    #[test]
    fn prepare_run_leaves_unchanged_script_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.gp");
        fs::write(&path, "plot x").unwrap();
        let mut ws = workspace();
        ws.set_input_file(&path).unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        ws.prepare_run().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }
}
