//! Headless rendering: `eview render` and `eview watch`

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;

use super::output::Output;
use crate::domain::{find_preset, preset_for_path, ViewerError, ViewerPreset};
use crate::runner::{run_preview, RunOutcome};
use crate::storage::{Config, DevLog, Workspace};

pub struct RenderOptions {
    pub file: PathBuf,
    pub viewer: Option<String>,
    pub cmd_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl RenderOptions {
    /// Graphic path: `--output`, or the script path with a `.png` extension
    pub fn graphic_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.file.with_extension("png"))
    }
}

/// Picks the viewer named by `--viewer`, or the one matching the extension
pub fn select_viewer<'a>(
    presets: &'a [ViewerPreset],
    key: Option<&str>,
    file: &Path,
) -> Result<&'a ViewerPreset, ViewerError> {
    match key {
        Some(key) => find_preset(presets, key),
        None => preset_for_path(presets, file)
            .map(|i| &presets[i])
            .ok_or_else(|| ViewerError::NoMatch(file.display().to_string())),
    }
}

/// Renders once. Returns true if a graphic was produced.
pub fn render(output: &Output, config: &Config, devlog: &DevLog, options: &RenderOptions) -> Result<bool> {
    if !options.file.is_file() {
        anyhow::bail!("Script not found: {}", options.file.display());
    }

    let preset = select_viewer(&config.viewers, options.viewer.as_deref(), &options.file)?;
    output.verbose_ctx("render", &format!("Using viewer '{}'", preset.key));

    let mut workspace = Workspace::new(preset)?;
    if let Some(cmd_file) = &options.cmd_file {
        workspace.set_cmd_file(cmd_file)?;
    }
    workspace.set_input_file(&options.file)?;
    workspace.set_output_file(options.graphic_path())?;

    if workspace.script_text().is_empty() {
        output.error(&format!("{} is empty; nothing to render", options.file.display()));
        return Ok(false);
    }

    let request = workspace
        .prepare_run()
        .context("Failed to prepare run")?;
    devlog.log("render", &format!("Running {} on {}", preset.key, options.file.display()));

    let outcome = run_preview(&request);
    devlog.log("render", &outcome.describe());

    report(output, preset, &outcome);

    Ok(outcome.graphic.is_some())
}

/// Renders on start and again after every change to the script
pub fn watch(output: &Output, config: &Config, devlog: &DevLog, options: &RenderOptions) -> Result<()> {
    let file = options
        .file
        .canonicalize()
        .with_context(|| format!("Script not found: {}", options.file.display()))?;
    let dir = file
        .parent()
        .map(Path::to_path_buf)
        .context("Script has no parent directory")?;

    render_logged(output, config, devlog, options);

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(config.debounce(), tx)?;

    // Editors often save by replacing the file, so watch its directory
    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)?;

    if !output.is_json() {
        eprintln!(
            "Watching {} (debounce: {}ms). Press Ctrl+C to stop.",
            file.display(),
            config.debounce_ms
        );
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if events.iter().any(|e| same_file(&e.path, &file)) {
                    output.verbose_ctx("watch", "Script changed");
                    render_logged(output, config, devlog, options);
                }
            }
            Ok(Err(error)) => {
                devlog.log("watch", &format!("Watch error: {:?}", error));
                output.error(&format!("Watch error: {:?}", error));
            }
            Err(_) => break,
        }
    }

    Ok(())
}

fn render_logged(output: &Output, config: &Config, devlog: &DevLog, options: &RenderOptions) {
    if let Err(e) = render(output, config, devlog, options) {
        devlog.log("watch", &format!("{:#}", e));
        output.error(&format!("{:#}", e));
    }
}

fn same_file(event_path: &Path, target: &Path) -> bool {
    event_path == target
        || event_path
            .canonicalize()
            .map(|p| p == target)
            .unwrap_or(false)
}

fn report(output: &Output, preset: &ViewerPreset, outcome: &RunOutcome) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "viewer": preset.key,
            "success": outcome.graphic.is_some(),
            "status": outcome.status,
            "output": outcome.output,
            "elapsed_ms": outcome.elapsed.as_millis() as u64,
            "graphic": outcome.graphic,
        }));
        return;
    }

    if !outcome.output.is_empty() {
        print!("{}", outcome.output);
        if !outcome.output.ends_with('\n') {
            println!();
        }
    }

    match &outcome.graphic {
        Some(graphic) => {
            println!("Wrote {} ({})", graphic.path.display(), graphic.summary());
        }
        None if outcome.succeeded() => {
            println!("No graphic produced ({})", outcome.describe());
        }
        None => {
            println!("Render failed ({})", outcome.describe());
        }
    }
}
