//! Viewer session: one tab's editors, files, debounce timer and last run
//!
//! The session never runs commands itself. [`Session::poll`] hands out a
//! [`RunRequest`] tagged with a generation number when a run is due, and
//! [`Session::finish`] accepts the outcome for the latest generation only.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::domain::{Debounce, TextBuffer, ViewerPreset};
use crate::runner::{RunOutcome, RunRequest};
use crate::storage::Workspace;

/// Shown in the output pane while a run is in flight
pub const RUNNING_TEXT: &str = "Running...";

pub struct Session {
    preset: ViewerPreset,
    workspace: Workspace,
    cmd: TextBuffer,
    script: TextBuffer,
    debounce: Debounce,
    generation: u64,
    running: bool,
    output: String,
    last: Option<RunOutcome>,
}

impl Session {
    /// Creates a session seeded from the preset. The first run is scheduled
    /// right away so the tab shows something once it becomes visible.
    pub fn new(preset: ViewerPreset, delay: Duration) -> Result<Self> {
        let workspace = Workspace::new(&preset)?;
        let cmd = TextBuffer::new(workspace.cmd_text());
        let script = TextBuffer::new(workspace.script_text());
        let mut debounce = Debounce::new(delay);
        debounce.fire_now(Instant::now());

        Ok(Self {
            preset,
            workspace,
            cmd,
            script,
            debounce,
            generation: 0,
            running: false,
            output: String::new(),
            last: None,
        })
    }

    pub fn preset(&self) -> &ViewerPreset {
        &self.preset
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn cmd(&self) -> &TextBuffer {
        &self.cmd
    }

    pub fn script(&self) -> &TextBuffer {
        &self.script
    }

    pub fn cmd_mut(&mut self) -> &mut TextBuffer {
        &mut self.cmd
    }

    pub fn script_mut(&mut self) -> &mut TextBuffer {
        &mut self.script
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-arms the debounce timer after an edit
    pub fn touch(&mut self, now: Instant) {
        self.debounce.reset(now);
    }

    /// Schedules a run on the next poll
    pub fn run_now(&mut self, now: Instant) {
        self.debounce.fire_now(now);
    }

    pub fn set_input_file(&mut self, path: &Path, now: Instant) -> Result<()> {
        self.sync_to_workspace();
        self.workspace.set_input_file(path)?;
        self.script.set_text(self.workspace.script_text());
        self.touch(now);
        Ok(())
    }

    pub fn set_cmd_file(&mut self, path: &Path, now: Instant) -> Result<()> {
        self.sync_to_workspace();
        self.workspace.set_cmd_file(path)?;
        self.cmd.set_text(self.workspace.cmd_text());
        self.touch(now);
        Ok(())
    }

    pub fn set_output_file(&mut self, path: &Path, now: Instant) -> Result<()> {
        self.workspace.set_output_file(path)?;
        self.touch(now);
        Ok(())
    }

    /// Replaces the command text, e.g. after an external edit
    pub fn replace_cmd(&mut self, text: &str, now: Instant) {
        self.cmd.set_text(text);
        self.touch(now);
    }

    /// Replaces the script text, e.g. after an external edit
    pub fn replace_script(&mut self, text: &str, now: Instant) {
        self.script.set_text(text);
        self.touch(now);
    }

    /// Writes the editor contents to the workspace files without running
    pub fn flush(&mut self) -> Result<RunRequest> {
        self.sync_to_workspace();
        self.workspace.prepare_run()
    }

    /// Returns a run to start if the debounce fired and no run is in flight.
    ///
    /// A due timer stays armed while a run is in flight so the edit that
    /// armed it gets its own run afterwards. An empty script cancels the run.
    pub fn poll(&mut self, now: Instant) -> Result<Option<(u64, RunRequest)>> {
        if self.running || !self.debounce.take_due(now) {
            return Ok(None);
        }

        self.sync_to_workspace();
        if self.workspace.script_text().is_empty() {
            return Ok(None);
        }

        let request = self.workspace.prepare_run()?;
        self.generation += 1;
        self.running = true;
        self.output = RUNNING_TEXT.to_string();
        Ok(Some((self.generation, request)))
    }

    /// Accepts an outcome. Returns false if it belongs to a superseded run.
    pub fn finish(&mut self, generation: u64, outcome: RunOutcome) -> bool {
        if generation != self.generation {
            return false;
        }
        self.running = false;
        self.output = outcome.output.clone();
        self.last = Some(outcome);
        true
    }

    /// Forgets an in-flight run, e.g. when its worker could not start
    pub fn abandon(&mut self, message: &str) {
        self.generation += 1;
        self.running = false;
        self.output = message.to_string();
    }

    fn sync_to_workspace(&mut self) {
        self.workspace.set_cmd_text(self.cmd.text());
        self.workspace.set_script_text(self.script.text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtin_presets;
    use crate::runner::run_preview;
    use std::fs;
    use tempfile::TempDir;

    const DELAY: Duration = Duration::from_millis(500);

    fn echo_preset() -> ViewerPreset {
        ViewerPreset::new(
            "echo",
            "echo",
            "#!/bin/sh\ncat \"$1\"\ncp \"$1\" \"$2\"\n",
            "hello",
        )
    }

    #[test]
    fn first_poll_runs_immediately() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        let (generation, request) = session.poll(Instant::now()).unwrap().unwrap();

        assert_eq!(generation, 1);
        assert!(session.is_running());
        assert_eq!(session.output(), RUNNING_TEXT);
        assert_eq!(fs::read_to_string(&request.script_file).unwrap(), "hello");
    }

    #[test]
    fn edits_wait_for_debounce() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        let start = Instant::now();
        let (generation, request) = session.poll(start).unwrap().unwrap();
        session.finish(generation, run_preview(&request));

        session.script_mut().insert_char('!');
        session.touch(start);

        assert!(session.poll(start + Duration::from_millis(100)).unwrap().is_none());
        assert!(session.poll(start + DELAY).unwrap().is_some());
    }

    #[test]
    fn no_second_run_while_running() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        let now = Instant::now();
        let (generation, request) = session.poll(now).unwrap().unwrap();

        session.touch(now);
        assert!(session.poll(now + DELAY).unwrap().is_none());
        assert!(session.is_pending());

        session.finish(generation, run_preview(&request));
        let next = session.poll(now + DELAY).unwrap();
        assert_eq!(next.map(|(g, _)| g), Some(2));
    }

    #[cfg(unix)]
    #[test]
    fn finish_updates_output() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        let (generation, request) = session.poll(Instant::now()).unwrap().unwrap();

        assert!(session.finish(generation, run_preview(&request)));

        assert!(!session.is_running());
        assert_eq!(session.output(), "hello");
        assert!(session.last_outcome().unwrap().graphic.is_some());
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        let (generation, request) = session.poll(Instant::now()).unwrap().unwrap();
        session.abandon("Cancelled");

        assert!(!session.finish(generation, run_preview(&request)));
        assert_eq!(session.output(), "Cancelled");
    }

    #[test]
    fn empty_script_skips_run() {
        let mut session = Session::new(echo_preset(), DELAY).unwrap();
        session.replace_script("", Instant::now());
        session.run_now(Instant::now());

        assert!(session.poll(Instant::now()).unwrap().is_none());
        assert!(!session.is_running());
        assert!(!session.is_pending());
    }

    #[test]
    fn set_input_file_loads_existing_script() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.gp");
        fs::write(&path, "plot x**2").unwrap();
        let mut session = Session::new(builtin_presets()[0].clone(), DELAY).unwrap();

        session.set_input_file(&path, Instant::now()).unwrap();

        assert_eq!(session.script().text(), "plot x**2");
        assert_eq!(session.workspace().script_file(), path);
        assert!(session.is_pending());
    }

    #[test]
    fn set_input_file_keeps_edits_for_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.gp");
        let mut session = Session::new(builtin_presets()[0].clone(), DELAY).unwrap();
        session.replace_script("plot log(x)", Instant::now());

        session.set_input_file(&path, Instant::now()).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "plot log(x)");
    }
}
