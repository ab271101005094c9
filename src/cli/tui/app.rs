//! TUI application state and logic

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;

use super::event::{Event, EventHandler};
use super::ui::Terminal;
use super::views;
use crate::domain::preset_for_path;
use crate::runner::{run_preview, RunOutcome};
use crate::session::Session;
use crate::storage::{Config, DevLog};

/// Rows moved by page up/down
const PAGE: usize = 10;

/// Time for the event thread to notice a pause before the editor starts
const EDITOR_HANDOFF: Duration = Duration::from_millis(150);

pub const HELP: &str = "Tab/S-Tab:focus Esc:leave editor ^N/^P:tab ^K:cmd panel ^R:run ^E:$EDITOR ^O:open graphic ^Q:quit";

/// Path inputs below the script editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathField {
    Input,
    Output,
    Cmd,
}

impl PathField {
    fn index(self) -> usize {
        match self {
            PathField::Input => 0,
            PathField::Output => 1,
            PathField::Cmd => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PathField::Input => "Input File",
            PathField::Output => "Output File",
            PathField::Cmd => "Cmd File",
        }
    }
}

/// Which widget has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Cmd,
    #[default]
    Script,
    Field(PathField),
    Output,
}

impl Focus {
    /// Focus order; the command editor only takes part while expanded
    fn order(cmd_visible: bool) -> Vec<Focus> {
        let mut order = Vec::with_capacity(6);
        if cmd_visible {
            order.push(Focus::Cmd);
        }
        order.extend([
            Focus::Script,
            Focus::Field(PathField::Input),
            Focus::Field(PathField::Output),
            Focus::Field(PathField::Cmd),
            Focus::Output,
        ]);
        order
    }

    fn next(self, cmd_visible: bool) -> Self {
        let order = Self::order(cmd_visible);
        let pos = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(pos + 1) % order.len()]
    }

    fn prev(self, cmd_visible: bool) -> Self {
        let order = Self::order(cmd_visible);
        let pos = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(pos + order.len() - 1) % order.len()]
    }

    fn is_editor(self) -> bool {
        matches!(self, Focus::Cmd | Focus::Script)
    }
}

/// Text handed to the external editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditTarget {
    Cmd,
    Script,
}

/// One viewer tab
pub struct Tab {
    session: Session,
    fields: [String; 3],
    output_scroll: u16,
}

impl Tab {
    fn new(session: Session) -> Self {
        let mut tab = Self {
            session,
            fields: Default::default(),
            output_scroll: 0,
        };
        tab.refresh_fields();
        tab
    }

    fn current_path(&self, field: PathField) -> &Path {
        let ws = self.session.workspace();
        match field {
            PathField::Input => ws.script_file(),
            PathField::Output => ws.graphic_file(),
            PathField::Cmd => ws.cmd_file(),
        }
    }

    /// Resets every field to the path actually in use
    fn refresh_fields(&mut self) {
        for field in [PathField::Input, PathField::Output, PathField::Cmd] {
            self.fields[field.index()] = self.current_path(field).display().to_string();
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn field(&self, field: PathField) -> &str {
        &self.fields[field.index()]
    }

    pub fn output_scroll(&self) -> u16 {
        self.output_scroll
    }
}

/// Application state
pub struct App {
    tabs: Vec<Tab>,
    active: usize,
    focus: Focus,
    cmd_expanded: bool,
    status_message: Option<String>,
    should_quit: bool,
    pending_edit: Option<EditTarget>,
    config: Config,
    devlog: DevLog,
    /// Visible rows of the command and script editors
    editor_heights: (usize, usize),
}

impl App {
    /// Create one tab per viewer; `filename` is loaded into the tab whose
    /// viewer handles its extension.
    pub fn new(config: &Config, devlog: &DevLog, filename: Option<&Path>) -> Result<Self> {
        let mut tabs = Vec::with_capacity(config.viewers.len());
        for preset in &config.viewers {
            tabs.push(Tab::new(Session::new(preset.clone(), config.debounce())?));
        }
        if tabs.is_empty() {
            anyhow::bail!("No viewers configured");
        }

        let mut app = Self {
            tabs,
            active: 0,
            focus: Focus::Script,
            cmd_expanded: false,
            status_message: None,
            should_quit: false,
            pending_edit: None,
            config: config.clone(),
            devlog: devlog.clone(),
            editor_heights: (0, 0),
        };

        if let Some(path) = filename {
            app.open_file(path)?;
        }

        app.devlog.log(
            "tui",
            &format!("Started with {} viewer tab(s)", app.tabs.len()),
        );

        Ok(app)
    }

    fn open_file(&mut self, path: &Path) -> Result<()> {
        let presets: Vec<_> = self.tabs.iter().map(|t| t.session.preset().clone()).collect();
        match preset_for_path(&presets, path) {
            Some(index) => {
                let tab = &mut self.tabs[index];
                tab.session.set_input_file(path, Instant::now())?;
                tab.refresh_fields();
                self.active = index;
                self.devlog.log(
                    "tui",
                    &format!("Opened {} in '{}'", path.display(), presets[index].key),
                );
            }
            None => {
                self.status_message = Some(format!(
                    "No viewer for {}; set the Input File to load it",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    /// Run the main application loop
    pub fn run(&mut self, terminal: &mut Terminal, events: EventHandler) -> Result<()> {
        let sender = events.sender();

        while !self.should_quit {
            if let Some(target) = self.pending_edit.take() {
                self.execute_editor(terminal, &events, target)?;
                continue;
            }

            let size = terminal.size()?;
            self.update_editor_heights(Rect::new(0, 0, size.width, size.height));

            self.start_due_run(&sender);

            terminal.draw(|frame| views::preview::draw(frame, self))?;

            match events.next()? {
                Event::Key(key) => self.handle_key(key)?,
                Event::Resize(_, _) => {} // Terminal handles resize automatically
                Event::Tick => {}
                Event::RunFinished {
                    tab,
                    generation,
                    outcome,
                } => self.finish_run(tab, generation, outcome),
            }
        }

        self.devlog.log("tui", "Quit");
        Ok(())
    }

    fn update_editor_heights(&mut self, area: Rect) {
        let layout = views::preview::layout(area, self.cmd_expanded);
        self.editor_heights = (
            layout.cmd.height.saturating_sub(2) as usize,
            layout.script.height.saturating_sub(2) as usize,
        );
    }

    /// Starts the active tab's run if its debounce fired. Hidden tabs keep
    /// their timers armed until they are shown.
    fn start_due_run(&mut self, sender: &mpsc::Sender<Event>) {
        let tab = self.active;
        let session = &mut self.tabs[tab].session;

        let (generation, request) = match session.poll(Instant::now()) {
            Ok(Some(run)) => run,
            Ok(None) => return,
            Err(e) => {
                self.devlog.log("run", &format!("{:#}", e));
                self.status_message = Some(format!("Error: {:#}", e));
                return;
            }
        };

        self.devlog.log(
            "run",
            &format!(
                "[{}] #{} {} {} {}",
                session.preset().key,
                generation,
                request.cmd_file.display(),
                request.script_file.display(),
                request.graphic_file.display()
            ),
        );

        let tx = sender.clone();
        let spawned = thread::Builder::new()
            .name("eview-run".to_string())
            .spawn(move || {
                let outcome = run_preview(&request);
                let _ = tx.send(Event::RunFinished {
                    tab,
                    generation,
                    outcome,
                });
            });

        if let Err(e) = spawned {
            session.abandon(&format!("Failed!\n{}", e));
        }
    }

    fn finish_run(&mut self, tab: usize, generation: u64, outcome: RunOutcome) {
        let Some(target) = self.tabs.get_mut(tab) else {
            return;
        };

        let summary = outcome.describe();
        let graphic = outcome.graphic.as_ref().map(|g| g.summary());
        if target.session.finish(generation, outcome) {
            target.output_scroll = 0;
            self.devlog.log(
                "run",
                &format!(
                    "[{}] #{} {} graphic: {}",
                    target.session.preset().key,
                    generation,
                    summary,
                    graphic.as_deref().unwrap_or("none")
                ),
            );
            self.devlog.log("output", target.session.output());
        } else {
            self.devlog.log("run", &format!("Discarded stale run #{}", generation));
        }
    }

    /// Handle key events
    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        self.status_message = None;

        if ctrl {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => {
                    self.should_quit = true;
                    return Ok(());
                }
                KeyCode::Char('n') => {
                    self.switch_tab(1);
                    return Ok(());
                }
                KeyCode::Char('p') => {
                    self.switch_tab(self.tabs.len() - 1);
                    return Ok(());
                }
                KeyCode::Char('k') => {
                    self.toggle_cmd_panel();
                    return Ok(());
                }
                KeyCode::Char('r') => {
                    self.tabs[self.active].session.run_now(Instant::now());
                    return Ok(());
                }
                KeyCode::Char('e') => {
                    self.pending_edit = Some(match self.focus {
                        Focus::Cmd | Focus::Field(PathField::Cmd) => EditTarget::Cmd,
                        _ => EditTarget::Script,
                    });
                    return Ok(());
                }
                KeyCode::Char('o') => {
                    self.open_graphic();
                    return Ok(());
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::F(1) => {
                self.status_message = Some(HELP.to_string());
                return Ok(());
            }
            KeyCode::BackTab => {
                self.set_focus(self.focus.prev(self.cmd_expanded));
                return Ok(());
            }
            _ => {}
        }

        match self.focus {
            Focus::Cmd | Focus::Script => self.handle_editor_key(key),
            Focus::Field(field) => self.handle_field_key(field, key),
            Focus::Output => self.handle_output_key(key),
        }

        Ok(())
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.set_focus(self.focus.next(self.cmd_expanded));
            return;
        }

        let (cmd_height, script_height) = self.editor_heights;
        let is_cmd = self.focus == Focus::Cmd;
        let session = &mut self.tabs[self.active].session;
        let (buffer, height) = if is_cmd {
            (session.cmd_mut(), cmd_height)
        } else {
            (session.script_mut(), script_height)
        };

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);

        let edited = match key.code {
            KeyCode::Char(c) if plain => {
                buffer.insert_char(c);
                true
            }
            KeyCode::Tab => {
                buffer.insert_tab();
                true
            }
            KeyCode::Enter => {
                buffer.newline();
                true
            }
            KeyCode::Backspace => buffer.backspace(),
            KeyCode::Delete => buffer.delete(),
            KeyCode::Left => {
                buffer.move_left();
                false
            }
            KeyCode::Right => {
                buffer.move_right();
                false
            }
            KeyCode::Up => {
                buffer.move_up(1);
                false
            }
            KeyCode::Down => {
                buffer.move_down(1);
                false
            }
            KeyCode::PageUp => {
                buffer.move_up(PAGE);
                false
            }
            KeyCode::PageDown => {
                buffer.move_down(PAGE);
                false
            }
            KeyCode::Home => {
                buffer.move_home();
                false
            }
            KeyCode::End => {
                buffer.move_end();
                false
            }
            _ => false,
        };

        buffer.scroll_to_cursor(height);

        if edited {
            session.touch(Instant::now());
        }
    }

    fn handle_field_key(&mut self, field: PathField, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => self.set_focus(self.focus.next(self.cmd_expanded)),
            KeyCode::Enter => self.apply_field(field),
            KeyCode::Esc => self.tabs[self.active].refresh_fields(),
            KeyCode::Backspace => {
                self.tabs[self.active].fields[field.index()].pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.tabs[self.active].fields[field.index()].push(c);
            }
            _ => {}
        }
    }

    fn handle_output_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            self.set_focus(self.focus.next(self.cmd_expanded));
            return;
        }

        let tab = &mut self.tabs[self.active];
        // The pane scrolls by u16 rows; longer output is capped
        let lines = tab.session.output().lines().count().saturating_sub(1);
        let max = u16::try_from(lines).unwrap_or(u16::MAX);
        match key.code {
            KeyCode::Up => tab.output_scroll = tab.output_scroll.saturating_sub(1),
            KeyCode::Down => tab.output_scroll = tab.output_scroll.saturating_add(1).min(max),
            KeyCode::PageUp => tab.output_scroll = tab.output_scroll.saturating_sub(PAGE as u16),
            KeyCode::PageDown => {
                tab.output_scroll = tab.output_scroll.saturating_add(PAGE as u16).min(max)
            }
            KeyCode::Home => tab.output_scroll = 0,
            KeyCode::End => tab.output_scroll = max,
            _ => {}
        }
    }

    /// Moves focus, applying a path field when focus leaves it
    fn set_focus(&mut self, focus: Focus) {
        if let Focus::Field(field) = self.focus {
            if focus != self.focus {
                self.apply_field(field);
            }
        }
        self.focus = focus;
    }

    /// Applies a path field if its text differs from the path in use
    fn apply_field(&mut self, field: PathField) {
        let tab = &mut self.tabs[self.active];
        let value = tab.fields[field.index()].trim().to_string();
        if Path::new(&value) == tab.current_path(field) {
            return;
        }

        let path = PathBuf::from(&value);
        let now = Instant::now();
        let result = match field {
            PathField::Input => tab.session.set_input_file(&path, now),
            PathField::Output => tab.session.set_output_file(&path, now),
            PathField::Cmd => tab.session.set_cmd_file(&path, now),
        };

        match result {
            Ok(()) => {
                self.devlog
                    .log("tui", &format!("{} set to {}", field.label(), path.display()));
                self.status_message = Some(format!("{}: {}", field.label(), path.display()));
            }
            Err(e) => {
                self.devlog.log("tui", &format!("{}: {:#}", field.label(), e));
                self.status_message = Some(format!("Error: {:#}", e));
            }
        }

        tab.refresh_fields();
    }

    fn switch_tab(&mut self, offset: usize) {
        if let Focus::Field(field) = self.focus {
            self.apply_field(field);
        }
        self.active = (self.active + offset) % self.tabs.len();
    }

    fn toggle_cmd_panel(&mut self) {
        self.cmd_expanded = !self.cmd_expanded;
        if self.cmd_expanded {
            self.focus = Focus::Cmd;
        } else if self.focus == Focus::Cmd {
            self.focus = Focus::Script;
        }
    }

    /// Execute the editor and reinitialize terminal afterwards
    fn execute_editor(
        &mut self,
        terminal: &mut Terminal,
        events: &EventHandler,
        target: EditTarget,
    ) -> Result<()> {
        let request = match self.tabs[self.active].session.flush() {
            Ok(request) => request,
            Err(e) => {
                self.status_message = Some(format!("Error: {:#}", e));
                return Ok(());
            }
        };
        let path = match target {
            EditTarget::Cmd => request.cmd_file,
            EditTarget::Script => request.script_file,
        };

        let editor = self.config.editor_command();
        let mut parts = editor.split_whitespace();
        let program = parts.next().unwrap_or("vi");

        events.pause();
        thread::sleep(EDITOR_HANDOFF);
        super::ui::restore_terminal()?;

        let status = Command::new(program).args(parts).arg(&path).status();

        // Reinitialize terminal regardless of editor result
        *terminal = super::ui::init_terminal()?;
        events.resume();

        match status {
            Ok(exit_status) if !exit_status.success() => {
                self.status_message =
                    Some(format!("Editor exited with code: {:?}", exit_status.code()));
            }
            Ok(_) => {}
            Err(e) => {
                self.status_message = Some(format!("Failed to run editor '{}': {}", program, e));
                return Ok(());
            }
        }

        match fs::read_to_string(&path) {
            Ok(text) => {
                let session = &mut self.tabs[self.active].session;
                let now = Instant::now();
                match target {
                    EditTarget::Cmd => session.replace_cmd(&text, now),
                    EditTarget::Script => session.replace_script(&text, now),
                }
                self.devlog.log("tui", &format!("Reloaded {}", path.display()));
            }
            Err(e) => {
                self.status_message = Some(format!("Failed to reload {}: {}", path.display(), e));
            }
        }

        Ok(())
    }

    /// Opens the last graphic with the configured opener
    fn open_graphic(&mut self) {
        let graphic = self.tabs[self.active]
            .session
            .last_outcome()
            .and_then(|o| o.graphic.as_ref())
            .map(|g| g.path.clone());

        let Some(path) = graphic else {
            self.status_message = Some("No graphic to open yet".to_string());
            return;
        };

        let opener = self.config.opener_command();
        let mut parts = opener.split_whitespace();
        let program = parts.next().unwrap_or("xdg-open");

        let spawned = Command::new(program)
            .args(parts)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                thread::spawn(move || {
                    let _ = child.wait();
                });
                self.status_message = Some(format!("Opened {}", path.display()));
            }
            Err(e) => {
                self.status_message = Some(format!("Failed to run '{}': {}", program, e));
            }
        }
    }

    // Public accessors for views

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_tab(&self) -> &Tab {
        &self.tabs[self.active]
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn cmd_expanded(&self) -> bool {
        self.cmd_expanded
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn editing(&self) -> bool {
        self.focus.is_editor()
    }
}
