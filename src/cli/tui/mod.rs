//! Interactive preview window
//!
//! One tab per viewer preset. Each tab edits a script (and the command that
//! renders it), re-runs the command after a pause in typing and shows the
//! command output next to the rendered graphic's details.

mod app;
mod event;
mod ui;
mod utils;
mod views;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{anyhow, Result};

use super::Output;
use crate::storage::{Config, DevLog};
use app::App;
use event::EventHandler;

/// Tick rate; bounds how late a debounced run can start
const TICK_MS: u64 = 100;

/// Launch the TUI, optionally opening `filename` in the matching tab
pub fn run(
    output: &Output,
    config: &Config,
    devlog: &DevLog,
    filename: Option<&Path>,
) -> Result<()> {
    output.verbose_ctx("tui", "Initializing TUI application");
    if devlog.is_enabled() {
        output.verbose_ctx("tui", &format!("Devtools log: {}", devlog.path().display()));
    }

    // Create app state before touching the terminal so errors print normally
    let mut app = App::new(config, devlog, filename)?;

    let mut terminal = ui::init_terminal()?;
    let event_handler = EventHandler::new(TICK_MS);

    // Run the main loop with panic safety
    // This ensures terminal is restored even if the app panics
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        app.run(&mut terminal, event_handler)
    }));

    // Always restore terminal, even on panic
    let restore_result = ui::restore_terminal();

    match result {
        Ok(inner_result) => {
            restore_result?;
            inner_result
        }
        Err(panic_payload) => {
            let _ = restore_result;
            if let Some(s) = panic_payload.downcast_ref::<&str>() {
                Err(anyhow!("TUI panicked: {}", s))
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                Err(anyhow!("TUI panicked: {}", s))
            } else {
                Err(anyhow!("TUI panicked with unknown error"))
            }
        }
    }
}
