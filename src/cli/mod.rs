//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `eview [FILE]` | Interactive editor with live preview |
//! | `eview viewers` | List available viewers |
//! | `eview render FILE` | Run a viewer once, headless |
//! | `eview watch FILE` | Re-render on every save |
//! | `eview console` | Show the devtools log |
//! | `eview config` | Print the effective configuration |
//!
//! ## Output Formats
//!
//! Non-interactive commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod console;
mod output;
mod render;
mod tui;
mod viewers_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
