//! eview - Edit scripts for generating graphics and see the results in real-time
//!
//! Each viewer pairs a command script with a script the user edits. After
//! every pause in editing the command runs as `CMD SCRIPT GRAPHIC`, and the
//! produced graphic and the command's output are shown side by side.

pub mod domain;
pub mod storage;
pub mod runner;
pub mod session;
pub mod cli;

pub use domain::{GraphicInfo, TextBuffer, ViewerPreset};
pub use runner::{run_preview, RunOutcome, RunRequest};
pub use session::Session;
