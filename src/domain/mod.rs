//! Domain models for eview
//!
//! Viewer presets, the editor buffer, the debounce timer and graphic
//! inspection. Nothing here spawns processes or touches the terminal.

mod viewer;
mod buffer;
mod debounce;
mod graphic;

pub use viewer::{builtin_presets, find_preset, merge_presets, preset_for_path, ViewerError, ViewerPreset};
pub use buffer::TextBuffer;
pub use debounce::Debounce;
pub use graphic::{human_size, sniff, GraphicError, GraphicFormat, GraphicInfo};
