//! Graphic file inspection
//!
//! Identifies the format of a produced graphic from its leading bytes and
//! extracts pixel dimensions where the header carries them.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Bytes read from the start of a file for sniffing
const HEADER_LEN: usize = 512;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Error)]
pub enum GraphicError {
    #[error("Graphic not found: {0}")]
    Missing(PathBuf),

    #[error("Graphic is empty: {0}")]
    Empty(PathBuf),

    #[error("Failed to read graphic {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
    Pdf,
    Unknown,
}

impl fmt::Display for GraphicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GraphicFormat::Png => "png",
            GraphicFormat::Jpeg => "jpeg",
            GraphicFormat::Gif => "gif",
            GraphicFormat::Svg => "svg",
            GraphicFormat::Pdf => "pdf",
            GraphicFormat::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphicInfo {
    pub path: PathBuf,
    pub format: GraphicFormat,
    pub size: u64,
    /// Width and height in pixels, when known
    pub dimensions: Option<(u32, u32)>,
}

impl GraphicInfo {
    /// Reads the header of `path`. Missing and empty files are errors.
    pub fn inspect(path: &Path) -> Result<Self, GraphicError> {
        let io_err = |source| GraphicError::Io {
            path: path.to_path_buf(),
            source,
        };

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GraphicError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(io_err(e)),
        };
        if metadata.len() == 0 {
            return Err(GraphicError::Empty(path.to_path_buf()));
        }

        let mut header = Vec::with_capacity(HEADER_LEN);
        File::open(path)
            .map_err(io_err)?
            .take(HEADER_LEN as u64)
            .read_to_end(&mut header)
            .map_err(io_err)?;

        let (format, dimensions) = sniff(&header);

        Ok(Self {
            path: path.to_path_buf(),
            format,
            size: metadata.len(),
            dimensions,
        })
    }

    /// One-line description for the graphic pane and `render` output
    pub fn summary(&self) -> String {
        let mut parts = vec![self.format.to_string()];
        if let Some((w, h)) = self.dimensions {
            parts.push(format!("{}x{}", w, h));
        }
        parts.push(human_size(self.size));
        parts.join(", ")
    }
}

/// Identifies the format and dimensions from leading bytes
pub fn sniff(header: &[u8]) -> (GraphicFormat, Option<(u32, u32)>) {
    if header.starts_with(PNG_MAGIC) {
        // IHDR is the first chunk: length(4) type(4) width(4) height(4)
        let dims = if header.len() >= 24 && &header[12..16] == b"IHDR" {
            let w = u32::from_be_bytes([header[16], header[17], header[18], header[19]]);
            let h = u32::from_be_bytes([header[20], header[21], header[22], header[23]]);
            Some((w, h))
        } else {
            None
        };
        return (GraphicFormat::Png, dims);
    }

    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        let dims = if header.len() >= 10 {
            let w = u16::from_le_bytes([header[6], header[7]]) as u32;
            let h = u16::from_le_bytes([header[8], header[9]]) as u32;
            Some((w, h))
        } else {
            None
        };
        return (GraphicFormat::Gif, dims);
    }

    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return (GraphicFormat::Jpeg, None);
    }

    if header.starts_with(b"%PDF") {
        return (GraphicFormat::Pdf, None);
    }

    let text = String::from_utf8_lossy(header);
    let trimmed = text.trim_start();
    if trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg")) {
        return (GraphicFormat::Svg, None);
    }

    (GraphicFormat::Unknown, None)
}

/// Formats a byte count as B, KiB or MiB
pub fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
