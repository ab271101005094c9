//! # Preview Runner
//!
//! Executes a viewer command as `CMD_FILE SCRIPT_FILE GRAPHIC_FILE` and
//! collects what it printed and what it drew.
//!
//! - stdout and stderr share one pipe, so output keeps its interleaving
//! - a stale graphic is removed first, so a failed run never shows an old one
//! - a graphic only counts when the command exits 0 and the file is non-empty

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::domain::GraphicInfo;

/// `ETXTBSY`: another thread's child still held the command file open for
/// writing when we tried to exec it.
const TEXT_FILE_BUSY: i32 = 26;

const SPAWN_ATTEMPTS: u32 = 5;

/// Files handed to the command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub cmd_file: PathBuf,
    pub script_file: PathBuf,
    pub graphic_file: PathBuf,
}

/// Result of one preview run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Combined stdout and stderr
    pub output: String,

    /// Exit code; `None` if the command could not be started or was killed
    pub status: Option<i32>,

    /// Produced graphic, present only on success
    pub graphic: Option<GraphicInfo>,

    pub started_at: DateTime<Local>,

    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    /// Short status line, e.g. `exit 0 in 120ms`
    pub fn describe(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit {}", code),
            None => "failed to run".to_string(),
        };
        format!(
            "{} at {} in {}ms",
            status,
            self.started_at.format("%H:%M:%S"),
            self.elapsed.as_millis()
        )
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Runs the command and waits for it to finish
pub fn run_preview(request: &RunRequest) -> RunOutcome {
    let started_at = Local::now();
    let clock = Instant::now();

    // A graphic that could not be cleared may be stale, so it is not shown
    let stale = match fs::remove_file(&request.graphic_file) {
        Ok(()) => None,
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(format!(
            "Could not remove old graphic {}: {}\n",
            request.graphic_file.display(),
            e
        )),
    };

    let (mut output, status) = match execute(request) {
        Ok((output, status)) => (output, status.code()),
        Err(e) => (format!("Failed!\n{}", e), None),
    };

    if let Some(warning) = &stale {
        output.insert_str(0, warning);
    }

    let graphic = if status == Some(0) && stale.is_none() {
        GraphicInfo::inspect(&request.graphic_file).ok()
    } else {
        None
    };

    RunOutcome {
        output,
        status,
        graphic,
        started_at,
        elapsed: clock.elapsed(),
    }
}

fn execute(request: &RunRequest) -> io::Result<(String, ExitStatus)> {
    let (mut reader, writer) = io::pipe()?;

    let mut child = {
        let mut command = Command::new(program_path(&request.cmd_file));
        command
            .arg(&request.script_file)
            .arg(&request.graphic_file)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        spawn_with_retry(&mut command)?
        // `command` drops here, closing our copies of the write end
    };

    let mut bytes = Vec::new();
    let read_result = reader.read_to_end(&mut bytes);
    let status = child.wait()?;
    read_result?;

    Ok((String::from_utf8_lossy(&bytes).into_owned(), status))
}

/// A bare file name would be looked up on `PATH`; anchor relative paths to
/// the working directory instead.
fn program_path(cmd_file: &Path) -> PathBuf {
    if cmd_file.is_relative() {
        Path::new(".").join(cmd_file)
    } else {
        cmd_file.to_path_buf()
    }
}

fn spawn_with_retry(command: &mut Command) -> io::Result<std::process::Child> {
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt < SPAWN_ATTEMPTS => {
                thread::sleep(Duration::from_millis(10 * attempt as u64));
                attempt += 1;
            }
            result => return result,
        }
    }
}
