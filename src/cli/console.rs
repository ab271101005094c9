//! `eview console`: read the devtools log written by a running app

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use super::output::Output;
use crate::storage::DEVTOOLS_ENV;

/// Bytes of history shown before following
const FOLLOW_CONTEXT: u64 = 4096;

pub fn show(output: &Output, log_path: &Path, lines: usize, follow: bool) -> Result<()> {
    output.verbose_ctx("console", &format!("Reading {}", log_path.display()));

    if !log_path.exists() && !follow {
        if output.is_json() {
            output.data(&serde_json::json!({
                "logs": [],
                "message": "No devtools log found",
                "path": log_path.display().to_string(),
            }));
        } else {
            println!("No devtools log found at {}", log_path.display());
            println!("Start the app with {}=1 to write one.", DEVTOOLS_ENV);
        }
        return Ok(());
    }

    if follow {
        follow_log(log_path)
    } else {
        let content = fs::read_to_string(log_path)
            .with_context(|| format!("Failed to read {}", log_path.display()))?;
        let shown = tail(&content, lines);

        if output.is_json() {
            output.data(&serde_json::json!({
                "logs": shown,
                "total_lines": content.lines().count(),
                "showing": shown.len(),
            }));
        } else {
            for line in shown {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

/// Last `count` lines of `content`
fn tail(content: &str, count: usize) -> Vec<&str> {
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(count);
    all[start..].to_vec()
}

/// Prints recent history, then new lines as they are appended. Waits for the
/// file to appear.
fn follow_log(log_path: &Path) -> Result<()> {
    println!("eview console: following {}", log_path.display());

    while !log_path.exists() {
        std::thread::sleep(Duration::from_millis(250));
    }

    let mut follower = LogFollower::open(log_path, FOLLOW_CONTEXT)?;

    loop {
        match follower.next_line() {
            Ok(Some(line)) => print!("{}", line),
            Ok(None) => std::thread::sleep(Duration::from_millis(100)),
            Err(e) => {
                eprintln!("Error reading log: {:#}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Reads a log as it grows, starting over on a new file after rotation
struct LogFollower {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    file_id: Option<u64>,
}

impl LogFollower {
    fn open(path: &Path, context: u64) -> Result<Self> {
        let mut reader = open_at(path, context)?;
        let position = reader.stream_position()?;
        let file_id = file_id(&reader.get_ref().metadata()?);
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            position,
            file_id,
        })
    }

    /// Next complete line, or `None` if nothing new was written yet
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;

        if read > 0 && line.ends_with('\n') {
            self.position += read as u64;
            return Ok(Some(line));
        }

        // Partial line: rewind and wait for the writer to finish it
        if read > 0 {
            self.reader.seek(SeekFrom::Start(self.position))?;
            return Ok(None);
        }

        if self.rotated() {
            let path = self.path.clone();
            *self = Self::open(&path, 0)?;
            return self.next_line();
        }

        Ok(None)
    }

    /// True when the path now holds a different, fresh file
    fn rotated(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(metadata) => {
                metadata.len() < self.position
                    || (self.file_id.is_some() && file_id(&metadata) != self.file_id)
            }
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn file_id(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &fs::Metadata) -> Option<u64> {
    None
}

/// Opens the log positioned `context` bytes before its end, at a line start
fn open_at(log_path: &Path, context: u64) -> Result<BufReader<File>> {
    let file = File::open(log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let start = if context == 0 { 0 } else { len.saturating_sub(context) };
    reader.seek(SeekFrom::Start(start))?;

    if start > 0 {
        let mut partial = String::new();
        reader.read_line(&mut partial)?;
    }

    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), ["b", "c"]);
        assert_eq!(tail("a\nb", 10), ["a", "b"]);
        assert!(tail("", 5).is_empty());
    }

    #[test]
    fn open_at_skips_partial_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devtools.log");
        fs::write(&path, "first line\nsecond\n").unwrap();

        let mut reader = open_at(&path, 10).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();

        assert_eq!(line, "second\n");
    }

    #[test]
    fn open_at_zero_reads_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devtools.log");
        fs::write(&path, "only\n").unwrap();

        let mut reader = open_at(&path, 0).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();

        assert_eq!(line, "only\n");
    }

    #[test]
    fn follower_reads_appended_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devtools.log");
        fs::write(&path, "old\n").unwrap();

        let mut follower = LogFollower::open(&path, 0).unwrap();
        assert_eq!(follower.next_line().unwrap().as_deref(), Some("old\n"));
        assert_eq!(follower.next_line().unwrap(), None);

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"new\npart").unwrap();

        assert_eq!(follower.next_line().unwrap().as_deref(), Some("new\n"));
        assert_eq!(follower.next_line().unwrap(), None);

        file.write_all(b"ial\n").unwrap();
        assert_eq!(follower.next_line().unwrap().as_deref(), Some("partial\n"));
    }

    #[test]
    fn follower_reopens_after_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devtools.log");
        fs::write(&path, "before rotation\n").unwrap();

        let mut follower = LogFollower::open(&path, 0).unwrap();
        assert_eq!(
            follower.next_line().unwrap().as_deref(),
            Some("before rotation\n")
        );

        fs::rename(&path, dir.path().join("devtools.log.1")).unwrap();
        fs::write(&path, "after\n").unwrap();

        assert_eq!(follower.next_line().unwrap().as_deref(), Some("after\n"));
    }
}
