//! Session transcripts.
//!
//! Every prompt sent and completion received can be appended to a plain
//! text file, one timestamped line per entry. Without a transcript
//! directory the handle is empty and writes are no-ops.

use chrono::{SecondsFormat, Utc};
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

/// Thread-safe handle to an append-only transcript file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// A handle that discards everything.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Append `[timestamp] LABEL: data` to the transcript (if present).
///
/// Multi-line data is written as-is, so one entry may span several lines.
pub fn log_line(handle: &LogHandle, label: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = writeln!(file, "[{}] {}: {}", ts, label, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` for appending.
///
/// Any failure to create the directory or file yields a disabled handle.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("Transcript directory {} unavailable: {}", dir.display(), e);
            return None;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}.log", log_id)))
            .map_err(|e| log::warn!("Cannot open transcript for {}: {}", log_id, e))
            .ok()
    });
    Arc::new(Mutex::new(file))
}
