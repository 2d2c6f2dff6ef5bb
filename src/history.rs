//! Broadcast history tracking.
//!
//! Appends one record per terminal narration session as daily JSONL files
//! in ~/.leafcast-history/.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, error};

/// Directory for history JSONL files.
fn history_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leafcast-history")
}

/// History file path for a given date ("today" or YYYY-MM-DD).
fn history_file(date: &str) -> PathBuf {
    let date_str = if date == "today" {
        Local::now().format("%Y-%m-%d").to_string()
    } else {
        date.to_string()
    };
    history_dir().join(format!("{date_str}.jsonl"))
}

/// Record of one finished narration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub timestamp: String,
    pub target_language: String,
    pub voice: Option<String>,
    pub final_state: String,
    pub segments_total: usize,
    pub segments_spoken: usize,
    pub segments_failed: usize,
    pub duration_ms: i64,
}

/// Append a broadcast record to the daily history file.
pub fn save_record(record: &BroadcastRecord) {
    let dir = history_dir();
    if let Err(e) = fs::create_dir_all(&dir) {
        error!("Failed to create history dir: {e}");
        return;
    }

    let path = history_file("today");
    match fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut file) => match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(e) = writeln!(file, "{json}") {
                    error!("Failed to write history record: {e}");
                } else {
                    debug!("Saved broadcast record to {}", path.display());
                }
            }
            Err(e) => error!("Failed to serialize record: {e}"),
        },
        Err(e) => error!("Failed to open history file: {e}"),
    }
}

/// Load all broadcast records for a given date.
pub fn load_records(date: &str) -> Vec<BroadcastRecord> {
    let path = history_file(date);
    if !path.exists() {
        return Vec::new();
    }

    let mut records = Vec::new();
    match fs::File::open(&path) {
        Ok(file) => {
            for line in std::io::BufReader::new(file).lines().map_while(Result::ok) {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BroadcastRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!("Skipping malformed history line: {e}"),
                }
            }
        }
        Err(e) => error!("Failed to load history records: {e}"),
    }

    records
}
