//! Append-only decision log
//!
//! One line per decision: `<timestamp>\tVisitor IP <ip>\t<reason>`.
//! Each line is written with a single `write_all` on a file opened in
//! append mode, so concurrent requests never interleave partial lines.
//! The file is never rotated or truncated.

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DebugLog {
    path: PathBuf,
}

impl DebugLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format a log line, replacing tabs and line breaks inside fields
    pub fn format_line(timestamp: DateTime<Utc>, visitor_ip: &str, reason: &str) -> String {
        format!(
            "{}\tVisitor IP {}\t{}\n",
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            sanitize(visitor_ip),
            sanitize(reason)
        )
    }

    pub fn append(&self, timestamp: DateTime<Utc>, visitor_ip: &str, reason: &str) -> io::Result<()> {
        let line = Self::format_line(timestamp, visitor_ip, reason);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// `append` on tokio's blocking pool, for callers on the async runtime
    pub async fn append_async(
        &self,
        timestamp: DateTime<Utc>,
        visitor_ip: String,
        reason: String,
    ) -> io::Result<()> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.append(timestamp, &visitor_ip, &reason))
            .await
            .map_err(io::Error::other)?
    }

    /// Whole log contents; empty when the file does not exist yet
    pub fn read(&self) -> io::Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
