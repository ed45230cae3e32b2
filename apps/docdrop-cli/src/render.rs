//! Terminal rendering of upload state.

use std::fmt::Write as _;

use docdrop_upload::{FileRecord, FileStatus, Snapshot};

/// Formats a byte count with binary units, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// One-line overall status, e.g. `[ 40.0%] 2/5 done, 1 failed, 2 uploading`.
pub fn status_line(snapshot: &Snapshot) -> String {
    let s = &snapshot.summary;
    let mut line = format!(
        "[{:>6}] {}/{} done",
        snapshot.global_progress().to_string(),
        s.done,
        s.total
    );
    if s.failed > 0 {
        let _ = write!(line, ", {} failed", s.failed);
    }
    if s.uploading > 0 {
        let _ = write!(line, ", {} uploading", s.uploading);
    }
    if s.queued > 0 {
        let _ = write!(line, ", {} queued", s.queued);
    }
    if snapshot.paused {
        line.push_str(" (paused)");
    }
    line
}

/// Full results table, one row per record in submission order.
pub fn render_table(snapshot: &Snapshot) -> String {
    let path_width = snapshot
        .records
        .iter()
        .map(|r| r.relative_path.chars().count())
        .max()
        .unwrap_or(0)
        .max("File".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<path_width$}  {:>10}  {:<9}  {:>4}  Detail",
        "File", "Size", "Status", "%"
    );
    for record in &snapshot.records {
        let _ = writeln!(
            out,
            "{:<path_width$}  {:>10}  {:<9}  {:>4}  {}",
            record.relative_path,
            format_size(record.size_bytes),
            record.status.label(),
            record.progress,
            detail(record)
        );
    }
    let _ = write!(out, "{}", status_line(snapshot));
    out
}

fn detail(record: &FileRecord) -> String {
    match record.status {
        FileStatus::Done => {
            let mut detail = record.remote_id.clone().unwrap_or_default();
            if record.attempts > 1 {
                let _ = write!(detail, " after {} attempts", record.attempts);
            }
            detail
        }
        FileStatus::Error => record.error.clone().unwrap_or_default(),
        FileStatus::Queued | FileStatus::Uploading => String::new(),
    }
}
