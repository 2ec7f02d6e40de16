//! Transcript extraction queue.
//!
//! Hook scripts drop `pending-<session>.json` artifacts into the
//! extract-queue directory when a session ends. The agent lists them, reads
//! the transcript (chunked for large files), saves the knowledge worth
//! keeping, and marks the artifact complete. Completed artifacts are kept a
//! week, then cleaned up.

use serde::Serialize;
use std::path::Path;

use crate::error::{EngramError, Result};

/// Chunk size for large transcript reads, in bytes.
const CHUNK_SIZE: usize = 100_000;
/// Completed artifacts older than this are deleted during `complete`.
const DONE_RETENTION_DAYS: u64 = 7;

/// One pending extraction artifact.
#[derive(Debug, Serialize)]
pub struct PendingExtraction {
    pub session_id: String,
    pub project: String,
    pub file_size_kb: u64,
}

#[derive(Debug, Serialize)]
pub struct ExtractListResult {
    pub pending: usize,
    pub sessions: Vec<PendingExtraction>,
}

#[derive(Debug, Serialize)]
pub struct ExtractCompleteResult {
    pub completed: bool,
    pub session_id: String,
}

/// List pending extraction artifacts, newest first.
pub fn extract_list(queue_dir: &Path) -> Result<ExtractListResult> {
    let mut sessions = Vec::new();
    let mut names: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(queue_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("pending-") && name.ends_with(".json") {
            names.push(name);
        }
    }
    names.sort_by(|a, b| b.cmp(a));

    for name in names {
        let path = queue_dir.join(&name);
        let session_id = name
            .trim_start_matches("pending-")
            .trim_end_matches(".json")
            .to_string();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let project = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<serde_json::Value>(&contents).ok())
            .and_then(|v| v.get("project").and_then(|p| p.as_str()).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        sessions.push(PendingExtraction {
            session_id,
            project,
            file_size_kb: size / 1024,
        });
    }

    Ok(ExtractListResult {
        pending: sessions.len(),
        sessions,
    })
}

/// Read a pending transcript, chunked when it exceeds [`CHUNK_SIZE`] bytes.
pub fn extract_get(queue_dir: &Path, session_id: &str, chunk: usize) -> Result<serde_json::Value> {
    let path = queue_dir.join(format!("pending-{session_id}.json"));
    if !path.exists() {
        return Err(EngramError::not_found("pending extraction", session_id));
    }

    let content = std::fs::read_to_string(&path)?;
    if content.len() <= CHUNK_SIZE {
        let mut data: serde_json::Value = serde_json::from_str(&content)?;
        if let Some(obj) = data.as_object_mut() {
            obj.insert("_total_chunks".into(), serde_json::json!(1));
            obj.insert("_chunk".into(), serde_json::json!(0));
        }
        return Ok(data);
    }

    let total_chunks = content.len().div_ceil(CHUNK_SIZE);
    if chunk >= total_chunks {
        return Err(EngramError::invalid(
            "chunk",
            format!("{chunk} out of range, transcript has {total_chunks} chunks"),
        ));
    }
    let start = chunk * CHUNK_SIZE;
    let end = (start + CHUNK_SIZE).min(content.len());
    // Split on char boundaries
    let start = floor_char_boundary(&content, start);
    let end = floor_char_boundary(&content, end);

    Ok(serde_json::json!({
        "_total_chunks": total_chunks,
        "_chunk": chunk,
        "partial_content": &content[start..end],
    }))
}

/// Mark a pending artifact done and clean up completed files older than a week.
pub fn extract_complete(queue_dir: &Path, session_id: &str) -> Result<ExtractCompleteResult> {
    let src = queue_dir.join(format!("pending-{session_id}.json"));
    let dst = queue_dir.join(format!("done-{session_id}.json"));
    if !src.exists() {
        return Err(EngramError::not_found("pending extraction", session_id));
    }
    std::fs::rename(&src, &dst)?;

    cleanup_done_files(queue_dir);

    Ok(ExtractCompleteResult {
        completed: true,
        session_id: session_id.to_string(),
    })
}

/// Best-effort deletion of done-* files past retention. Failures are logged.
fn cleanup_done_files(queue_dir: &Path) {
    let cutoff = std::time::SystemTime::now()
        - std::time::Duration::from_secs(DONE_RETENTION_DAYS * 86_400);
    let Ok(entries) = std::fs::read_dir(queue_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("done-") || !name.ends_with(".json") {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if expired {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                tracing::warn!(file = %name, error = %e, "failed to clean up done artifact");
            }
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
