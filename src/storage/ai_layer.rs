use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::writing::WritingResult;

/// Reads a JSON payload from the AI layer. Missing files yield `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> WritingResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read AI-layer payload {}", path.display()))?;
    let payload = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse AI-layer payload {}", path.display()))?;
    Ok(Some(payload))
}

/// Writes a JSON payload through a sibling temp file so readers never see a
/// half-written document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> WritingResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, data)
        .with_context(|| format!("Failed to write AI-layer payload {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace AI-layer payload {}", path.display()))?;
    Ok(())
}

pub fn remove_if_exists(path: &Path) -> WritingResult<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove AI-layer payload {}", path.display()))?;
    }
    Ok(())
}

/// Appends one record as a JSON line.
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> WritingResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log {}", path.display()))?;
    file.write_all(serde_json::to_string(record)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> WritingResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read log {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).with_context(|| {
            format!("Invalid record on line {} of {}", number + 1, path.display())
        })?;
        records.push(record);
    }
    Ok(records)
}
