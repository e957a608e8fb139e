use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Context, Result};
use glob::Pattern;

use crate::util::sha256_hex;

/// Regular files directly inside `directory` whose names match `pattern`,
/// sorted by name.
pub fn list_matching_files(directory: &Path, pattern: &Pattern) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read directory {}", directory.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if pattern.matches(name) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Size and modification time of a candidate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified_nanos: u128,
}

pub fn snapshot(path: &Path) -> Result<FileSnapshot> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let modified_nanos = metadata
        .modified()
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    Ok(FileSnapshot {
        size: metadata.len(),
        modified_nanos,
    })
}

/// Samples the size twice, `wait` apart. Returns the second snapshot when the
/// size did not change, `None` while the file is still being written.
pub fn stable_snapshot(path: &Path, wait: Duration) -> Result<Option<FileSnapshot>> {
    let before = snapshot(path)?;
    if !wait.is_zero() {
        thread::sleep(wait);
    }
    let after = snapshot(path)?;

    if before.size == after.size {
        Ok(Some(after))
    } else {
        Ok(None)
    }
}

pub fn fingerprint(path: &Path, snapshot: FileSnapshot) -> String {
    let key = format!(
        "{}|{}|{}",
        path.display(),
        snapshot.size,
        snapshot.modified_nanos
    );
    sha256_hex(key.as_bytes())
}
