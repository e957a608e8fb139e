use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::{ensure_directory, file_name_string};

/// Moves `path` into `destination_dir`, never overwriting: a taken name gets
/// `_1`, `_2`, ... before its extension.
pub fn move_into(path: &Path, destination_dir: &Path) -> Result<PathBuf> {
    ensure_directory(destination_dir)?;

    let filename = file_name_string(path)?;
    let destination = unique_destination(destination_dir, &filename);

    if let Err(rename_err) = fs::rename(path, &destination) {
        // rename fails across filesystems; fall back to copy and remove.
        fs::copy(path, &destination).with_context(|| {
            format!(
                "failed to move {} to {} ({rename_err})",
                path.display(),
                destination.display()
            )
        })?;
        fs::remove_file(path)
            .with_context(|| format!("failed to remove {} after copy", path.display()))?;
    }

    Ok(destination)
}

fn unique_destination(destination_dir: &Path, filename: &str) -> PathBuf {
    let candidate = destination_dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(filename);
    let stem = as_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);
    let extension = as_path.extension().and_then(|extension| extension.to_str());

    (1_u32..)
        .map(|index| match extension {
            Some(extension) => destination_dir.join(format!("{stem}_{index}.{extension}")),
            None => destination_dir.join(format!("{stem}_{index}")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| destination_dir.join(filename))
}
