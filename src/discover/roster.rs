//! Forum roster and existing-archive enumeration

use crate::state::{is_valid_id, ExtensionId};
use crate::ArchiverError;
use std::path::Path;
use walkdir::WalkDir;

/// Reads the forum roster: one extension id per line
///
/// Blank lines and `#` comments are skipped. Malformed lines are logged and
/// skipped rather than failing the whole batch.
pub fn load_forum_roster(path: &Path) -> Result<Vec<ExtensionId>, ArchiverError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_forum_roster(&content))
}

/// Parses roster text; see `load_forum_roster`
pub fn parse_forum_roster(content: &str) -> Vec<ExtensionId> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match ExtensionId::parse(line) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Skipping forum roster line {}: {}", index + 1, e);
                    None
                }
            }
        })
        .collect()
}

/// Lists the ids that already have an archive under `root`
///
/// `<root>/<shard>/<id>.tar` counts, and so does a lone `<id>.bak.tar` left
/// by a failed repack. Quarantined archives and temporary files are
/// ignored. A missing root yields no ids.
pub fn existing_ids(root: &Path) -> Vec<ExtensionId> {
    let mut ids: Vec<ExtensionId> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable archive entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            let stem = name
                .strip_suffix(".bak.tar")
                .or_else(|| name.strip_suffix(".tar"))?;
            is_valid_id(stem).then(|| ExtensionId::parse(stem).ok())?
        })
        .collect();

    ids.sort();
    ids.dedup();
    ids
}
