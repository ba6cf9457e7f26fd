use std::{collections::HashSet, fs, io::ErrorKind, path::Path};

use crate::{
    error::ManifestError,
    model::{DesiredList, ModelRef},
};

/// Reads the desired model list from a newline-delimited manifest.
pub fn load_desired(path: &Path) -> Result<DesiredList, ManifestError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ManifestError::NotFound(path.to_path_buf()),
        _ => ManifestError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let desired = parse_manifest(&raw);
    if desired.is_empty() {
        return Err(ManifestError::Empty(path.to_path_buf()));
    }
    Ok(desired)
}

/// Trimmed lines in file order, minus blanks, `#` comments and repeats.
pub fn parse_manifest(raw: &str) -> DesiredList {
    let mut seen = HashSet::new();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(ModelRef::from)
        .collect()
}
