//! Atomic document writes shared by the config store and version manager.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RuleError};

/// Write `contents` to `dir/file_name` via a hidden `.tmp` sibling and rename.
///
/// On failure the temporary file is removed, so the previous document (if any)
/// stays in place untouched.
pub(crate) fn write_atomic(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    let final_path = dir.join(file_name);
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let written = fs::write(&tmp_path, contents).and_then(|_| fs::rename(&tmp_path, &final_path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(RuleError::persistence(&final_path, e));
    }
    Ok(final_path)
}

/// Create `dir` and its parents, mapping failures to a persistence error.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| RuleError::persistence(dir, e))
}

/// Whether the path names a YAML document (`.yml` / `.yaml`).
pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}
