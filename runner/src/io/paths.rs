//! Path helpers shared by config, run context and prompt building.

use std::path::{Path, PathBuf};

/// Percent-encode a value so it is safe as a single path segment.
///
/// Branch names like `feature/login` become `feature%2Flogin`.
pub fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve_against(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Render `path` relative to `root` when it lives under it, else as-is.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
