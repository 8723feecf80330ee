//! Path utilities.
//!
//! Resolves where cadtrail keeps its configuration, its shared database and
//! the per-document history folders.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Name of the history folder created next to tracked documents.
pub const HISTORY_DIR_NAME: &str = ".cadtrail";

/// Get the cadtrail configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/cadtrail` if set
/// - `~/.config/cadtrail` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cadtrail"))
}

/// Get the cadtrail data directory.
///
/// This follows XDG conventions:
/// - `$XDG_DATA_HOME/cadtrail` if set
/// - `~/.local/share/cadtrail` otherwise
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("cadtrail"))
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Stable key used to identify a document across the database and the
/// legacy history format.
///
/// Paths are normalized and, on Windows, compared case-insensitively.
pub fn document_key(path: &Path) -> String {
    let normalized = normalize(path).to_string_lossy().replace('\\', "/");
    if cfg!(windows) {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

/// Hex SHA-256 of the document key.
pub fn document_hash(path: &Path) -> String {
    hex::encode(Sha256::digest(document_key(path).as_bytes()))
}

/// Resolve the history folder that holds a document's snapshot blobs.
///
/// With no explicit root the folder lives next to the document:
/// `<doc dir>/.cadtrail/<doc stem>_<hash8>`. With a root it is
/// `<root>/<doc stem>_<hash8>`.
pub fn history_dir(root: Option<&Path>, document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| sanitize_component(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    let hash = document_hash(document);
    let folder = format!("{}_{}", stem, &hash[..8]);

    match root {
        Some(root) => root.join(folder),
        None => document
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(HISTORY_DIR_NAME)
            .join(folder),
    }
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("cadtrail"));
    }

    #[test]
    fn test_normalize() {
        let path = Path::new("/home/user/./parts/../parts/bracket.sldprt");
        assert_eq!(normalize(path), PathBuf::from("/home/user/parts/bracket.sldprt"));
    }

    #[test]
    fn test_document_hash_is_stable() {
        let a = document_hash(Path::new("/parts/bracket.sldprt"));
        let b = document_hash(Path::new("/parts/./bracket.sldprt"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, document_hash(Path::new("/parts/other.sldprt")));
    }

    #[test]
    fn test_history_dir_next_to_document() {
        let dir = history_dir(None, Path::new("/parts/bracket.sldprt"));
        assert!(dir.starts_with("/parts/.cadtrail"));
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("bracket_"));
        assert_eq!(name.len(), "bracket_".len() + 8);
    }

    #[test]
    fn test_history_dir_with_root() {
        let root = tempfile::tempdir().unwrap();
        let dir = history_dir(Some(root.path()), Path::new("/parts/bracket.sldprt"));
        assert!(dir.starts_with(root.path()));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_component("  Boss-Extrude1 "), "Boss-Extrude1");
    }
}
