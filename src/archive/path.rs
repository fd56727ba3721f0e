//! Lexical resolution of archive entry names.
//!
//! Entry names are untrusted. They are resolved without touching the
//! filesystem: `.` segments are dropped, `..` pops a previously pushed
//! segment, and anything that would climb above the root or is absolute is
//! rejected.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::ExtractError;

/// Resolves an entry name to a relative path strictly inside the root.
///
/// Backslashes are treated as separators so archives produced on Windows
/// resolve the same way everywhere.
pub(crate) fn resolve_entry_path(name: &str) -> Result<PathBuf, ExtractError> {
    if name.contains('\0') {
        return Err(ExtractError::unsafe_path(name, "contains NUL byte"));
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(ExtractError::unsafe_path(name, "absolute path"));
    }

    let mut resolved = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(ExtractError::unsafe_path(name, "escapes destination"));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::unsafe_path(name, "absolute path"));
            }
        }
    }

    if depth == 0 {
        return Err(ExtractError::unsafe_path(name, "resolves to destination root"));
    }
    Ok(resolved)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Fails if any existing path between `root` and `root/relative` (inclusive)
/// is a symbolic link, which would let a write land outside the root.
pub(crate) fn ensure_no_symlink_ancestors(
    root: &Path,
    relative: &Path,
    entry: &str,
) -> Result<(), ExtractError> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(ExtractError::unsafe_path(entry, "passes through a symbolic link"));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ExtractError::io(current, e)),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_nested_names_resolve() {
        assert_eq!(resolve_entry_path("a.txt").unwrap(), PathBuf::from("a.txt"));
        assert_eq!(
            resolve_entry_path("dir/b.txt").unwrap(),
            Path::new("dir").join("b.txt")
        );
        assert_eq!(resolve_entry_path("dir/").unwrap(), PathBuf::from("dir"));
    }

    #[test]
    fn test_inner_parent_segments_stay_inside() {
        assert_eq!(
            resolve_entry_path("dir/../a.txt").unwrap(),
            PathBuf::from("a.txt")
        );
        assert_eq!(
            resolve_entry_path("./dir/./b.txt").unwrap(),
            Path::new("dir").join("b.txt")
        );
    }

    #[test]
    fn test_traversal_is_rejected() {
        for name in [
            "../evil.txt",
            "../../etc/passwd",
            "dir/../../evil.txt",
            "..\\evil.txt",
            "dir\\..\\..\\evil.txt",
        ] {
            let error = resolve_entry_path(name).unwrap_err();
            assert!(error.is_unsafe_entry(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_absolute_names_are_rejected() {
        for name in ["/etc/passwd", "\\windows\\system32", "C:/evil.txt", "c:\\evil.txt"] {
            assert!(
                resolve_entry_path(name).is_err(),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_root_itself_is_rejected() {
        assert!(resolve_entry_path("").is_err());
        assert!(resolve_entry_path("./").is_err());
        assert!(resolve_entry_path("dir/..").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_ancestor_is_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path().join("out");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("dir")).unwrap();

        let relative = Path::new("dir").join("b.txt");
        let error = ensure_no_symlink_ancestors(&root, &relative, "dir/b.txt").unwrap_err();
        assert!(error.is_unsafe_entry());
        assert!(ensure_no_symlink_ancestors(&root, Path::new("fresh.txt"), "fresh.txt").is_ok());
    }
}
