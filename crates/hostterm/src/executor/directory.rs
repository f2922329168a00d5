//! Working-directory resolution and containment.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a working directory was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The requested path was empty.
    #[error("No path provided")]
    Empty,
    /// The path does not resolve to an existing directory.
    #[error("Directory does not exist: {}", .0.display())]
    NotFound(PathBuf),
    /// The path resolves outside every permitted root.
    #[error("Directory is not in allowed directories: {}", .0.display())]
    NotAllowed(PathBuf),
}

/// The caller's home directory, falling back to `/`.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Expand a leading `~` or `~/` to the home directory.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Canonical form of a permitted root. Roots that do not exist (yet) are
/// kept as absolute paths so they still contain nothing but themselves.
pub(crate) fn canonical_root(root: &Path) -> PathBuf {
    let root = match root.to_str() {
        Some(text) => expand_tilde(text),
        None => root.to_path_buf(),
    };
    std::fs::canonicalize(&root)
        .or_else(|_| std::path::absolute(&root))
        .unwrap_or(root)
}

/// Returns true if `path` equals or is nested under one of `roots`.
///
/// Comparison is per path component, so `/tmp` contains `/tmp/a` but not
/// `/tmpfoo`. Both sides must already be canonical.
pub(crate) fn is_within(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

/// Resolve `requested` against `base`, follow symlinks, and check the result
/// is an existing directory inside `roots`.
pub(crate) fn resolve_dir(
    base: &Path,
    requested: &Path,
    roots: &[PathBuf],
) -> Result<PathBuf, DirectoryError> {
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        base.join(requested)
    };

    let resolved = match std::fs::canonicalize(&joined) {
        Ok(path) if path.is_dir() => path,
        Ok(path) => return Err(DirectoryError::NotFound(path)),
        Err(_) => return Err(DirectoryError::NotFound(joined)),
    };

    if !is_within(&resolved, roots) {
        return Err(DirectoryError::NotAllowed(resolved));
    }
    Ok(resolved)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within_component_prefix() {
        let roots = vec![PathBuf::from("/tmp")];
        assert!(is_within(Path::new("/tmp"), &roots));
        assert!(is_within(Path::new("/tmp/a/b"), &roots));
        assert!(!is_within(Path::new("/tmpfoo"), &roots));
        assert!(!is_within(Path::new("/etc"), &roots));
    }

    #[test]
    fn test_is_within_no_roots() {
        assert!(!is_within(Path::new("/tmp"), &[]));
    }

    #[test]
    fn test_expand_tilde() {
        let home = home_dir();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/projects"), home.join("projects"));
        assert_eq!(expand_tilde("/tmp/~"), PathBuf::from("/tmp/~"));
        assert_eq!(expand_tilde("~other"), PathBuf::from("~other"));
    }

    #[test]
    fn test_resolve_relative_subdir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        let roots = vec![canonical_root(root.path())];

        let resolved = resolve_dir(&roots[0], Path::new("sub"), &roots).unwrap();
        assert_eq!(resolved, roots[0].join("sub"));
    }

    #[test]
    fn test_resolve_parent_escape_rejected() {
        let root = tempfile::tempdir().unwrap();
        let roots = vec![canonical_root(root.path())];

        let err = resolve_dir(&roots[0], Path::new(".."), &roots).unwrap_err();
        assert!(matches!(err, DirectoryError::NotAllowed(_)));
        assert!(err.to_string().contains("not in allowed"));
    }

    #[test]
    fn test_resolve_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let roots = vec![canonical_root(root.path())];

        let err = resolve_dir(&roots[0], Path::new("missing"), &roots).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_file_is_not_a_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("file.txt"), b"x").unwrap();
        let roots = vec![canonical_root(root.path())];

        let err = resolve_dir(&roots[0], Path::new("file.txt"), &roots).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_follows_symlinks_out_of_root() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), allowed.path().join("link")).unwrap();
        let roots = vec![canonical_root(allowed.path())];

        let err = resolve_dir(&roots[0], Path::new("link"), &roots).unwrap_err();
        assert!(matches!(err, DirectoryError::NotAllowed(_)));
    }

    #[test]
    fn test_canonical_root_missing_is_absolute() {
        let root = canonical_root(Path::new("/definitely/not/here"));
        assert_eq!(root, PathBuf::from("/definitely/not/here"));
    }
}
