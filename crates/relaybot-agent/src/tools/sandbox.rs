//! Sandboxed path resolution for the filesystem tools.
//!
//! All tool paths are confined to a sandbox root, including through
//! symlinks: an existing target is canonicalized and re-checked, and a
//! not-yet-existing target (a write destination) is validated through its
//! nearest existing ancestor.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("path is empty")]
    InvalidPath,
    #[error("path escapes sandbox")]
    PathEscape,
}

/// Resolve `path` within `root`, following symlinks, and fail if the
/// resolved path lands outside the sandbox.
///
/// The returned path is canonical when the target exists, and the cleaned
/// joined path when it does not (valid for writes).
pub fn resolve_sandboxed(root: &Path, path: &str) -> Result<PathBuf, SandboxError> {
    if path.is_empty() {
        return Err(SandboxError::InvalidPath);
    }

    let abs_root = std::path::absolute(root).map_err(|_| SandboxError::InvalidPath)?;

    // Clean lexically and check for ".." escapes before anything touches
    // the filesystem.
    let joined = lexical_join(&abs_root, Path::new(path));
    if !is_within(&joined, &abs_root) {
        return Err(SandboxError::PathEscape);
    }

    let resolved_root = abs_root.canonicalize().unwrap_or(abs_root);

    // If the target exists, resolve symlinks and verify the real path is
    // still inside the real sandbox (a symlink could point outside).
    if let Ok(resolved) = joined.canonicalize() {
        if !is_within(&resolved, &resolved_root) {
            return Err(SandboxError::PathEscape);
        }
        return Ok(resolved);
    }

    // Target doesn't exist yet. Walk up to the nearest existing ancestor
    // and verify it's within the sandbox.
    let mut ancestor = joined.as_path();
    while let Some(parent) = ancestor.parent() {
        ancestor = parent;
        if let Ok(resolved_ancestor) = ancestor.canonicalize() {
            if !is_within(&resolved_ancestor, &resolved_root) {
                return Err(SandboxError::PathEscape);
            }
            return Ok(joined);
        }
    }

    Ok(joined)
}

/// Component-wise prefix check (true when `path == dir` as well).
fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}

/// Join `path` onto `base` purely lexically.
///
/// `..` pops a component (possibly escaping `base`, which the caller's
/// prefix check then catches); root/prefix components are dropped so an
/// absolute input is treated as sandbox-relative.
fn lexical_join(base: &Path, path: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in path.components() {
        match component {
            Component::Normal(c) => out.push(c),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_path_rejected() {
        let dir = tempdir().unwrap();
        assert_eq!(
            resolve_sandboxed(dir.path(), ""),
            Err(SandboxError::InvalidPath)
        );
    }

    #[test]
    fn test_simple_relative_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let resolved = resolve_sandboxed(dir.path(), "notes.txt").unwrap();
        assert!(resolved.ends_with("notes.txt"));
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_dotdot_traversal_rejected() {
        let dir = tempdir().unwrap();
        assert_eq!(
            resolve_sandboxed(dir.path(), "../outside.txt"),
            Err(SandboxError::PathEscape)
        );
        assert_eq!(
            resolve_sandboxed(dir.path(), "sub/../../outside.txt"),
            Err(SandboxError::PathEscape)
        );
    }

    #[test]
    fn test_dotdot_inside_sandbox_allowed() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let resolved = resolve_sandboxed(dir.path(), "sub/../notes.txt").unwrap();
        assert!(resolved.ends_with("notes.txt"));
    }

    #[test]
    fn test_absolute_path_treated_as_relative() {
        let dir = tempdir().unwrap();
        let resolved = resolve_sandboxed(dir.path(), "/etc/passwd").unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
        assert!(resolved.ends_with("etc/passwd"));
    }

    #[test]
    fn test_sibling_prefix_dir_rejected() {
        // /base/root must not admit /base/root2 via a lexical prefix match
        let base = tempdir().unwrap();
        let root = base.path().join("root");
        let sibling = base.path().join("root2");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&sibling).unwrap();
        std::fs::write(sibling.join("secret.txt"), "x").unwrap();

        assert_eq!(
            resolve_sandboxed(&root, "../root2/secret.txt"),
            Err(SandboxError::PathEscape)
        );
    }

    #[test]
    fn test_nonexistent_write_target_allowed() {
        let dir = tempdir().unwrap();
        let resolved = resolve_sandboxed(dir.path(), "new/deep/file.txt").unwrap();
        assert!(resolved.ends_with("new/deep/file.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_sandbox_rejected() {
        let base = tempdir().unwrap();
        let root = base.path().join("root");
        let outside = base.path().join("outside");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert_eq!(
            resolve_sandboxed(&root, "link/secret.txt"),
            Err(SandboxError::PathEscape)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_sandbox_allowed() {
        let root = tempdir().unwrap();
        std::fs::write(root.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(
            root.path().join("real.txt"),
            root.path().join("alias.txt"),
        )
        .unwrap();

        let resolved = resolve_sandboxed(root.path(), "alias.txt").unwrap();
        assert!(resolved.ends_with("real.txt"));
    }
}
