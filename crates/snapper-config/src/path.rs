//! Path helpers for configured directories.

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, and `~user` forms, are returned unchanged.
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Normalize path, falling back to the original if canonicalization fails.
///
/// This is useful when the path might not exist and that's acceptable.
pub fn normalize_or_original(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde("~/.snapper/data"), home.join(".snapper/data"));
        assert_eq!(expand_tilde("~"), home);
    }

    #[test]
    fn test_expand_tilde_leaves_other_paths() {
        assert_eq!(expand_tilde("/srv/data"), PathBuf::from("/srv/data"));
        assert_eq!(expand_tilde("asset/data"), PathBuf::from("asset/data"));
        assert_eq!(expand_tilde("~bob/data"), PathBuf::from("~bob/data"));
    }

    #[test]
    fn test_normalize_or_original() {
        let temp = tempfile::tempdir().unwrap();
        let canonical = normalize_or_original(temp.path());
        assert!(canonical.is_absolute());

        let missing = temp.path().join("does/not/exist");
        assert_eq!(normalize_or_original(&missing), missing);
    }
}
