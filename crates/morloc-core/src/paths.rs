//! Build output directory management.
//!
//! Every build writes into one output directory, either given explicitly or
//! allocated under the morloc home:
//!
//! ```text
//! ~/.morloc/
//! └── tmp/
//!     └── morloc_0/     # output directory
//!         ├── call.sh   # one pool per language
//!         ├── call.py
//!         ├── cache/    # only when a manifold caches
//!         └── m3_tmp    # transient result artifacts
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Number of `morloc_N` slots tried before giving up.
pub const MAX_TMP_SLOTS: usize = 500;

/// The morloc home: `$MORLOC_HOME`, else `~/.morloc`.
pub fn morloc_home() -> PathBuf {
    if let Some(home) = std::env::var_os("MORLOC_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".morloc")
}

/// Output directory of one build.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// The output directory itself (absolute).
    pub root: PathBuf,

    /// On-disk cache store, used only when a manifold caches.
    pub cache_dir: PathBuf,
}

impl Workspace {
    /// Use an explicit execution path.
    ///
    /// # Errors
    /// Returns an error if the directory exists and `clobber` is false, if
    /// its parent does not exist, or if it cannot be created for lack of
    /// permissions.
    pub fn at(path: &Path, clobber: bool) -> Result<Self> {
        match fs::create_dir(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !clobber {
                    return Err(Error::WorkspaceExists(path.to_path_buf()));
                }
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(Error::WorkspacePermission(path.to_path_buf()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::WorkspaceMissingParent(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }
        Self::from_root(path)
    }

    /// Allocate the first free `<home>/tmp/morloc_N`.
    ///
    /// # Errors
    /// Returns an error if every slot is taken or the home is not writable.
    pub fn allocate(home: &Path) -> Result<Self> {
        let tmp = home.join("tmp");
        fs::create_dir_all(&tmp)?;

        for i in 0..MAX_TMP_SLOTS {
            let candidate = tmp.join(format!("morloc_{i}"));
            match fs::create_dir(&candidate) {
                Ok(()) => return Self::from_root(&candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::WorkspaceExhausted(tmp))
    }

    fn from_root(root: &Path) -> Result<Self> {
        // Pools bake the output directory in, so it must not be relative
        let root = fs::canonicalize(root)?;
        let cache_dir = root.join("cache");
        Ok(Self { root, cache_dir })
    }

    /// Path of the pool executable for a language.
    pub fn pool_path(&self, lang: &str) -> PathBuf {
        self.root.join(format!("call.{lang}"))
    }

    /// Remove the whole output directory.
    pub fn remove(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_sequential_slots() {
        let home = TempDir::new().expect("Failed to create temp dir");

        let first = Workspace::allocate(home.path()).expect("Failed to allocate");
        let second = Workspace::allocate(home.path()).expect("Failed to allocate");

        assert!(first.root.ends_with("tmp/morloc_0"));
        assert!(second.root.ends_with("tmp/morloc_1"));
        assert!(first.root.is_absolute());
        assert!(!first.cache_dir.exists());
    }

    #[test]
    fn test_allocate_reuses_freed_slot() {
        let home = TempDir::new().expect("Failed to create temp dir");
        let first = Workspace::allocate(home.path()).expect("Failed to allocate");
        Workspace::allocate(home.path()).expect("Failed to allocate");

        first.remove().expect("Failed to remove");
        let again = Workspace::allocate(home.path()).expect("Failed to allocate");
        assert!(again.root.ends_with("tmp/morloc_0"));
    }

    #[test]
    fn test_explicit_path_exists() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dir = temp.path().join("out");
        fs::create_dir(&dir).expect("Failed to create dir");

        let err = Workspace::at(&dir, false).unwrap_err();
        assert!(matches!(err, Error::WorkspaceExists(_)));

        let ws = Workspace::at(&dir, true).expect("Clobber should reuse the directory");
        assert_eq!(ws.pool_path("sh"), ws.root.join("call.sh"));
    }

    #[test]
    fn test_explicit_path_missing_parent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dir = temp.path().join("no/such/parent");

        let err = Workspace::at(&dir, false).unwrap_err();
        assert!(matches!(err, Error::WorkspaceMissingParent(_)));
    }
}
