/// Per-job workspace directories under the system temp root
use crate::types::Result;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Prefix for every job directory; cleanup tooling keys off it.
const DIR_PREFIX: &str = "dcodex_run_";

/// A unique per-job directory holding source and compiled artifacts.
///
/// The workspace is a scoped resource: callers get removal on every exit
/// path through `Drop`, and may call `remove` earlier. Removal failures
/// are logged and ignored, since the job has already been served.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a fresh directory with a random suffix, owner-only where
    /// supported.
    pub fn create() -> Result<Self> {
        let root = std::env::temp_dir().join(format!("{}{}", DIR_PREFIX, Uuid::new_v4().simple()));
        fs::create_dir(&root)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&root, fs::Permissions::from_mode(0o700))?;
        }

        info!("created workspace {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes a file under the workspace, truncating any previous content.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Recursively removes the directory. Idempotent.
    pub fn remove(&self) {
        if !self.root.exists() {
            return;
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => info!("removed workspace {}", self.root.display()),
            Err(err) => warn!("failed to remove workspace {}: {}", self.root.display(), err),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
