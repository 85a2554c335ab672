//! Atomic file write helpers.
//!
//! Writes go to a temp file in the destination directory and are renamed into
//! place, so readers see either the old content or the new, never a torn file.
//! On Windows, rename-over-existing fails, so the old file is moved to `.bak`
//! first and restored if the second rename fails too.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Inherit the default umask.
    #[default]
    Default,
    /// Owner-only read/write (0o600 on Unix). Used for connection secrets.
    OwnerOnly,
}

impl PersistMode {
    #[cfg(unix)]
    fn unix_mode(self) -> Option<u32> {
        match self {
            Self::Default => None,
            Self::OwnerOnly => Some(0o600),
        }
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8], mode: PersistMode) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    #[cfg(unix)]
    if let Some(mode) = mode.unix_mode() {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }

    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = path.with_extension("bak");
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;
        if let Err(retry) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(retry.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!(
                path = %backup.display(),
                "Failed to remove .bak after atomic write: {e}"
            );
        }
    }

    Ok(())
}

/// Creates `dir` (and parents) and restricts it to the owner on Unix.
pub fn ensure_private_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
