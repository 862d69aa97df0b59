//! Tolerant loading and durable saving of small JSON state documents.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use {
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
};

use crate::error::{Context, Error, Result};

/// Read `path` as JSON, falling back to `T::default()` when it is missing,
/// unreadable or corrupt. Never fails.
///
/// A corrupt file is copied to `<path>.corrupt` before the default is
/// returned, so the next save does not destroy the evidence.
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "state file missing, using default");
            return T::default();
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read state file, using default");
            return T::default();
        },
    };

    if data.trim().is_empty() {
        return T::default();
    }

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            let backup = sibling(path, "corrupt");
            if let Err(copy_err) = fs::copy(path, &backup) {
                warn!(path = %backup.display(), error = %copy_err, "failed to preserve corrupt state file");
            }
            warn!(
                path = %path.display(),
                error = %e,
                "corrupt state file, using default"
            );
            T::default()
        },
    }
}

/// Replace `path` with `value` serialized as pretty JSON.
///
/// Writes to a temp file, fsyncs it, renames it over the target and fsyncs
/// the directory, holding an advisory lock on `<path>.lock` so the daemon and
/// CLI never interleave writes. Returns only once the data is on stable
/// storage.
pub fn write_durable<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("create state dir {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(value)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(sibling(path, "lock"))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock
        .write()
        .map_err(|e| Error::lock_failed(format!("{}: {e}", path.display())))?;

    let tmp = sibling(path, "tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("replace {}", path.display()))?;
    sync_dir(parent)?;
    Ok(())
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
