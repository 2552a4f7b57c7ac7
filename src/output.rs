//! Output publishing for generated sources.
//!
//! Writes go through a temporary file next to the destination followed by a
//! rename, so readers never observe a half-written file.
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Atomically replace `dest` with `contents`.
pub fn write_atomic(dest: &Path, contents: &str) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".generate-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", tmp.path().display()))?;
    match fs::metadata(dest) {
        Ok(meta) => tmp
            .as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("copy permissions of {}", dest.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => set_default_permissions(tmp.as_file())?,
        Err(err) => return Err(err).with_context(|| format!("stat {}", dest.display())),
    }
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
        .context("set output permissions")
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &fs::File) -> Result<()> {
    Ok(())
}

/// Whether `dest` already holds exactly `contents`.
pub fn is_up_to_date(dest: &Path, contents: &str) -> Result<bool> {
    match fs::read(dest) {
        Ok(existing) => Ok(existing == contents.as_bytes()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("read {}", dest.display())),
    }
}
