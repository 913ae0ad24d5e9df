use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("refusing to overwrite published file {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to create output directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Hidden sibling of `final_path` used to stage a cross-filesystem copy
pub fn staging_path(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(final_path.file_name().unwrap_or_default());
    name.push(".partial");
    final_path.with_file_name(name)
}

/// Move `temp` to `final_path`, creating the destination directory if needed
///
/// Tries a plain rename first. When that fails (usually because the temp
/// directory is on another filesystem) the file is copied to a staging file
/// next to `final_path`, synced, and renamed into place, so readers never see
/// a partial file at `final_path`.
pub fn publish(temp: &Path, final_path: &Path) -> Result<(), PublishError> {
    if final_path.exists() {
        return Err(PublishError::AlreadyExists(final_path.to_path_buf()));
    }

    if let Some(dir) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PublishError::CreateDir {
            dir: dir.to_path_buf(),
            source,
        })?;
    }

    let move_err = |source| PublishError::Move {
        from: temp.to_path_buf(),
        to: final_path.to_path_buf(),
        source,
    };

    match fs::rename(temp, final_path) {
        Ok(()) => {
            debug!("Renamed {} -> {}", temp.display(), final_path.display());
            return Ok(());
        }
        Err(e) if !temp.exists() => return Err(move_err(e)),
        Err(e) => debug!("Rename failed ({}), copying instead", e),
    }

    let staging = staging_path(final_path);
    if let Err(e) = copy_synced(temp, &staging).and_then(|()| fs::rename(&staging, final_path)) {
        let _ = fs::remove_file(&staging);
        return Err(move_err(e));
    }

    if let Err(e) = fs::remove_file(temp) {
        warn!("Published {} but could not remove {}: {}", final_path.display(), temp.display(), e);
    }
    Ok(())
}

fn copy_synced(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    File::open(to)?.sync_all()
}
