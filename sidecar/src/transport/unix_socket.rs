//! Local socket preparation and cleanup

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::error::ServeError;

/// Owner and group can read and write.
pub const SOCKET_MODE: u32 = 0o660;

/// Remove a socket file left behind by a previous run.
///
/// A missing file is fine; any other failure is fatal for the caller.
pub fn remove_stale_socket(path: &Path) -> Result<(), ServeError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ServeError::RemoveStaleSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Prepare `path` and bind a listener on it.
///
/// Must be called from within a tokio runtime.
pub fn bind(path: &Path) -> Result<UnixListener, ServeError> {
    remove_stale_socket(path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        info!(path = %parent.display(), "Creating socket directory");
        fs::create_dir_all(parent).map_err(|source| ServeError::CreateSocketDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let listener = UnixListener::bind(path).map_err(|source| ServeError::Bind {
        endpoint: format!("unix://{}", path.display()),
        source,
    })?;

    fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE)).map_err(|source| {
        ServeError::SocketPermissions {
            path: path.to_path_buf(),
            source,
        }
    })?;

    Ok(listener)
}

/// Remove the socket file once serving has ended.
pub fn cleanup(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "Cleaned up socket file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to clean up socket file"),
    }
}
