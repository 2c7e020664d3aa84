//! Request-scoped working directories.
//!
//! Every artifact of a request (source, binary, datasets) lives under one
//! directory named after the request id, removed when the workspace drops.

use crate::error::{SimError, SimResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;
use uuid::Uuid;

/// File name of the parameterized source inside a workspace.
pub const SOURCE_FILE: &str = "simulation.c";

/// File name of the compiled simulator inside a workspace.
pub const BINARY_FILE: &str = "simulation";

/// Isolated directory owned by a single request.
#[derive(Debug)]
pub struct RequestWorkspace {
    request_id: Uuid,
    dir: TempDir,
}

impl RequestWorkspace {
    /// Create a fresh workspace under `root` on the blocking pool.
    pub async fn create(root: &Path, request_id: Uuid) -> SimResult<Self> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::create_blocking(&root, request_id))
            .await
            .map_err(|e| SimError::Unexpected(format!("workspace creation task failed: {e}")))?
    }

    fn create_blocking(root: &Path, request_id: Uuid) -> SimResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("malsim-{request_id}-"))
            .tempdir_in(root)
            .map_err(|e| {
                SimError::Unexpected(format!(
                    "failed to create request workspace under {}: {e}",
                    root.display()
                ))
            })?;
        Ok(Self { request_id, dir })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> PathBuf {
        self.path().join(SOURCE_FILE)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.path().join(BINARY_FILE)
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    /// A workspace that is dropped instead (error or cancelled request) is
    /// removed synchronously by `TempDir`.
    pub async fn cleanup(self) {
        let path = self.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(std::io::Error::other)
            .and_then(|closed| closed);
        if let Err(e) = result {
            warn!(
                event = "workspace.cleanup_failed",
                path = %path.display(),
                error = %e
            );
        }
    }
}
