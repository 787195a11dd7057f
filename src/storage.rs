//! Local file store for uploaded payloads.
//!
//! Uploads are persisted under a fixed root directory before any remote call
//! is made, and read back from disk when submitted to the vector store. A
//! failed remote call leaves the stored copy in place for retry; nothing here
//! deletes files.

use std::path::{Component, Path, PathBuf};

use crate::error::GatewayError;
use tracing::debug;

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a logical upload name to its on-disk path. Upload names may
    /// carry subdirectories; traversal components are stripped.
    pub fn stored_path(&self, name: &str) -> Result<PathBuf, GatewayError> {
        let relative = sanitize_name(name)?;
        Ok(self.root.join(relative))
    }

    /// Write one uploaded file to durable storage, creating parent
    /// directories on demand. Returns the stored path.
    pub async fn persist(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, GatewayError> {
        let path = self.stored_path(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored upload {} ({} bytes) at {:?}", name, bytes.len(), path);
        Ok(path)
    }
}

/// Flatten an upload name to a safe relative path: normal components only,
/// no absolute prefixes, no `..`.
fn sanitize_name(name: &str) -> Result<PathBuf, GatewayError> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(GatewayError::validation(format!(
                    "Invalid file name: {}",
                    name
                )))
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(GatewayError::validation("Invalid file name"));
    }
    Ok(relative)
}
