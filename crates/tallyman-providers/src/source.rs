//! Document intake from a local directory

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tallyman_domain::traits::DocumentSource;
use tallyman_domain::IntakeError;

/// Resolves handles as paths relative to a root directory
///
/// Handles that try to escape the root are refused as permission errors.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, handle: &str) -> Result<PathBuf, IntakeError> {
        let relative = Path::new(handle);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if handle.is_empty() || escapes {
            return Err(IntakeError::PermissionDenied(format!(
                "handle '{}' is outside the document root",
                handle
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn fetch(&self, handle: &str) -> Result<Vec<u8>, IntakeError> {
        let path = self.resolve(handle)?;
        tokio::fs::read(&path).await.map_err(|e| {
            let detail = format!("{}: {}", path.display(), e);
            match e.kind() {
                ErrorKind::NotFound => IntakeError::NotFound(detail),
                ErrorKind::PermissionDenied => IntakeError::PermissionDenied(detail),
                _ => IntakeError::Transient(detail),
            }
        })
    }
}
