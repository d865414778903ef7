//! Replace-by-name uploads
//!
//! [`Uploader`] keeps at most one live object per `(folder, file name)`:
//! same-named objects are deleted before the new one is created. Read access
//! is granted afterwards on a best-effort basis.

use crate::folder::FolderResolver;
use rollcall_core::{
    FileId, FolderId, PermissionPolicy, RenderedDocument, StorageError, StorageProvider,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Browser URL for an object when the provider does not return one
#[must_use]
pub fn default_view_url(file: &FileId) -> String {
    format!("https://drive.google.com/file/d/{file}/view")
}

/// Pushes rendered documents into remote folders
#[derive(Clone)]
pub struct Uploader {
    provider: Arc<dyn StorageProvider>,
    folders: Arc<FolderResolver>,
    permission: PermissionPolicy,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("folders", &self.folders)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

impl Uploader {
    /// Create uploader sharing the run's folder resolver
    #[must_use]
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        folders: Arc<FolderResolver>,
        permission: PermissionPolicy,
    ) -> Self {
        Self {
            provider,
            folders,
            permission,
        }
    }

    /// Folder resolver used for target directories
    #[inline]
    #[must_use]
    pub fn folders(&self) -> &Arc<FolderResolver> {
        &self.folders
    }

    /// Resolve `folder_name` under `parent`, then upload into it
    ///
    /// # Errors
    /// Folder resolution and upload failures are returned unchanged.
    pub async fn upload_into(
        &self,
        parent: &FolderId,
        folder_name: &str,
        file_name: &str,
        document: RenderedDocument,
    ) -> Result<String, StorageError> {
        let folder = self.folders.resolve(parent, folder_name).await?;
        self.upload(&folder, file_name, document).await
    }

    /// Upload `document` as `file_name` in `folder`, replacing same-named objects
    ///
    /// Returns the access URL of the new object.
    ///
    /// # Errors
    /// - Any list, delete or create failure. Permission failures are logged only.
    pub async fn upload(
        &self,
        folder: &FolderId,
        file_name: &str,
        document: RenderedDocument,
    ) -> Result<String, StorageError> {
        let stale = self.provider.find_files(folder, file_name).await?;
        for file in &stale {
            debug!(folder = %folder, file = %file, name = file_name, "deleting previous version");
            self.provider.delete_file(file).await?;
        }

        let created = self
            .provider
            .create_file(folder, file_name, document.mime_type, document.bytes)
            .await?;

        if self.permission != PermissionPolicy::None {
            if let Err(e) = self.provider.grant_read(&created.id, &self.permission).await {
                warn!(file = %created.id, error = %e, "could not grant read permission");
            }
        }

        Ok(created
            .web_view_link
            .unwrap_or_else(|| default_view_url(&created.id)))
    }
}
