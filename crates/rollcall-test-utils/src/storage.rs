//! In-memory storage provider with call counters and fault injection

use async_trait::async_trait;
use parking_lot::Mutex;
use rollcall_core::{
    FileId, FolderId, PermissionPolicy, RemoteFile, StorageError, StorageProvider,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoredFolder {
    pub id: FolderId,
    pub parent: FolderId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: FileId,
    pub folder: FolderId,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    folders: Vec<StoredFolder>,
    files: Vec<StoredFile>,
    failing_folders: HashSet<String>,
    failing_uploads: HashSet<String>,
    fail_grants: bool,
    next_id: usize,
}

/// Storage provider backed by vectors
///
/// Folder calls can be slowed down with [`MemoryStorage::with_latency`] to
/// widen race windows in concurrency tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    latency: Duration,
    folder_lookups: AtomicUsize,
    folder_creates: AtomicUsize,
    deletes: AtomicUsize,
    grants: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Folder lookups and creates for `name` fail
    pub fn fail_folder(&self, name: &str) {
        self.state.lock().failing_folders.insert(name.to_string());
    }

    /// Folder lookups for `name` succeed again
    pub fn heal_folder(&self, name: &str) {
        self.state.lock().failing_folders.remove(name);
    }

    /// Uploads of `file_name` fail
    pub fn fail_upload(&self, file_name: &str) {
        self.state.lock().failing_uploads.insert(file_name.to_string());
    }

    pub fn fail_grants(&self) {
        self.state.lock().fail_grants = true;
    }

    /// Add a pre-existing folder
    pub fn seed_folder(&self, parent: &FolderId, name: &str) -> FolderId {
        let mut state = self.state.lock();
        let id = Self::allocate(&mut state, "folder");
        state.folders.push(StoredFolder {
            id: FolderId::new(id.clone()),
            parent: parent.clone(),
            name: name.to_string(),
        });
        FolderId::new(id)
    }

    pub fn folder_lookups(&self) -> usize {
        self.folder_lookups.load(Ordering::SeqCst)
    }

    pub fn folder_creates(&self) -> usize {
        self.folder_creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn grants(&self) -> usize {
        self.grants.load(Ordering::SeqCst)
    }

    pub fn folders(&self) -> Vec<StoredFolder> {
        self.state.lock().folders.clone()
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.state.lock().files.clone()
    }

    /// Folders named `name` under `parent`
    pub fn folders_named(&self, parent: &FolderId, name: &str) -> usize {
        self.state
            .lock()
            .folders
            .iter()
            .filter(|f| &f.parent == parent && f.name == name)
            .count()
    }

    pub fn files_in(&self, folder: &FolderId) -> Vec<StoredFile> {
        self.state
            .lock()
            .files
            .iter()
            .filter(|f| &f.folder == folder)
            .cloned()
            .collect()
    }

    fn allocate(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_folder(&self, name: &str) -> Result<(), StorageError> {
        if self.state.lock().failing_folders.contains(name) {
            return Err(StorageError::status(500, format!("folder backend error for '{name}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError> {
        self.folder_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_folder(name)?;
        Ok(self
            .state
            .lock()
            .folders
            .iter()
            .find(|f| &f.parent == parent && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<FolderId, StorageError> {
        self.folder_creates.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_folder(name)?;
        let mut state = self.state.lock();
        let id = FolderId::new(Self::allocate(&mut state, "folder"));
        state.folders.push(StoredFolder {
            id: id.clone(),
            parent: parent.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn find_files(
        &self,
        folder: &FolderId,
        name: &str,
    ) -> Result<Vec<FileId>, StorageError> {
        Ok(self
            .state
            .lock()
            .files
            .iter()
            .filter(|f| &f.folder == folder && f.name == name)
            .map(|f| f.id.clone())
            .collect())
    }

    async fn delete_file(&self, file: &FileId) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.state.lock().files.retain(|f| &f.id != file);
        Ok(())
    }

    async fn create_file(
        &self,
        folder: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, StorageError> {
        let mut state = self.state.lock();
        if state.failing_uploads.contains(name) {
            return Err(StorageError::status(507, "storage quota exceeded"));
        }
        let id = FileId::new(Self::allocate(&mut state, "file"));
        state.files.push(StoredFile {
            id: id.clone(),
            folder: folder.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        });
        Ok(RemoteFile {
            web_view_link: Some(format!("https://files.test/{id}")),
            id,
        })
    }

    async fn grant_read(
        &self,
        _file: &FileId,
        _permission: &PermissionPolicy,
    ) -> Result<(), StorageError> {
        self.grants.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().fail_grants {
            return Err(StorageError::status(403, "sharing disabled by policy"));
        }
        Ok(())
    }
}
