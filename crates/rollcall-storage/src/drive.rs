//! Drive v3 REST storage provider
//!
//! Implements [`StorageProvider`] against the Drive `files` and `permissions`
//! endpoints. Authentication is an opaque bearer token from configuration.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use rollcall_core::{
    FileId, FolderId, PermissionPolicy, RemoteFile, StorageError, StorageProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use ulid::Ulid;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Connection settings for [`DriveClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// API origin (metadata and upload endpoints share it)
    pub api_base: String,
    /// Bearer token
    pub access_token: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com".to_string(),
            access_token: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl DriveConfig {
    /// With API origin
    #[inline]
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }
}

/// Escape a value for embedding in a single-quoted Drive query literal
#[must_use]
pub fn escape_query_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Query for a non-trashed folder named exactly `name` under `parent`
#[must_use]
pub fn folder_query(parent: &FolderId, name: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false",
        escape_query_literal(name),
        escape_query_literal(parent.as_str()),
    )
}

/// Query for non-trashed objects named exactly `name` in `folder`
#[must_use]
pub fn file_query(folder: &FolderId, name: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_literal(name),
        escape_query_literal(folder.as_str()),
    )
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// HTTP client for the Drive REST API
#[derive(Debug, Clone)]
pub struct DriveClient {
    config: DriveConfig,
    client: reqwest::Client,
}

impl DriveClient {
    /// Create a client
    ///
    /// # Errors
    /// - `StorageError::Transport` if the HTTP client cannot be built
    pub fn new(config: DriveConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StorageError::Transport(format!("could not build http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_base.trim_end_matches('/'))
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/drive/v3/files",
            self.config.api_base.trim_end_matches('/')
        )
    }

    async fn list(&self, query: String) -> Result<Vec<DriveFile>, StorageError> {
        debug!(q = %query, "drive list");
        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name,webViewLink)"),
                ("spaces", "drive"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(transport)?;
        let list: FileList = decode(response).await?;
        Ok(list.files)
    }
}

#[async_trait]
impl StorageProvider for DriveClient {
    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError> {
        let files = self.list(folder_query(parent, name)).await?;
        Ok(files.into_iter().next().map(|f| FolderId::new(f.id)))
    }

    async fn create_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<FolderId, StorageError> {
        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent.as_str()],
            }))
            .send()
            .await
            .map_err(transport)?;
        let file: DriveFile = decode(response).await?;
        Ok(FolderId::new(file.id))
    }

    async fn find_files(
        &self,
        folder: &FolderId,
        name: &str,
    ) -> Result<Vec<FileId>, StorageError> {
        let files = self.list(file_query(folder, name)).await?;
        Ok(files.into_iter().map(|f| FileId::new(f.id)).collect())
    }

    async fn delete_file(&self, file: &FileId) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.files_url(), file))
            .bearer_auth(&self.config.access_token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(transport)?;
        // Already gone counts as deleted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }

    async fn create_file(
        &self,
        folder: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, StorageError> {
        let boundary = format!("rollcall-{}", Ulid::new());
        let metadata = json!({
            "name": name,
            "parents": [folder.as_str()],
            "mimeType": mime_type,
        });
        let body = multipart_related(&boundary, &metadata, mime_type, &bytes);

        let response = self
            .client
            .post(self.upload_url())
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let file: DriveFile = decode(response).await?;
        Ok(RemoteFile {
            id: FileId::new(file.id),
            web_view_link: file.web_view_link,
        })
    }

    async fn grant_read(
        &self,
        file: &FileId,
        permission: &PermissionPolicy,
    ) -> Result<(), StorageError> {
        let body = match permission {
            PermissionPolicy::Anyone => json!({ "role": "reader", "type": "anyone" }),
            PermissionPolicy::Domain { domain } => {
                json!({ "role": "reader", "type": "domain", "domain": domain })
            }
            PermissionPolicy::User { email } => {
                json!({ "role": "reader", "type": "user", "emailAddress": email })
            }
            PermissionPolicy::None => return Ok(()),
        };
        let response = self
            .client
            .post(format!("{}/{}/permissions", self.files_url(), file))
            .bearer_auth(&self.config.access_token)
            .query(&[("supportsAllDrives", "true"), ("sendNotificationEmail", "false")])
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        ensure_success(response).await.map(|_| ())
    }
}

fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Transport(e.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.map_err(transport)?;
    let message = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());
    Err(StorageError::status(status.as_u16(), message))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    ensure_success(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| StorageError::InvalidResponse(e.to_string()))
}
