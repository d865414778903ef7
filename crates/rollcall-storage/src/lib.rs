//! Rollcall Storage - remote folder tree and document uploads
//!
//! - [`FolderResolver`]: run-scoped, single-flight folder lookup/creation
//! - [`Uploader`]: delete-then-create uploads with best-effort sharing
//! - [`DriveClient`]: Drive v3 REST implementation of `StorageProvider`
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall_storage::{DriveClient, DriveConfig, FolderResolver};
//! use std::sync::Arc;
//!
//! let drive = Arc::new(DriveClient::new(DriveConfig::default().with_access_token(token))?);
//! let folders = FolderResolver::new(drive);
//! let leaf = folders.resolve_path(&root, &["Summit", "Invitations", "Press"]).await?;
//! ```

#![warn(unreachable_pub)]

pub mod drive;
pub mod folder;
pub mod upload;

pub use drive::{escape_query_literal, DriveClient, DriveConfig};
pub use folder::{FolderKey, FolderResolver};
pub use upload::{default_view_url, Uploader};
