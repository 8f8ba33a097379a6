//! Storage abstraction for user libraries.
//!
//! Each user's library is a single flat file, rewritten in full on every
//! change. Backends issue an opaque [`VersionToken`] on read and accept it
//! back on write as an optimistic-concurrency check:
//!
//! - token supplied → update only if the stored file still has that token;
//! - no token → create only if the file does not exist yet.
//!
//! Violations surface as [`StoreError::Conflict`]. Nothing is retried.
//!
//! Reads return a three-way [`ReadOutcome`] so that "no file yet" and
//! "could not reach the store" stay distinguishable. [`read_library`]
//! collapses both to an empty library for callers, logging the latter.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::codec::CodecError;
use crate::models::Library;
use crate::user::UserId;

/// Opaque version token issued by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of fetching a user's library file.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The file exists and parsed; the library is already normalized.
    Found {
        library: Library,
        token: VersionToken,
    },
    /// The store has no file for this user.
    NotFound,
    /// The store could not be read: network, auth, or an unparseable file.
    TransportError(String),
}

/// Why a write is being made. Backends that keep history use it to label
/// the revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    Append,
    Delete,
}

impl WriteReason {
    /// Revision message. A write without a token creates the file.
    pub fn message(self, token: Option<&VersionToken>) -> &'static str {
        match (token, self) {
            (None, _) => "Init",
            (Some(_), WriteReason::Append) => "Save",
            (Some(_), WriteReason::Delete) => "Delete",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("version conflict on {file}: it changed since it was read")]
    Conflict { file: String },

    #[error("store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("failed to encode library: {0}")]
    Encoding(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A backend holding one flat file per user.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`backend`](LibraryStore::backend) | Short name for logs (`"local"`, `"github"`, …) |
/// | [`fetch`](LibraryStore::fetch) | Read and normalize the user's file |
/// | [`write`](LibraryStore::write) | Replace the file, conditional on `token` |
#[async_trait]
pub trait LibraryStore: Send + Sync {
    fn backend(&self) -> &str;

    async fn fetch(&self, user: &UserId) -> ReadOutcome;

    /// Replace the user's file with `library`, returning the new token.
    async fn write(
        &self,
        user: &UserId,
        library: &Library,
        token: Option<&VersionToken>,
        reason: WriteReason,
    ) -> Result<VersionToken, StoreError>;
}

/// Read a library, treating a missing or unreadable file as empty.
pub async fn read_library(
    store: &dyn LibraryStore,
    user: &UserId,
) -> (Library, Option<VersionToken>) {
    match store.fetch(user).await {
        ReadOutcome::Found { library, token } => (library, Some(token)),
        ReadOutcome::NotFound => {
            log::debug!("{}: no library file for user {}", store.backend(), user);
            (Library::new(), None)
        }
        ReadOutcome::TransportError(cause) => {
            log::warn!(
                "{}: failed to read library for user {}, treating it as empty: {}",
                store.backend(),
                user,
                cause
            );
            (Library::new(), None)
        }
    }
}
