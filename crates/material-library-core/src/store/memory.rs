//! In-memory [`LibraryStore`] for tests.
//!
//! Files are kept as encoded CSV bytes so every read goes through the same
//! decode and normalize path as the real backends. Tokens are issued from a
//! write counter. Reads can be switched to fail to simulate an unreachable
//! store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::codec;
use crate::models::Library;
use crate::user::UserId;

use super::{LibraryStore, ReadOutcome, StoreError, VersionToken, WriteReason};

struct StoredFile {
    bytes: Vec<u8>,
    token: VersionToken,
}

/// In-memory store with conditional writes.
pub struct InMemoryStore {
    files: RwLock<HashMap<String, StoredFile>>,
    revision: AtomicU64,
    fail_reads: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(0),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Install raw file contents for `user`, e.g. a legacy-format CSV.
    pub fn seed(&self, user: &UserId, bytes: Vec<u8>) -> VersionToken {
        let token = self.next_token();
        self.files.write().unwrap().insert(
            user.file_name(),
            StoredFile {
                bytes,
                token: token.clone(),
            },
        );
        token
    }

    /// Raw stored bytes for `user`.
    pub fn raw(&self, user: &UserId) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(&user.file_name())
            .map(|f| f.bytes.clone())
    }

    /// Make subsequent reads return [`ReadOutcome::TransportError`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn next_token(&self) -> VersionToken {
        let n = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        VersionToken::new(format!("rev-{}", n))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LibraryStore for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, user: &UserId) -> ReadOutcome {
        if self.fail_reads.load(Ordering::SeqCst) {
            return ReadOutcome::TransportError("simulated read failure".to_string());
        }
        let files = self.files.read().unwrap();
        let Some(file) = files.get(&user.file_name()) else {
            return ReadOutcome::NotFound;
        };
        match codec::decode_library(&file.bytes) {
            Ok(library) => ReadOutcome::Found {
                library,
                token: file.token.clone(),
            },
            Err(e) => ReadOutcome::TransportError(e.to_string()),
        }
    }

    async fn write(
        &self,
        user: &UserId,
        library: &Library,
        token: Option<&VersionToken>,
        _reason: WriteReason,
    ) -> Result<VersionToken, StoreError> {
        let bytes = codec::encode(library)?;
        let name = user.file_name();
        let mut files = self.files.write().unwrap();

        let current = files.get(&name).map(|f| &f.token);
        if current != token {
            return Err(StoreError::Conflict { file: name });
        }

        let new_token = self.next_token();
        files.insert(
            name,
            StoredFile {
                bytes,
                token: new_token.clone(),
            },
        );
        Ok(new_token)
    }
}
