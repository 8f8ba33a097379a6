//! Per-interaction session context.
//!
//! A [`Session`] carries the user's credential and fingerprint and is
//! passed explicitly to every operation, so several users served by one
//! process never share state. It also keeps the last library it read for
//! display; that copy is dropped on every successful write and is never
//! used to resolve a delete.

use anyhow::{bail, Result};
use material_library_core::merge::{self, MergeError};
use material_library_core::models::{Library, LibraryRecord};
use material_library_core::store::{read_library, LibraryStore};
use material_library_core::user::UserId;
use std::fmt;

use crate::analysis::{self, AnalysisError, AnalysisRequest};
use crate::config::LlmConfig;
use crate::llm::ChatClient;

/// Shortest API key accepted at login.
pub const MIN_CREDENTIAL_LEN: usize = 11;

/// An LLM API key, held only in memory.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.chars().count() < MIN_CREDENTIAL_LEN {
            bail!(
                "API key is too short (expected at least {} characters)",
                MIN_CREDENTIAL_LEN
            );
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug)]
pub struct Session {
    user: UserId,
    credential: Option<Credential>,
    view: Option<Library>,
}

impl Session {
    /// Log in with an API key; the fingerprint is derived from it.
    pub fn login(api_key: &str) -> Result<Self> {
        let credential = Credential::new(api_key)?;
        Ok(Self {
            user: UserId::from_credential(credential.expose()),
            credential: Some(credential),
            view: None,
        })
    }

    /// Open a session for a known fingerprint. Analysis needs a credential.
    pub fn for_user(user: UserId, credential: Option<Credential>) -> Self {
        Self {
            user,
            credential,
            view: None,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn file_name(&self) -> String {
        self.user.file_name()
    }

    /// Last library read by this session, if still valid.
    pub fn cached_view(&self) -> Option<&Library> {
        self.view.as_ref()
    }

    /// Read the library fresh from the store and remember it for display.
    pub async fn load(&mut self, store: &dyn LibraryStore) -> &Library {
        let (library, _) = read_library(store, &self.user).await;
        self.view.insert(library)
    }

    /// Ask the model for an analysis draft.
    pub async fn analyze(
        &self,
        config: &LlmConfig,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(AnalysisError::MissingCredential)?;
        let client = ChatClient::new(config, credential.expose())?;
        analysis::analyze(&client, request).await
    }

    /// Append `record` and return the library as written.
    pub async fn save(
        &mut self,
        store: &dyn LibraryStore,
        record: LibraryRecord,
    ) -> Result<&Library, MergeError> {
        self.view = None;
        let library = merge::append_record(store, &self.user, record).await?;
        Ok(self.view.insert(library))
    }

    /// Delete the row at `position` as currently stored.
    pub async fn delete(
        &mut self,
        store: &dyn LibraryStore,
        position: usize,
    ) -> Result<&Library, MergeError> {
        self.view = None;
        let library = merge::delete_at(store, &self.user, position).await?;
        Ok(self.view.insert(library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use material_library_core::store::memory::InMemoryStore;

    fn record(title: &str) -> LibraryRecord {
        let d = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        LibraryRecord::new(d, title, &["必修1".to_string()], "a", "s").unwrap()
    }

    #[test]
    fn test_login_rejects_short_keys() {
        assert!(Session::login("short").is_err());
        let s = Session::login("sk-0123456789abcdef").unwrap();
        assert_eq!(s.user(), &UserId::from_credential("sk-0123456789abcdef"));
        assert!(!format!("{:?}", s).contains("0123456789"));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let store = InMemoryStore::new();
        let mut a = Session::login("sk-aaaaaaaaaaaaaaaa").unwrap();
        let mut b = Session::login("sk-bbbbbbbbbbbbbbbb").unwrap();

        a.save(&store, record("from a")).await.unwrap();
        assert_eq!(b.load(&store).await.len(), 0);
        assert_eq!(a.load(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_ignores_stale_view() {
        let store = InMemoryStore::new();
        let user = UserId::from_fingerprint("abc12345").unwrap();
        let mut viewer = Session::for_user(user.clone(), None);
        let mut writer = Session::for_user(user, None);

        writer.save(&store, record("a")).await.unwrap();
        assert_eq!(viewer.load(&store).await.len(), 1);

        writer.save(&store, record("b")).await.unwrap();
        // The viewer's cached copy is stale but the delete re-reads the store.
        let lib = viewer.delete(&store, 1).await.unwrap();
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get(0).unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_failed_write_clears_view() {
        let store = InMemoryStore::new();
        let mut s = Session::for_user(UserId::from_fingerprint("abc12345").unwrap(), None);
        s.load(&store).await;
        assert!(s.cached_view().is_some());
        assert!(s.delete(&store, 0).await.is_err());
        assert!(s.cached_view().is_none());
    }

    #[tokio::test]
    async fn test_analyze_without_credential() {
        let s = Session::for_user(UserId::from_fingerprint("abc12345").unwrap(), None);
        let req = AnalysisRequest {
            title: "T".to_string(),
            source_text: "s".to_string(),
            topics: vec!["A".to_string()],
        };
        assert!(matches!(
            s.analyze(&LlmConfig::default(), &req).await,
            Err(AnalysisError::MissingCredential)
        ));
    }
}
