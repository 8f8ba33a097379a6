//! Append and delete against a [`LibraryStore`].
//!
//! Both operations rewrite the whole file. There is no lock: the only
//! guard is the store's version-token check, and a failed conditional write
//! is returned to the caller, never retried.
//!
//! # Known limitations
//!
//! - [`append_record`] builds the new table from one read and takes the
//!   write token from a second read just before writing. A concurrent
//!   writer that commits between those two reads is silently overwritten
//!   (last writer wins at file level).
//! - [`delete_at`] addresses rows by position. A caller holding a stale
//!   view can remove a different row than the one it displayed, and every
//!   deletion shifts the positions of later rows.
//! - A read failure is indistinguishable from an empty library here, so an
//!   append that follows a failed first read but a successful second read
//!   replaces the stored rows with the single new one.

use crate::models::{Library, LibraryRecord};
use crate::store::{read_library, LibraryStore, StoreError, WriteReason};
use crate::user::UserId;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no record at position {position} (library has {len} records)")]
    PositionOutOfRange { position: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Append `record` as the last row of the user's library.
///
/// Returns the library as written.
pub async fn append_record(
    store: &dyn LibraryStore,
    user: &UserId,
    record: LibraryRecord,
) -> Result<Library, MergeError> {
    let (mut library, _) = read_library(store, user).await;
    library.push(record);

    // Re-read for the freshest token right before committing.
    let (_, token) = read_library(store, user).await;
    store
        .write(user, &library, token.as_ref(), WriteReason::Append)
        .await?;

    log::info!(
        "{}: appended record for user {} ({} rows)",
        store.backend(),
        user,
        library.len()
    );
    Ok(library)
}

/// Remove the row at zero-based `position` and return the library as written.
///
/// Always reads the store afresh; never pass a cached view's position
/// without accepting it may have shifted.
pub async fn delete_at(
    store: &dyn LibraryStore,
    user: &UserId,
    position: usize,
) -> Result<Library, MergeError> {
    let (mut library, token) = read_library(store, user).await;
    let len = library.len();
    if library.remove(position).is_none() {
        return Err(MergeError::PositionOutOfRange { position, len });
    }

    store
        .write(user, &library, token.as_ref(), WriteReason::Delete)
        .await?;

    log::info!(
        "{}: deleted record {} for user {} ({} rows)",
        store.backend(),
        position,
        user,
        library.len()
    );
    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::{ReadOutcome, VersionToken};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user() -> UserId {
        UserId::from_fingerprint("abc12345").unwrap()
    }

    fn record(title: &str) -> LibraryRecord {
        let d = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        LibraryRecord::new(d, title, &["必修1".to_string()], "a", "s").unwrap()
    }

    fn titles(lib: &Library) -> Vec<String> {
        lib.records().iter().map(|r| r.title.clone()).collect()
    }

    async fn stored(store: &InMemoryStore) -> Library {
        read_library(store, &user()).await.0
    }

    #[tokio::test]
    async fn test_end_to_end_append_then_delete() {
        let store = InMemoryStore::new();
        let d = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let rec = LibraryRecord::new(
            d,
            "Material A",
            &["Book1".to_string(), "Book2".to_string()],
            "core **idea** here",
            "pasted source",
        )
        .unwrap();

        append_record(&store, &user(), rec).await.unwrap();
        let lib = stored(&store).await;
        assert_eq!(lib.len(), 1);
        let r = lib.get(0).unwrap();
        assert_eq!(r.analysis, "core <mark>idea</mark> here");
        assert_eq!(r.linked_topics, "Book1 | Book2");

        delete_at(&store, &user(), 0).await.unwrap();
        assert_eq!(stored(&store).await.len(), 0);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryStore::new();
        for t in ["a", "b", "c"] {
            append_record(&store, &user(), record(t)).await.unwrap();
        }
        assert_eq!(titles(&stored(&store).await), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_append_to_legacy_file_rewrites_canonical() {
        let store = InMemoryStore::new();
        store.seed(&user(), "素材标题,精修解析\nold,x\n".as_bytes().to_vec());
        append_record(&store, &user(), record("new")).await.unwrap();

        let raw = String::from_utf8(store.raw(&user()).unwrap()).unwrap();
        assert!(raw.contains("日期,标题,涉及教材,考点设问,素材原文"));
        assert!(!raw.contains("素材标题"));
        assert_eq!(titles(&stored(&store).await), vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_delete_shifts_later_rows() {
        let store = InMemoryStore::new();
        for t in ["a", "b", "c"] {
            append_record(&store, &user(), record(t)).await.unwrap();
        }
        delete_at(&store, &user(), 1).await.unwrap();
        assert_eq!(titles(&stored(&store).await), vec!["a", "c"]);

        // Same position now targets the row that used to be at 2.
        delete_at(&store, &user(), 1).await.unwrap();
        assert_eq!(titles(&stored(&store).await), vec!["a"]);
    }

    #[tokio::test]
    async fn test_delete_out_of_range() {
        let store = InMemoryStore::new();
        append_record(&store, &user(), record("a")).await.unwrap();
        let err = delete_at(&store, &user(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            MergeError::PositionOutOfRange {
                position: 3,
                len: 1
            }
        ));
        assert_eq!(stored(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        struct RejectingStore(InMemoryStore);

        #[async_trait]
        impl LibraryStore for RejectingStore {
            fn backend(&self) -> &str {
                "rejecting"
            }
            async fn fetch(&self, user: &UserId) -> ReadOutcome {
                self.0.fetch(user).await
            }
            async fn write(
                &self,
                _user: &UserId,
                _library: &Library,
                _token: Option<&VersionToken>,
                _reason: WriteReason,
            ) -> Result<VersionToken, StoreError> {
                Err(StoreError::Transport("connection reset".to_string()))
            }
        }

        let store = RejectingStore(InMemoryStore::new());
        let err = append_record(&store, &user(), record("a")).await.unwrap_err();
        assert!(matches!(err, MergeError::Store(StoreError::Transport(_))));
        assert!(store.0.raw(&user()).is_none());
    }

    /// Store wrapper that lets another session commit an append between
    /// this session's first read and its token re-read.
    struct InterleavingStore {
        inner: InMemoryStore,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LibraryStore for InterleavingStore {
        fn backend(&self) -> &str {
            "interleaving"
        }

        async fn fetch(&self, user: &UserId) -> ReadOutcome {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 1 {
                append_record(&self.inner, user, record("other session"))
                    .await
                    .unwrap();
            }
            self.inner.fetch(user).await
        }

        async fn write(
            &self,
            user: &UserId,
            library: &Library,
            token: Option<&VersionToken>,
            reason: WriteReason,
        ) -> Result<VersionToken, StoreError> {
            self.inner.write(user, library, token, reason).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_append_loses_a_row() {
        let inner = InMemoryStore::new();
        append_record(&inner, &user(), record("existing"))
            .await
            .unwrap();
        let store = InterleavingStore {
            inner,
            fetches: AtomicUsize::new(0),
        };

        // The token re-read sees the other session's commit, so the
        // conditional write succeeds and overwrites it.
        append_record(&store, &user(), record("this session"))
            .await
            .unwrap();
        assert_eq!(
            titles(&stored(&store.inner).await),
            vec!["existing", "this session"]
        );
    }

    /// Reports a transport error on the first fetch only.
    struct FirstReadFailsStore {
        inner: InMemoryStore,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LibraryStore for FirstReadFailsStore {
        fn backend(&self) -> &str {
            "first-read-fails"
        }

        async fn fetch(&self, user: &UserId) -> ReadOutcome {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                return ReadOutcome::TransportError("connection reset".to_string());
            }
            self.inner.fetch(user).await
        }

        async fn write(
            &self,
            user: &UserId,
            library: &Library,
            token: Option<&VersionToken>,
            reason: WriteReason,
        ) -> Result<VersionToken, StoreError> {
            self.inner.write(user, library, token, reason).await
        }
    }

    #[tokio::test]
    async fn test_failed_first_read_replaces_stored_rows() {
        let inner = InMemoryStore::new();
        append_record(&inner, &user(), record("existing one"))
            .await
            .unwrap();
        append_record(&inner, &user(), record("existing two"))
            .await
            .unwrap();
        let store = FirstReadFailsStore {
            inner,
            fetches: AtomicUsize::new(0),
        };

        // The first read looks empty, the token read succeeds, so the
        // conditional write goes through with only the new row.
        let lib = append_record(&store, &user(), record("new")).await.unwrap();
        assert_eq!(titles(&lib), vec!["new"]);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(titles(&stored(&store.inner).await), vec!["new"]);
    }

    #[tokio::test]
    async fn test_failed_reads_on_existing_file_conflict() {
        let store = InMemoryStore::new();
        append_record(&store, &user(), record("existing"))
            .await
            .unwrap();
        store.set_fail_reads(true);

        // Both reads fail, so the write carries no token and the store
        // refuses to create over the existing file.
        let err = append_record(&store, &user(), record("new")).await.unwrap_err();
        assert!(matches!(err, MergeError::Store(StoreError::Conflict { .. })));
        store.set_fail_reads(false);
        assert_eq!(titles(&stored(&store).await), vec!["existing"]);
    }
}
