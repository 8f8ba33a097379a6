//! Local-disk library store.
//!
//! Each user's library is `<dir>/material_lib_<fingerprint>.csv`, with a
//! `<file>.rev` sidecar counting successful writes. The version token is
//! the SHA-256 of the file contents and that counter, so rewriting the
//! same table still yields a fresh token. The check and the rename are not
//! atomic together; two processes writing the same file can still race.

use async_trait::async_trait;
use material_library_core::codec;
use material_library_core::models::Library;
use material_library_core::store::{
    LibraryStore, ReadOutcome, StoreError, VersionToken, WriteReason,
};
use material_library_core::user::UserId;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct LocalFileStore {
    dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, user: &UserId) -> PathBuf {
        self.dir.join(user.file_name())
    }

    fn revision_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.rev", user.file_name()))
    }

    /// Writes recorded for `user`. A missing or unreadable sidecar counts as 0.
    async fn revision(&self, user: &UserId) -> u64 {
        match tokio::fs::read_to_string(self.revision_path(user)).await {
            Ok(text) => text.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    async fn current_token(&self, user: &UserId) -> Result<Option<VersionToken>, StoreError> {
        match tokio::fs::read(self.path_for(user)).await {
            Ok(bytes) => Ok(Some(content_token(&bytes, self.revision(user).await))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

fn content_token(bytes: &[u8], revision: u64) -> VersionToken {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(revision.to_le_bytes());
    VersionToken::new(hex::encode(hasher.finalize()))
}

#[async_trait]
impl LibraryStore for LocalFileStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn fetch(&self, user: &UserId) -> ReadOutcome {
        let path = self.path_for(user);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return ReadOutcome::NotFound,
            Err(e) => {
                return ReadOutcome::TransportError(format!("{}: {}", path.display(), e));
            }
        };
        match codec::decode_library(&bytes) {
            Ok(library) => ReadOutcome::Found {
                library,
                token: content_token(&bytes, self.revision(user).await),
            },
            Err(e) => ReadOutcome::TransportError(format!("{}: {}", path.display(), e)),
        }
    }

    async fn write(
        &self,
        user: &UserId,
        library: &Library,
        token: Option<&VersionToken>,
        _reason: WriteReason,
    ) -> Result<VersionToken, StoreError> {
        let path = self.path_for(user);
        let current = self.current_token(user).await?;
        if current.as_ref() != token {
            return Err(StoreError::Conflict {
                file: path.display().to_string(),
            });
        }

        let bytes = codec::encode(library)?;
        let next = self.revision(user).await + 1;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write beside the target and rename so readers never see a partial file.
        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tokio::fs::write(self.revision_path(user), next.to_string()).await?;

        log::info!("local: wrote {} ({} rows, rev {})", path.display(), library.len(), next);
        Ok(content_token(&bytes, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use material_library_core::models::LibraryRecord;
    use tempfile::TempDir;

    fn user() -> UserId {
        UserId::from_fingerprint("abc12345").unwrap()
    }

    fn library(titles: &[&str]) -> Library {
        let d = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        Library::from_records(
            titles
                .iter()
                .map(|t| LibraryRecord::new(d, t, &["必修1".to_string()], "a", "s").unwrap())
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_missing_dir_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().join("nope"));
        assert_eq!(store.fetch(&user()).await, ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_round_trip_and_token_changes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().join("data"));

        let t1 = store
            .write(&user(), &library(&["a"]), None, WriteReason::Append)
            .await
            .unwrap();
        let t2 = store
            .write(&user(), &library(&["a", "b"]), Some(&t1), WriteReason::Append)
            .await
            .unwrap();
        assert_ne!(t1, t2);

        let ReadOutcome::Found { library: lib, token } = store.fetch(&user()).await else {
            panic!("expected Found");
        };
        assert_eq!(lib, library(&["a", "b"]));
        assert_eq!(token, t2);

        let bytes = std::fs::read(store.path_for(&user())).unwrap();
        assert!(bytes.starts_with(codec::UTF8_BOM));
        assert!(!store.path_for(&user()).with_extension("csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_rewriting_same_table_changes_token() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());
        let lib = library(&["a"]);

        let t1 = store
            .write(&user(), &lib, None, WriteReason::Append)
            .await
            .unwrap();
        let t2 = store
            .write(&user(), &lib, Some(&t1), WriteReason::Append)
            .await
            .unwrap();
        assert_ne!(t1, t2);

        let ReadOutcome::Found { token, .. } = store.fetch(&user()).await else {
            panic!("expected Found");
        };
        assert_eq!(token, t2);

        // A writer holding the first token is stale even though the bytes match.
        let err = store
            .write(&user(), &lib, Some(&t1), WriteReason::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_stale_token_conflicts() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());
        let t1 = store
            .write(&user(), &library(&["a"]), None, WriteReason::Append)
            .await
            .unwrap();
        store
            .write(&user(), &library(&["a", "b"]), Some(&t1), WriteReason::Append)
            .await
            .unwrap();

        let err = store
            .write(&user(), &library(&["x"]), Some(&t1), WriteReason::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let err = store
            .write(&user(), &library(&["x"]), None, WriteReason::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_legacy_file_on_disk_is_normalized() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());
        std::fs::write(
            store.path_for(&user()),
            "\u{feff}日期,素材标题,关联教材,分析结果,原文\n2023-01-01,旧素材,必修2,解析,原文本\n",
        )
        .unwrap();

        let ReadOutcome::Found { library, .. } = store.fetch(&user()).await else {
            panic!("expected Found");
        };
        let r = library.get(0).unwrap();
        assert_eq!(r.title, "旧素材");
        assert_eq!(r.linked_topics, "必修2");
        assert_eq!(r.analysis, "解析");
        assert_eq!(r.source_text, "原文本");
    }
}
