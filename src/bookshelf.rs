//! Reference-document listing.
//!
//! The input form offers the names of the reference documents (textbooks)
//! as its topic vocabulary. Names are taken from a directory, either on
//! local disk or inside the GitHub repository, filtered to the configured
//! extension (case-insensitive), stripped of the extension and any
//! configured boilerplate, and sorted.
//!
//! A missing or unreadable directory, or one with no matching documents,
//! yields the configured fallback vocabulary so the form stays usable.

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::BookshelfConfig;
use crate::store_github::GitHubStore;

/// Where the document names come from.
pub enum ShelfSource {
    Local(PathBuf),
    GitHub { store: Arc<GitHubStore>, dir: String },
}

pub struct Bookshelf {
    source: ShelfSource,
    config: BookshelfConfig,
}

impl Bookshelf {
    pub fn new(source: ShelfSource, config: BookshelfConfig) -> Self {
        Self { source, config }
    }

    /// Sorted topic labels, or the fallback vocabulary.
    pub async fn list_topics(&self) -> Vec<String> {
        let names = match &self.source {
            ShelfSource::Local(dir) => list_local(dir),
            ShelfSource::GitHub { store, dir } => {
                store.list_directory(dir).await.map_err(anyhow::Error::from)
            }
        };
        let names = match names {
            Ok(n) => n,
            Err(e) => {
                log::warn!("bookshelf: cannot list documents, using fallback: {:#}", e);
                return self.config.fallback.clone();
            }
        };
        match topic_labels(names, &self.config) {
            Ok(labels) if !labels.is_empty() => labels,
            Ok(_) => self.config.fallback.clone(),
            Err(e) => {
                log::warn!("bookshelf: bad extension pattern, using fallback: {:#}", e);
                self.config.fallback.clone()
            }
        }
    }
}

/// File names directly inside `dir`.
fn list_local(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}

fn extension_matcher(extension: &str) -> Result<GlobMatcher> {
    let pattern = format!("*.{}", extension.trim_start_matches('.'));
    Ok(GlobBuilder::new(&pattern)
        .case_insensitive(true)
        .build()?
        .compile_matcher())
}

/// Turn raw file names into sorted, de-duplicated topic labels.
pub fn topic_labels(names: Vec<String>, config: &BookshelfConfig) -> Result<Vec<String>> {
    let matcher = extension_matcher(&config.extension)?;
    let mut labels: Vec<String> = names
        .into_iter()
        .filter(|n| matcher.is_match(n))
        .map(|n| {
            let stem = match n.rfind('.') {
                Some(i) => &n[..i],
                None => n.as_str(),
            };
            let mut label = stem.to_string();
            for boilerplate in &config.strip {
                if !boilerplate.is_empty() {
                    label = label.replace(boilerplate.as_str(), "");
                }
            }
            label.trim().to_string()
        })
        .filter(|l| !l.is_empty())
        .collect();
    labels.sort();
    labels.dedup();
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> BookshelfConfig {
        BookshelfConfig {
            strip: vec!["普通高中教科书".to_string()],
            ..BookshelfConfig::default()
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_labels_filter_strip_and_sort() {
        let labels = topic_labels(
            names(&["必修2.PDF", "notes.txt", "普通高中教科书 必修1.pdf", "选修1 .pdf"]),
            &config(),
        )
        .unwrap();
        assert_eq!(labels, vec!["必修1", "必修2", "选修1"]);
    }

    #[test]
    fn test_labels_dedup() {
        let labels = topic_labels(names(&["A.pdf", "A.PDF"]), &config()).unwrap();
        assert_eq!(labels, vec!["A"]);
    }

    #[tokio::test]
    async fn test_missing_directory_returns_fallback() {
        let tmp = TempDir::new().unwrap();
        let shelf = Bookshelf::new(ShelfSource::Local(tmp.path().join("absent")), config());
        let topics = shelf.list_topics().await;
        assert_eq!(topics, vec!["必修1", "必修2", "必修3", "必修4"]);
        assert_eq!(shelf.list_topics().await, topics);
    }

    #[tokio::test]
    async fn test_local_directory_listing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("经济与社会.pdf"), b"%PDF").unwrap();
        std::fs::write(tmp.path().join("哲学与文化.PDF"), b"%PDF").unwrap();
        std::fs::write(tmp.path().join("readme.md"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("sub.pdf")).unwrap();

        let shelf = Bookshelf::new(ShelfSource::Local(tmp.path().to_path_buf()), config());
        let mut expected = vec!["哲学与文化".to_string(), "经济与社会".to_string()];
        expected.sort();
        assert_eq!(shelf.list_topics().await, expected);
    }

    #[tokio::test]
    async fn test_directory_without_documents_returns_fallback() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("readme.md"), b"x").unwrap();
        let shelf = Bookshelf::new(ShelfSource::Local(tmp.path().to_path_buf()), config());
        assert_eq!(shelf.list_topics().await, config().fallback);
    }
}
