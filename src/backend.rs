//! Store and bookshelf selection from configuration.

use anyhow::{Context, Result};
use material_library_core::store::LibraryStore;
use std::sync::Arc;

use crate::bookshelf::{Bookshelf, ShelfSource};
use crate::config::Config;
use crate::store_github::GitHubStore;
use crate::store_local::LocalFileStore;

/// The configured library store plus the matching bookshelf.
pub struct Backend {
    pub store: Arc<dyn LibraryStore>,
    pub bookshelf: Bookshelf,
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.store.backend.as_str() {
            "github" => {
                let gh = config
                    .store
                    .github
                    .as_ref()
                    .context("[store.github] must be configured for the github backend")?;
                let store = Arc::new(GitHubStore::from_config(gh)?);
                let dir = config
                    .bookshelf
                    .dir
                    .to_string_lossy()
                    .trim_start_matches("./")
                    .to_string();
                Ok(Self {
                    store: store.clone(),
                    bookshelf: Bookshelf::new(
                        ShelfSource::GitHub { store, dir },
                        config.bookshelf.clone(),
                    ),
                })
            }
            _ => Ok(Self::local(config)),
        }
    }

    /// Local-disk backend regardless of `store.backend`.
    pub fn local(config: &Config) -> Self {
        Self {
            store: Arc::new(LocalFileStore::new(&config.store.dir)),
            bookshelf: Bookshelf::new(
                ShelfSource::Local(config.bookshelf.dir.clone()),
                config.bookshelf.clone(),
            ),
        }
    }
}
