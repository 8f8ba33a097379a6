//! CSV export of a user's library.
//!
//! The export is byte-for-byte the store format (BOM, canonical header),
//! so it opens directly in spreadsheet tools and can be dropped back into
//! the data directory as a library file.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use material_library_core::codec;
use material_library_core::store::{read_library, LibraryStore};
use material_library_core::user::UserId;
use std::path::{Path, PathBuf};

/// Default download name, e.g. `思政智库_0914.csv`.
pub fn default_export_name(date: NaiveDate) -> String {
    format!("思政智库_{}.csv", date.format("%m%d"))
}

/// Write the user's library to `output`, or to a dated file in the current
/// directory. Returns the path and row count.
pub async fn run_export(
    store: &dyn LibraryStore,
    user: &UserId,
    output: Option<&Path>,
) -> Result<(PathBuf, usize)> {
    let (library, _) = read_library(store, user).await;
    let bytes = codec::encode(&library)?;

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_export_name(Local::now().date_naive())),
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&path, &bytes)?;
    Ok((path, library.len()))
}
