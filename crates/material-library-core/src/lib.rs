//! # Material Library Core
//!
//! Shared logic for the teaching-material library: the record model,
//! legacy column reconciliation, the CSV file codec, model-output markup
//! cleanup, the store abstraction, and the append/delete merge engine.
//!
//! This crate performs no network or filesystem I/O of its own. Concrete
//! backends (local disk, GitHub contents API) live in the `material-library`
//! crate and implement [`store::LibraryStore`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `LibraryRecord`, `Library`, topic joining |
//! | [`schema`] | Legacy column aliases and normalization |
//! | [`codec`] | CSV encoding (UTF-8 BOM) and decoding |
//! | [`markup`] | `**bold**` → `<mark>` rewriting |
//! | [`prompt`] | Analysis prompt composition |
//! | [`user`] | User fingerprint and file naming |
//! | [`store`] | `LibraryStore` trait, read outcomes, in-memory store |
//! | [`merge`] | `append_record` / `delete_at` |

pub mod codec;
pub mod markup;
pub mod merge;
pub mod models;
pub mod prompt;
pub mod schema;
pub mod store;
pub mod user;
