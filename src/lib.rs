//! # Material Library
//!
//! A personal library of analysed teaching material. The user pastes
//! source text and picks the textbooks it relates to; a chat-completion
//! model drafts a pedagogical analysis; after hand-editing, the entry is
//! appended to the user's CSV library, stored on local disk or in a
//! GitHub repository used as a file store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │ CLI/HTTP │──▶│  Session   │──▶│ Merge engine │
//! │ (matlib) │   │ per request│   │ append/delete│
//! └────┬─────┘   └─────┬──────┘   └──────┬───────┘
//!      │               │                 ▼
//!      ▼               ▼          ┌──────────────┐
//! ┌──────────┐   ┌────────────┐   │ LibraryStore │
//! │Bookshelf │   │ LLM client │   │ local/GitHub │
//! └──────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! The record model, schema reconciliation, CSV codec, markup cleanup and
//! merge engine live in `material-library-core`; this crate adds the I/O.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`llm`] | Chat-completion client |
//! | [`analysis`] | Validate input, prompt, clean output |
//! | [`store_local`] | Local-disk store |
//! | [`store_github`] | GitHub contents API store |
//! | [`bookshelf`] | Reference-document vocabulary |
//! | [`backend`] | Store/bookshelf selection |
//! | [`session`] | Per-interaction user context |
//! | [`export`] | CSV export |
//! | [`server`] | JSON HTTP API |

pub mod analysis;
pub mod backend;
pub mod bookshelf;
pub mod config;
pub mod export;
pub mod llm;
pub mod server;
pub mod session;
pub mod store_github;
pub mod store_local;
