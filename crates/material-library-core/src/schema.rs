//! Column reconciliation for stored libraries.
//!
//! Library files written by older releases use a number of different
//! header names for the same field. [`normalize`] maps any such table onto
//! the five [`CANONICAL_COLUMNS`], in fixed order, filling columns it cannot
//! find with [`UNRECORDED`]. Normalization never fails.
//!
//! # Resolution order
//!
//! For each canonical column:
//!
//! 1. If a header with the canonical name exists, it is used as-is.
//! 2. Otherwise [`COLUMN_ALIASES`] is scanned in order and the first alias
//!    whose legacy name is present wins.
//! 3. Otherwise every row gets the sentinel.
//!
//! Headers that match nothing are ignored in the output.

use crate::models::{Library, LibraryRecord, UNRECORDED};

pub const COL_DATE: &str = "日期";
pub const COL_TITLE: &str = "标题";
pub const COL_TOPICS: &str = "涉及教材";
pub const COL_ANALYSIS: &str = "考点设问";
pub const COL_SOURCE: &str = "素材原文";

/// Canonical header row, in file order.
pub const CANONICAL_COLUMNS: [&str; 5] = [COL_DATE, COL_TITLE, COL_TOPICS, COL_ANALYSIS, COL_SOURCE];

/// A historical header name and the canonical column it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAlias {
    /// Schema generation that introduced the legacy name.
    pub version: u32,
    pub legacy: &'static str,
    pub canonical: &'static str,
}

const fn alias(version: u32, legacy: &'static str, canonical: &'static str) -> ColumnAlias {
    ColumnAlias {
        version,
        legacy,
        canonical,
    }
}

/// Legacy header aliases in priority order. Append new generations at the end.
pub const COLUMN_ALIASES: &[ColumnAlias] = &[
    alias(1, "素材标题", COL_TITLE),
    alias(1, "精修解析", COL_ANALYSIS),
    alias(1, "核心解析", COL_ANALYSIS),
    alias(1, "分类", COL_TOPICS),
    alias(2, "核心知识点", COL_ANALYSIS),
    alias(2, "分析结果", COL_ANALYSIS),
    alias(2, "关联教材", COL_TOPICS),
    alias(2, "教材", COL_TOPICS),
    alias(2, "原文", COL_SOURCE),
    alias(2, "原文内容", COL_SOURCE),
];

/// A parsed delimited-text table with arbitrary headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Index of the first header equal to `name` (surrounding whitespace ignored).
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Canonical-shaped table holding the rows of `library`.
    pub fn from_library(library: &Library) -> Self {
        Self {
            headers: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: library
                .records()
                .iter()
                .map(|r| r.fields().iter().map(|f| f.to_string()).collect())
                .collect(),
        }
    }
}

/// Source column index for each canonical column, or `None` when absent.
pub fn resolve_columns(table: &RawTable) -> [Option<usize>; 5] {
    CANONICAL_COLUMNS.map(|canonical| {
        table.column(canonical).or_else(|| {
            COLUMN_ALIASES
                .iter()
                .filter(|a| a.canonical == canonical)
                .find_map(|a| {
                    let index = table.column(a.legacy)?;
                    log::debug!(
                        "column {} read from v{} header {}",
                        canonical,
                        a.version,
                        a.legacy
                    );
                    Some(index)
                })
        })
    })
}

/// Map `table` onto the canonical schema.
///
/// The output has exactly one record per input row. Cells missing from a
/// short row become empty strings; columns missing from the header become
/// [`UNRECORDED`].
pub fn normalize(table: &RawTable) -> Library {
    let columns = resolve_columns(table);
    let records = table
        .rows
        .iter()
        .map(|row| {
            let [date, title, topics, analysis, source] = columns.map(|idx| match idx {
                Some(i) => row.get(i).cloned().unwrap_or_default(),
                None => UNRECORDED.to_string(),
            });
            LibraryRecord {
                date,
                title,
                linked_topics: topics,
                analysis,
                source_text: source,
            }
        })
        .collect();
    Library::from_records(records)
}
