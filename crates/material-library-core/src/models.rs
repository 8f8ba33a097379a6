//! Core data models for the material library.
//!
//! A [`Library`] is one user's ordered list of [`LibraryRecord`]s. Rows are
//! identified only by their position in the list; removing a row shifts the
//! position of every row after it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::markup;

/// Separator used when a record's topic list is stored as one cell.
pub const TOPIC_DELIMITER: &str = " | ";

/// Value written into any canonical column a stored file did not carry.
pub const UNRECORDED: &str = "未记录";

/// Title used when the user submits an entry without one.
pub const DEFAULT_TITLE: &str = "未命名素材";

/// `strftime` format of the `日期` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One teaching-material entry.
///
/// All fields are kept as the strings found in the stored file so that
/// legacy rows (sentinel values, odd dates) survive a rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRecord {
    pub date: String,
    pub title: String,
    pub linked_topics: String,
    pub analysis: String,
    pub source_text: String,
}

/// Parsed view of a record's `linked_topics` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topics {
    /// The row carries a topic list.
    Known(Vec<String>),
    /// The row predates the topic column (or the cell is empty).
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("at least one topic must be selected")]
    NoTopics,
}

impl LibraryRecord {
    /// Build a new entry for appending.
    ///
    /// An empty title falls back to [`DEFAULT_TITLE`], and the analysis is
    /// passed through [`markup::post_process`] so no `**…**` span is ever
    /// stored, including ones typed in during manual editing.
    ///
    /// Fails when no non-blank topic remains after joining; an empty topic
    /// cell is reserved for legacy rows.
    pub fn new(
        date: NaiveDate,
        title: &str,
        topics: &[String],
        analysis: &str,
        source_text: &str,
    ) -> Result<Self, RecordError> {
        let linked_topics = join_topics(topics);
        if split_topics(&linked_topics) == Topics::Unknown {
            return Err(RecordError::NoTopics);
        }
        let title = title.trim();
        Ok(Self {
            date: date.format(DATE_FORMAT).to_string(),
            title: if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title.to_string()
            },
            linked_topics,
            analysis: markup::post_process(analysis),
            source_text: source_text.to_string(),
        })
    }

    pub fn topics(&self) -> Topics {
        split_topics(&self.linked_topics)
    }

    /// Fields in canonical column order.
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.date,
            &self.title,
            &self.linked_topics,
            &self.analysis,
            &self.source_text,
        ]
    }

    /// True when any field contains `query` as a substring.
    pub fn matches(&self, query: &str) -> bool {
        self.fields().iter().any(|f| f.contains(query))
    }
}

/// Join topic labels into a single cell.
///
/// Labels are trimmed, empty labels dropped, and any `|` inside a label is
/// replaced with `/` so splitting on [`TOPIC_DELIMITER`] recovers the input.
pub fn join_topics(topics: &[String]) -> String {
    topics
        .iter()
        .map(|t| t.trim().replace('|', "/"))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(TOPIC_DELIMITER)
}

/// Split a stored topic cell. The sentinel and empty cells are [`Topics::Unknown`].
pub fn split_topics(cell: &str) -> Topics {
    let cell = cell.trim();
    if cell.is_empty() || cell == UNRECORDED {
        return Topics::Unknown;
    }
    let labels: Vec<String> = cell
        .split(TOPIC_DELIMITER.trim())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if labels.is_empty() {
        Topics::Unknown
    } else {
        Topics::Known(labels)
    }
}

/// One user's ordered list of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Library {
    records: Vec<LibraryRecord>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<LibraryRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[LibraryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&LibraryRecord> {
        self.records.get(position)
    }

    /// Append at the end; insertion order is the only ordering.
    pub fn push(&mut self, record: LibraryRecord) {
        self.records.push(record);
    }

    /// Remove the row at `position`, shifting later rows down by one.
    pub fn remove(&mut self, position: usize) -> Option<LibraryRecord> {
        if position < self.records.len() {
            Some(self.records.remove(position))
        } else {
            None
        }
    }

    /// Rows matching `query`, newest first, paired with their stored position.
    ///
    /// An empty query matches every row.
    pub fn search<'a>(&'a self, query: &str) -> Vec<(usize, &'a LibraryRecord)> {
        self.records
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, r)| query.is_empty() || r.matches(query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_new_record_joins_topics_and_cleans_markup() {
        let r = LibraryRecord::new(
            date(),
            "Material A",
            &["Book1".to_string(), "Book2".to_string()],
            "core **idea** here",
            "raw",
        )
        .unwrap();
        assert_eq!(r.date, "2024-03-01");
        assert_eq!(r.linked_topics, "Book1 | Book2");
        assert_eq!(r.analysis, "core <mark>idea</mark> here");
    }

    #[test]
    fn test_empty_title_defaults() {
        let r = LibraryRecord::new(date(), "   ", &["Book1".to_string()], "a", "b").unwrap();
        assert_eq!(r.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_new_record_requires_a_topic() {
        for topics in [vec![], vec![" ".to_string()], vec!["".to_string(), "\t".to_string()]] {
            assert_eq!(
                LibraryRecord::new(date(), "T", &topics, "a", "s"),
                Err(RecordError::NoTopics)
            );
        }
        assert_eq!(
            LibraryRecord::new(date(), "T", &[UNRECORDED.to_string()], "a", "s"),
            Err(RecordError::NoTopics)
        );
        let topics = vec![" ".to_string(), "Book1".to_string()];
        let r = LibraryRecord::new(date(), "T", &topics, "a", "s").unwrap();
        assert_eq!(r.topics(), Topics::Known(vec!["Book1".to_string()]));
    }

    #[test]
    fn test_join_topics_drops_empty_and_escapes_delimiter() {
        let topics = vec![" A ".to_string(), "".to_string(), "B|C".to_string()];
        assert_eq!(join_topics(&topics), "A | B/C");
        assert_eq!(
            split_topics(&join_topics(&topics)),
            Topics::Known(vec!["A".to_string(), "B/C".to_string()])
        );
    }

    #[test]
    fn test_sentinel_topics_are_unknown() {
        assert_eq!(split_topics(UNRECORDED), Topics::Unknown);
        assert_eq!(split_topics(""), Topics::Unknown);
    }

    #[test]
    fn test_search_is_newest_first_with_positions() {
        let mut lib = Library::new();
        for t in ["alpha", "beta", "alphabet"] {
            lib.push(LibraryRecord::new(date(), t, &["X".to_string()], "", "").unwrap());
        }
        let hits: Vec<usize> = lib.search("alpha").iter().map(|(i, _)| *i).collect();
        assert_eq!(hits, vec![2, 0]);
        assert_eq!(lib.search("").len(), 3);
    }

    #[test]
    fn test_remove_shifts_positions() {
        let mut lib = Library::new();
        for t in ["a", "b", "c"] {
            lib.push(LibraryRecord::new(date(), t, &["X".to_string()], "", "").unwrap());
        }
        assert_eq!(lib.remove(0).unwrap().title, "a");
        assert_eq!(lib.get(0).unwrap().title, "b");
        assert!(lib.remove(5).is_none());
    }
}
