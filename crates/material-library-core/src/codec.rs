//! CSV encoding of a library file.
//!
//! The on-disk and remote format is the same: UTF-8 with a leading byte
//! order mark (so spreadsheet tools detect the encoding), comma-delimited,
//! header row equal to [`CANONICAL_COLUMNS`](crate::schema::CANONICAL_COLUMNS).
//! Export downloads use exactly these bytes.

use crate::models::Library;
use crate::schema::{self, RawTable, CANONICAL_COLUMNS};

/// UTF-8 byte order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize `library` in the store format.
pub fn encode(library: &Library) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(CANONICAL_COLUMNS)?;
    for record in library.records() {
        writer.write_record(record.fields())?;
    }
    writer.into_inner().map_err(|e| CodecError::Io(e.into_error()))
}

/// Parse a delimited-text table with whatever headers it carries.
///
/// A leading BOM is skipped. Rows may be shorter or longer than the header.
pub fn decode(bytes: &[u8]) -> Result<RawTable, CodecError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// Parse and normalize in one step.
pub fn decode_library(bytes: &[u8]) -> Result<Library, CodecError> {
    Ok(schema::normalize(&decode(bytes)?))
}
