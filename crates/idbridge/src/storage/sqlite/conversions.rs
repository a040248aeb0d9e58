//! SQLite row conversion functions.
//!
//! Pure functions for converting SQLite rows into user records.
//! These are testable in isolation with an in-memory connection.

use idbridge_core::identity::{UserRecord, GROUPS_ATTRIBUTE};
use rusqlite::types::{Type, ValueRef};
use rusqlite::Row;

/// Convert a SQLite row to a UserRecord.
///
/// Expected columns: `columns`, in order. NULL columns are left out, except
/// `groups` which is always present (empty when NULL).
pub fn row_to_record(row: &Row, columns: &[String]) -> rusqlite::Result<UserRecord> {
    let mut record = UserRecord::new();
    for (index, column) in columns.iter().enumerate() {
        if let Some(value) = value_to_string(row.get_ref(index)?, index, column)? {
            record.insert(column.as_str(), value);
        }
    }
    if !record.contains(GROUPS_ATTRIBUTE) {
        record.insert(GROUPS_ATTRIBUTE, "");
    }
    Ok(record)
}

/// Renders a column value as text. NULL is `None`; blobs are rejected.
fn value_to_string(value: ValueRef<'_>, index: usize, column: &str) -> rusqlite::Result<Option<String>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Some(s.to_string()))
            .map_err(rusqlite::Error::Utf8Error),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            column.to_string(),
            Type::Blob,
        )),
    }
}
