use regex::{Regex, RegexBuilder};
use sha1::{Digest, Sha1};

use super::{
    check_group_universe, validate_attribute_names, BackendConfig, BackendError, GroupList, Result, UserRecord,
    GROUPS_ATTRIBUTE, PASSWORD_ATTRIBUTE,
};

/// One-way digest stored in place of a password: lowercase hex SHA-1.
///
/// Kept compatible with stores populated by earlier tooling.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha1::digest(password.as_bytes()))
}

/// True iff a digest is stored and equals the digest of `candidate`.
pub fn verify_password(candidate: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => hash_password(candidate) == stored,
        None => false,
    }
}

/// Prepares a record for insertion.
///
/// Returns the key value and the record to store: attribute names checked,
/// password digested, group list normalized (an absent list becomes empty)
/// and checked against the group universe.
pub fn prepare_new_user(config: &BackendConfig, attrs: &UserRecord) -> Result<(String, UserRecord)> {
    validate_attribute_names(config, attrs)?;

    let key = match attrs.get(&config.key) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return Err(BackendError::InvalidData(format!(
                "missing key attribute '{}'",
                config.key
            )))
        }
    };

    let mut record = digest_password(attrs.clone());
    let groups = record.groups();
    check_group_universe(config, groups.as_slice())?;
    record.insert(GROUPS_ATTRIBUTE, groups.to_column());

    Ok((key, record))
}

/// Prepares a partial record for an in-place update.
///
/// Only the supplied attributes are returned; the password is digested and a
/// supplied group list normalized and checked against the group universe.
pub fn prepare_update(config: &BackendConfig, attrs: &UserRecord) -> Result<UserRecord> {
    validate_attribute_names(config, attrs)?;

    if attrs.get(&config.key).is_some_and(str::is_empty) {
        return Err(BackendError::InvalidData(format!(
            "key attribute '{}' cannot be empty",
            config.key
        )));
    }

    let mut record = digest_password(attrs.clone());
    if let Some(raw) = record.get(GROUPS_ATTRIBUTE) {
        let groups = GroupList::parse(raw);
        check_group_universe(config, groups.as_slice())?;
        record.insert(GROUPS_ATTRIBUTE, groups.to_column());
    }
    Ok(record)
}

fn digest_password(mut record: UserRecord) -> UserRecord {
    if let Some(password) = record.remove(PASSWORD_ATTRIBUTE) {
        record.insert(PASSWORD_ATTRIBUTE, hash_password(&password));
    }
    record
}

/// Compiles a search pattern. Matching is unanchored, so plain text matches
/// as a substring, and case-insensitive like `RLIKE` under the default
/// collation.
pub fn compile_search_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| BackendError::InvalidData(format!("invalid search pattern: {e}")))
}

/// True if any searchable attribute of `record` matches `pattern`.
pub fn record_matches(config: &BackendConfig, record: &UserRecord, pattern: &Regex) -> bool {
    config
        .search_columns()
        .iter()
        .filter_map(|column| record.get(column))
        .any(|value| pattern.is_match(value))
}
