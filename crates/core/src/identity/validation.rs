use super::{BackendConfig, BackendError, Result, UserRecord, GROUP_SEPARATOR};

/// Rejects attributes the backend does not manage.
///
/// Attribute names end up as column identifiers, which cannot be bound as
/// query parameters, so only names from the configuration are accepted.
pub fn validate_attribute_names(config: &BackendConfig, attrs: &UserRecord) -> Result<()> {
    match attrs.attribute_names().find(|name| !config.is_managed(name)) {
        Some(name) => Err(BackendError::InvalidData(format!(
            "attribute '{name}' is not managed by backend '{}'",
            config.name
        ))),
        None => Ok(()),
    }
}

/// Rejects group names that cannot survive the single-value encoding.
pub fn validate_group_names<S: AsRef<str>>(groups: &[S]) -> Result<()> {
    for group in groups {
        let group: &str = group.as_ref();
        if group.is_empty() {
            return Err(BackendError::InvalidData(
                "group name cannot be empty".to_string(),
            ));
        }
        if group.contains(GROUP_SEPARATOR) {
            return Err(BackendError::InvalidData(format!(
                "group name cannot contain '{GROUP_SEPARATOR}': {group}"
            )));
        }
    }
    Ok(())
}

/// Checks `groups` against the configured group universe, if any.
pub fn check_group_universe<S: AsRef<str>>(config: &BackendConfig, groups: &[S]) -> Result<()> {
    let Some(known) = &config.groups else {
        return Ok(());
    };
    for group in groups {
        let group: &str = group.as_ref();
        if !known.iter().any(|k| k == group) {
            return Err(BackendError::group_doesnt_exist(group, &config.name));
        }
    }
    Ok(())
}
