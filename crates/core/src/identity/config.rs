use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use super::{BackendError, Result, GROUPS_ATTRIBUTE, MAIL_ATTRIBUTE};

/// Default table holding user rows.
pub const DEFAULT_TABLE: &str = "user";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where and as whom a backend connects.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Immutable configuration of one identity backend.
///
/// Built once when the backend is constructed and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    /// Backend identifier, carried in every domain error.
    pub name: String,
    /// Attribute that uniquely identifies a user.
    pub key: String,
    /// Attributes managed by the backend.
    pub attributes: Vec<String>,
    pub connection: ConnectionParams,
    #[serde(default = "default_table")]
    pub table: String,
    /// Known groups. When set, group operations reject anything else.
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl BackendConfig {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        attributes: Vec<String>,
        connection: ConnectionParams,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            attributes,
            connection,
            table: default_table(),
            groups: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Builds a configuration from a raw key/value section.
    ///
    /// # Parameters
    ///
    /// - `backend_host`: store endpoint (required). For SQLite, the directory
    ///   holding the database file.
    /// - `backend_user`: store user (required)
    /// - `backend_password`: store password (required)
    /// - `backend_db`: database name (required). For SQLite, the file name
    ///   inside `backend_host`.
    /// - `backend_table`: user table (default: `user`)
    /// - `backend_groups`: comma-separated list of known groups (default: unrestricted)
    /// - `backend_timeout`: per-call timeout in whole seconds, at least 1 (default: 10)
    ///
    /// `backend_user` and `backend_password` are required for every backend,
    /// but the SQLite and in-memory stores never read them.
    ///
    /// # Errors
    ///
    /// `MissingParameter` when a required parameter is absent, `InvalidData`
    /// when `backend_timeout` is not a positive number.
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        attributes: Vec<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let required = |param: &str| {
            params
                .get(param)
                .cloned()
                .ok_or_else(|| BackendError::missing_parameter(param, &name))
        };

        let connection = ConnectionParams {
            host: required("backend_host")?,
            user: required("backend_user")?,
            password: required("backend_password")?,
            database: required("backend_db")?,
        };

        let timeout_secs = match params.get("backend_timeout") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(BackendError::InvalidData(
                        "backend_timeout must be at least 1 second".to_string(),
                    ))
                }
                Ok(secs) => secs,
                Err(_) => {
                    return Err(BackendError::InvalidData(format!(
                        "backend_timeout is not a number: {raw}"
                    )))
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let groups = params.get("backend_groups").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        });

        Ok(Self {
            table: params
                .get("backend_table")
                .cloned()
                .unwrap_or_else(default_table),
            groups,
            timeout_secs,
            ..Self::new(name, key, attributes, connection)
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Per-call timeout as a Duration, never below one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Columns read and written by the backend: the key first, then the
    /// managed attributes, then `groups` if it was not listed.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![self.key.clone()];
        for attribute in self
            .attributes
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(GROUPS_ATTRIBUTE))
        {
            if !columns.iter().any(|c| c == attribute) {
                columns.push(attribute.to_string());
            }
        }
        columns
    }

    pub fn is_managed(&self, attribute: &str) -> bool {
        attribute == self.key
            || attribute == GROUPS_ATTRIBUTE
            || self.attributes.iter().any(|a| a == attribute)
    }

    /// Columns matched by `search`: the key, and `mail` when managed.
    pub fn search_columns(&self) -> Vec<String> {
        let mut columns = vec![self.key.clone()];
        if self.key != MAIL_ATTRIBUTE && self.is_managed(MAIL_ATTRIBUTE) {
            columns.push(MAIL_ATTRIBUTE.to_string());
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HashMap<String, String> {
        [
            ("backend_host", "localhost"),
            ("backend_user", "ssoadm"),
            ("backend_password", ""),
            ("backend_db", "sso"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn attributes() -> Vec<String> {
        ["user", "password", "name", "mail", "groups"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_from_params_defaults() {
        let config = BackendConfig::from_params("sql", &params(), attributes(), "user").unwrap();

        assert_eq!(config.name, "sql");
        assert_eq!(config.key, "user");
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.database, "sso");
        assert_eq!(config.table, "user");
        assert_eq!(config.groups, None);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_params_missing_parameter() {
        for missing in ["backend_host", "backend_user", "backend_password", "backend_db"] {
            let mut params = params();
            params.remove(missing);

            let result = BackendConfig::from_params("sql", &params, attributes(), "user");

            assert_eq!(
                result,
                Err(BackendError::missing_parameter(missing, "sql")),
                "expected MissingParameter for {missing}"
            );
        }
    }

    #[test]
    fn test_from_params_optional_values() {
        let mut params = params();
        params.insert("backend_table".into(), "accounts".into());
        params.insert("backend_groups".into(), "grp1, grp2,,grp3".into());
        params.insert("backend_timeout".into(), "3".into());

        let config = BackendConfig::from_params("sql", &params, attributes(), "user").unwrap();

        assert_eq!(config.table, "accounts");
        assert_eq!(
            config.groups,
            Some(vec!["grp1".into(), "grp2".into(), "grp3".into()])
        );
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_from_params_invalid_timeout() {
        let mut params = params();
        params.insert("backend_timeout".into(), "soon".into());

        let result = BackendConfig::from_params("sql", &params, attributes(), "user");

        assert!(matches!(result, Err(BackendError::InvalidData(_))));
    }

    #[test]
    fn test_from_params_zero_timeout() {
        let mut params = params();
        params.insert("backend_timeout".into(), "0".into());

        let result = BackendConfig::from_params("sql", &params, attributes(), "user");

        assert!(matches!(result, Err(BackendError::InvalidData(_))));
    }

    #[test]
    fn test_with_timeout_clamps_to_one_second() {
        let config = BackendConfig::from_params("sql", &params(), attributes(), "user")
            .unwrap()
            .with_timeout(Duration::ZERO);

        assert_eq!(config.timeout(), Duration::from_secs(1));

        let deserialized = BackendConfig {
            timeout_secs: 0,
            ..config
        };
        assert_eq!(deserialized.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_columns_always_include_key_and_groups() {
        let config = BackendConfig::from_params(
            "sql",
            &params(),
            vec!["name".into(), "mail".into()],
            "uid",
        )
        .unwrap();

        assert_eq!(config.columns(), ["uid", "name", "mail", "groups"]);
        assert!(config.is_managed("uid"));
        assert!(config.is_managed("groups"));
        assert!(!config.is_managed("password"));
    }

    #[test]
    fn test_columns_deduplicate() {
        let config = BackendConfig::from_params("sql", &params(), attributes(), "user").unwrap();
        assert_eq!(
            config.columns(),
            ["user", "password", "name", "mail", "groups"]
        );
    }

    #[test]
    fn test_search_columns() {
        let with_mail = BackendConfig::from_params("sql", &params(), attributes(), "user").unwrap();
        assert_eq!(with_mail.search_columns(), ["user", "mail"]);

        let without_mail =
            BackendConfig::from_params("sql", &params(), vec!["name".into()], "user").unwrap();
        assert_eq!(without_mail.search_columns(), ["user"]);
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut params = params();
        params.insert("backend_password".into(), "hunter2".into());
        let config = BackendConfig::from_params("sql", &params, attributes(), "user").unwrap();

        let debug = format!("{config:?}");

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "name": "sql",
            "key": "user",
            "attributes": ["name", "mail"],
            "connection": {"host": ".", "user": "u", "password": "p", "database": "sso.db"}
        }"#;

        let config: BackendConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.table, DEFAULT_TABLE);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.groups.is_none());
    }
}
