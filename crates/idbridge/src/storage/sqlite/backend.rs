//! SQLite backend implementation.
//!
//! Implements `IdentityBackend` from `idbridge_core::identity` over a single
//! user table. Every call opens its own connection and closes it before
//! returning; nothing is shared between calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, OptionalExtension, Transaction, TransactionBehavior};
use tokio_rusqlite::Connection;
use tracing::{Instrument, Span};

use idbridge_core::identity::{
    check_group_universe, compile_search_pattern, merge_groups, prepare_new_user, prepare_update,
    remove_groups, validate_group_names, verify_password, BackendConfig, BackendError,
    ConnectionParams, GroupList, IdentityBackend, Result, UserMap, UserRecord, GROUPS_ATTRIBUTE,
    PASSWORD_ATTRIBUTE,
};

use super::conversions::row_to_record;
use super::error::{map_rusqlite_error, map_tokio_rusqlite_error, map_write_error};
use super::schema;
use crate::storage::bounded;

/// Resolves the database file: `database` inside the `host` directory.
pub fn database_path(connection: &ConnectionParams) -> PathBuf {
    Path::new(&connection.host).join(&connection.database)
}

/// SQLite-based identity backend.
pub struct SqliteBackend {
    config: Arc<BackendConfig>,
    path: PathBuf,
    span: Span,
}

impl SqliteBackend {
    /// Creates a backend for the database described by `config.connection`.
    ///
    /// No connection is opened until the first operation.
    pub fn new(config: BackendConfig) -> Self {
        let path = database_path(&config.connection);
        let span = tracing::info_span!("identity_backend", backend = %config.name, store = "sqlite");
        Self {
            config: Arc::new(config),
            path,
            span,
        }
    }

    /// Logs every operation under `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn database_path(&self) -> &Path {
        &self.path
    }

    /// Creates the user table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.run(|conn, config| {
            let sql = schema::create_table(&config.table, &config.key, &config.columns());
            conn.execute_batch(&sql).map_err(map_rusqlite_error)
        })
        .await?;
        tracing::debug!(parent: &self.span, path = %self.path.display(), "Schema ready");
        Ok(())
    }

    /// Runs `f` on a fresh connection, bounded by the configured timeout.
    ///
    /// The connection is closed once `f` returns, whatever its outcome. On
    /// timeout only the wait is abandoned: the connection thread still runs
    /// `f` to the end, so a write may commit after the caller has seen
    /// `Timeout`. The handle is dropped and the connection closes once `f`
    /// finishes.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection, &BackendConfig) -> Result<T> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        let path = self.path.clone();
        let limit = config.timeout();

        let work = async move {
            let conn = Connection::open(path.clone()).await.map_err(|e| {
                BackendError::ConnectionFailed(format!("Cannot open {}: {e}", path.display()))
            })?;

            let outcome = conn
                .call(move |conn| {
                    Ok(conn
                        .busy_timeout(config.timeout())
                        .map_err(map_rusqlite_error)
                        .and_then(|()| f(conn, &config)))
                })
                .await;

            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Failed to close store connection");
            }

            outcome.map_err(map_tokio_rusqlite_error)?
        };

        bounded(limit, work).instrument(self.span.clone()).await
    }

    /// Read-modify-write of the group list inside one IMMEDIATE transaction.
    ///
    /// The write lock is taken before the read, so concurrent updates of the
    /// same user serialize instead of overwriting each other.
    async fn update_groups(
        &self,
        username: &str,
        groups: &[String],
        apply: fn(&GroupList, &[String]) -> GroupList,
    ) -> Result<GroupList> {
        validate_group_names(groups)?;
        check_group_universe(&self.config, groups)?;

        let user = username.to_string();
        let groups = groups.to_vec();

        self.run(move |conn, config| {
            let tx = begin_immediate(conn)?;
            let current = read_groups(&tx, config, &user)?
                .ok_or_else(|| BackendError::user_doesnt_exist(&user, &config.name))?;

            let updated = apply(&current, &groups);
            if updated != current {
                tx.execute(
                    &schema::update_user(&config.table, &config.key, &[GROUPS_ATTRIBUTE]),
                    [updated.to_column(), user.clone()],
                )
                .map_err(map_rusqlite_error)?;
                tx.commit().map_err(map_rusqlite_error)?;
            }
            Ok(updated)
        })
        .await
    }
}

fn begin_immediate(conn: &mut rusqlite::Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(map_rusqlite_error)
}

fn user_exists(conn: &rusqlite::Connection, config: &BackendConfig, user: &str) -> Result<bool> {
    conn.query_row(
        &schema::select_column(&config.table, &config.key, &config.key),
        [user],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(map_rusqlite_error)
}

/// The stored group list, or `None` when the user does not exist.
fn read_groups(
    conn: &rusqlite::Connection,
    config: &BackendConfig,
    user: &str,
) -> Result<Option<GroupList>> {
    conn.query_row(
        &schema::select_column(&config.table, &config.key, GROUPS_ATTRIBUTE),
        [user],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
    .map(|row| row.map(|groups| GroupList::parse(groups.as_deref().unwrap_or_default())))
    .map_err(map_rusqlite_error)
}

/// Installs the `regexp` function backing the `REGEXP` operator.
///
/// `X REGEXP Y` calls `regexp(Y, X)`; the pattern was compiled and validated
/// before the query, so only the text argument is read here. NULL never
/// matches.
fn register_regexp(conn: &rusqlite::Connection, pattern: Regex) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            Ok(match ctx.get_raw(1) {
                ValueRef::Text(text) => std::str::from_utf8(text)
                    .map(|text| pattern.is_match(text))
                    .unwrap_or(false),
                _ => false,
            })
        },
    )
    .map_err(map_rusqlite_error)
}

#[async_trait]
impl IdentityBackend for SqliteBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        if !self.config.is_managed(PASSWORD_ATTRIBUTE) {
            tracing::debug!(parent: &self.span, user = %username, "Backend stores no passwords");
            return Ok(false);
        }

        let user = username.to_string();
        let stored = self
            .run(move |conn, config| {
                conn.query_row(
                    &schema::select_column(&config.table, &config.key, PASSWORD_ATTRIBUTE),
                    [&user],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()
                .map_err(map_rusqlite_error)
            })
            .await?;

        let authenticated = verify_password(password, stored.flatten().as_deref());
        if authenticated {
            tracing::debug!(parent: &self.span, user = %username, "Authentication succeeded");
        } else {
            tracing::debug!(parent: &self.span, user = %username, "Authentication failed");
        }
        Ok(authenticated)
    }

    async fn add_user(&self, attrs: &UserRecord) -> Result<()> {
        let (user, record) = prepare_new_user(&self.config, attrs)?;
        let added = user.clone();

        self.run(move |conn, config| {
            let tx = begin_immediate(conn)?;
            if user_exists(&tx, config, &user)? {
                return Err(BackendError::user_already_exists(&user, &config.name));
            }

            let columns: Vec<&str> = record.attribute_names().collect();
            tx.execute(
                &schema::insert_user(&config.table, &columns),
                params_from_iter(record.iter().map(|(_, value)| value)),
            )
            .map_err(|e| map_write_error(e, &user, &config.name))?;
            tx.commit().map_err(map_rusqlite_error)
        })
        .await?;

        tracing::info!(parent: &self.span, user = %added, "User added");
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let user = username.to_string();

        self.run(move |conn, config| {
            let rows = conn
                .execute(&schema::delete_user(&config.table, &config.key), [&user])
                .map_err(map_rusqlite_error)?;
            if rows == 0 {
                Err(BackendError::user_doesnt_exist(&user, &config.name))
            } else {
                Ok(())
            }
        })
        .await?;

        tracing::info!(parent: &self.span, user = %username, "User deleted");
        Ok(())
    }

    async fn set_attributes(&self, username: &str, attrs: &UserRecord) -> Result<()> {
        let record = prepare_update(&self.config, attrs)?;
        let user = username.to_string();

        self.run(move |conn, config| {
            let tx = begin_immediate(conn)?;
            if !user_exists(&tx, config, &user)? {
                return Err(BackendError::user_doesnt_exist(&user, &config.name));
            }
            if record.is_empty() {
                return Ok(());
            }

            let columns: Vec<&str> = record.attribute_names().collect();
            let target = record.get(&config.key).unwrap_or(user.as_str());
            tx.execute(
                &schema::update_user(&config.table, &config.key, &columns),
                params_from_iter(
                    record
                        .iter()
                        .map(|(_, value)| value)
                        .chain(std::iter::once(user.as_str())),
                ),
            )
            .map_err(|e| map_write_error(e, target, &config.name))?;
            tx.commit().map_err(map_rusqlite_error)
        })
        .await?;

        tracing::info!(
            parent: &self.span,
            user = %username,
            attributes = ?attrs.attribute_names().collect::<Vec<_>>(),
            "User attributes updated"
        );
        Ok(())
    }

    async fn add_to_groups(&self, username: &str, groups: &[String]) -> Result<()> {
        let updated = self.update_groups(username, groups, merge_groups).await?;
        tracing::info!(parent: &self.span, user = %username, groups = %updated.to_column(), "Groups added");
        Ok(())
    }

    async fn remove_from_groups(&self, username: &str, groups: &[String]) -> Result<()> {
        let updated = self.update_groups(username, groups, remove_groups).await?;
        tracing::info!(parent: &self.span, user = %username, groups = %updated.to_column(), "Groups removed");
        Ok(())
    }

    async fn search(&self, pattern: &str) -> Result<UserMap> {
        let regex = compile_search_pattern(pattern)?;
        let raw = pattern.to_string();

        let users = self
            .run(move |conn, config| {
                register_regexp(conn, regex)?;

                let columns = config.columns();
                let sql = schema::search_users(
                    &config.table,
                    &config.key,
                    &columns,
                    &config.search_columns(),
                );
                let mut stmt = conn.prepare(&sql).map_err(map_rusqlite_error)?;
                let rows = stmt
                    .query_map([&raw], |row| row_to_record(row, &columns))
                    .map_err(map_rusqlite_error)?;

                let mut users = UserMap::new();
                for row in rows {
                    let record = row.map_err(map_rusqlite_error)?;
                    if let Some(key) = record.get(&config.key).map(str::to_string) {
                        users.insert(key, record);
                    }
                }
                Ok(users)
            })
            .await?;

        tracing::debug!(parent: &self.span, pattern = %pattern, matches = users.len(), "Search completed");
        Ok(users)
    }

    async fn get_user(&self, username: &str) -> Result<UserRecord> {
        let user = username.to_string();

        self.run(move |conn, config| {
            let columns = config.columns();
            conn.query_row(
                &schema::select_user(&config.table, &config.key, &columns),
                [&user],
                |row| row_to_record(row, &columns),
            )
            .optional()
            .map_err(map_rusqlite_error)?
            .ok_or_else(|| BackendError::user_doesnt_exist(&user, &config.name))
        })
        .await
    }

    async fn get_groups(&self, username: &str) -> Result<Vec<String>> {
        let user = username.to_string();

        self.run(move |conn, config| {
            read_groups(conn, config, &user)?
                .map(GroupList::into_vec)
                .ok_or_else(|| BackendError::user_doesnt_exist(&user, &config.name))
        })
        .await
    }
}
