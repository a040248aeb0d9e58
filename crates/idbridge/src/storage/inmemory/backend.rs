//! In-memory backend implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::Span;

use idbridge_core::identity::{
    check_group_universe, compile_search_pattern, merge_groups, prepare_new_user, prepare_update,
    record_matches, remove_groups, validate_group_names, verify_password, BackendConfig,
    BackendError, GroupList, IdentityBackend, Result, UserMap, UserRecord, GROUPS_ATTRIBUTE,
    PASSWORD_ATTRIBUTE,
};

/// In-memory identity backend.
///
/// Records are keyed by the value of the configured key attribute. Clones
/// share the same store.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    config: Arc<BackendConfig>,
    users: Arc<RwLock<BTreeMap<String, UserRecord>>>,
    span: Span,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new(config: BackendConfig) -> Self {
        let span = tracing::info_span!("identity_backend", backend = %config.name, store = "memory");
        Self {
            config: Arc::new(config),
            users: Arc::new(RwLock::new(BTreeMap::new())),
            span,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Applies `apply` to the stored group list under the write lock.
    async fn update_groups(
        &self,
        username: &str,
        groups: &[String],
        apply: fn(&GroupList, &[String]) -> GroupList,
    ) -> Result<GroupList> {
        validate_group_names(groups)?;
        check_group_universe(&self.config, groups)?;

        let mut users = self.users.write().await;
        let record = users
            .get_mut(username)
            .ok_or_else(|| BackendError::user_doesnt_exist(username, &self.config.name))?;

        let updated = apply(&record.groups(), groups);
        record.insert(GROUPS_ATTRIBUTE, updated.to_column());
        Ok(updated)
    }
}

#[async_trait]
impl IdentityBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let users = self.users.read().await;
        let stored = users
            .get(username)
            .and_then(|record| record.get(PASSWORD_ATTRIBUTE));

        let authenticated = verify_password(password, stored);
        tracing::debug!(parent: &self.span, user = %username, authenticated, "Authentication attempt");
        Ok(authenticated)
    }

    async fn add_user(&self, attrs: &UserRecord) -> Result<()> {
        let (user, record) = prepare_new_user(&self.config, attrs)?;

        let mut users = self.users.write().await;
        if users.contains_key(&user) {
            return Err(BackendError::user_already_exists(user, &self.config.name));
        }
        users.insert(user.clone(), record);

        tracing::info!(parent: &self.span, user = %user, "User added");
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let mut users = self.users.write().await;
        if users.remove(username).is_none() {
            return Err(BackendError::user_doesnt_exist(username, &self.config.name));
        }

        tracing::info!(parent: &self.span, user = %username, "User deleted");
        Ok(())
    }

    async fn set_attributes(&self, username: &str, attrs: &UserRecord) -> Result<()> {
        let update = prepare_update(&self.config, attrs)?;

        let mut users = self.users.write().await;
        if !users.contains_key(username) {
            return Err(BackendError::user_doesnt_exist(username, &self.config.name));
        }

        let renamed = update
            .get(&self.config.key)
            .filter(|key| *key != username)
            .map(str::to_string);
        if let Some(key) = &renamed {
            if users.contains_key(key) {
                return Err(BackendError::user_already_exists(key, &self.config.name));
            }
        }

        let Some(mut record) = users.remove(username) else {
            return Err(BackendError::user_doesnt_exist(username, &self.config.name));
        };
        for (name, value) in update.iter() {
            record.insert(name, value);
        }
        users.insert(renamed.unwrap_or_else(|| username.to_string()), record);

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

        let users = self.users.read().await;
        let matches: UserMap = users
            .iter()
            .filter(|(_, record)| record_matches(&self.config, record, &regex))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();

        tracing::debug!(parent: &self.span, pattern = %pattern, matches = matches.len(), "Search completed");
        Ok(matches)
    }

    async fn get_user(&self, username: &str) -> Result<UserRecord> {
        let users = self.users.read().await;
        users
            .get(username)
            .cloned()
            .ok_or_else(|| BackendError::user_doesnt_exist(username, &self.config.name))
    }

    async fn get_groups(&self, username: &str) -> Result<Vec<String>> {
        let users = self.users.read().await;
        users
            .get(username)
            .map(|record| record.groups().into_vec())
            .ok_or_else(|| BackendError::user_doesnt_exist(username, &self.config.name))
    }
}

#[cfg(test)]
mod tests {
    use idbridge_core::identity::{hash_password, ConnectionParams};

    use super::*;

    fn config() -> BackendConfig {
        BackendConfig::new(
            "memory",
            "user",
            ["password", "name", "mail", "groups"]
                .into_iter()
                .map(String::from)
                .collect(),
            ConnectionParams {
                host: String::new(),
                user: String::new(),
                password: String::new(),
                database: String::new(),
            },
        )
    }

    fn alice() -> UserRecord {
        UserRecord::new()
            .with("user", "alice")
            .with("password", "secret")
            .with("mail", "alice@example.org")
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_get_and_authenticate() {
        let backend = InMemoryBackend::new(config());

        backend.add_user(&alice()).await.unwrap();

        let record = backend.get_user("alice").await.unwrap();
        assert_eq!(record.get("password"), Some(hash_password("secret").as_str()));
        assert_eq!(record.get("groups"), Some(""));
        assert!(backend.authenticate("alice", "secret").await.unwrap());
        assert!(!backend.authenticate("alice", "nope").await.unwrap());
        assert!(!backend.authenticate("bob", "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_duplicate_user() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();

        let result = backend.add_user(&alice()).await;

        assert_eq!(result, Err(BackendError::user_already_exists("alice", "memory")));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();

        backend.delete_user("alice").await.unwrap();

        assert!(backend.is_empty().await);
        assert_eq!(
            backend.delete_user("alice").await,
            Err(BackendError::user_doesnt_exist("alice", "memory"))
        );
    }

    #[tokio::test]
    async fn test_set_attributes_merges() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();

        backend
            .set_attributes("alice", &UserRecord::new().with("name", "Alice").with("password", "new"))
            .await
            .unwrap();

        let record = backend.get_user("alice").await.unwrap();
        assert_eq!(record.get("name"), Some("Alice"));
        assert_eq!(record.get("mail"), Some("alice@example.org"));
        assert!(backend.authenticate("alice", "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_attributes_renames_key() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();

        backend
            .set_attributes("alice", &UserRecord::new().with("user", "alicia"))
            .await
            .unwrap();

        assert!(backend.get_user("alice").await.is_err());
        assert_eq!(backend.get_user("alicia").await.unwrap().get("user"), Some("alicia"));
    }

    #[tokio::test]
    async fn test_set_attributes_rename_collision() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();
        backend
            .add_user(&UserRecord::new().with("user", "bob"))
            .await
            .unwrap();

        let result = backend
            .set_attributes("alice", &UserRecord::new().with("user", "bob"))
            .await;

        assert_eq!(result, Err(BackendError::user_already_exists("bob", "memory")));
        assert!(backend.get_user("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_groups_roundtrip() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();

        backend.add_to_groups("alice", &groups(&["g1", "g2"])).await.unwrap();
        backend.add_to_groups("alice", &groups(&["g2", "g3"])).await.unwrap();
        backend.remove_from_groups("alice", &groups(&["g1"])).await.unwrap();

        assert_eq!(backend.get_groups("alice").await.unwrap(), ["g2", "g3"]);
        assert_eq!(backend.get_user("alice").await.unwrap().get("groups"), Some("g2,g3"));
    }

    #[tokio::test]
    async fn test_group_operations_on_missing_user() {
        let backend = InMemoryBackend::new(config());

        assert!(matches!(
            backend.add_to_groups("ghost", &groups(&["g1"])).await,
            Err(BackendError::UserDoesntExist { .. })
        ));
        assert!(matches!(
            backend.get_groups("ghost").await,
            Err(BackendError::UserDoesntExist { .. })
        ));
    }

    #[tokio::test]
    async fn test_group_universe() {
        let backend = InMemoryBackend::new(config().with_groups(["grp1"]));
        backend.add_user(&alice()).await.unwrap();

        let result = backend.add_to_groups("alice", &groups(&["grp2"])).await;

        assert_eq!(result, Err(BackendError::group_doesnt_exist("grp2", "memory")));
    }

    #[tokio::test]
    async fn test_search() {
        let backend = InMemoryBackend::new(config());
        backend.add_user(&alice()).await.unwrap();
        backend
            .add_user(&UserRecord::new().with("user", "bob").with("mail", "bob@corp.net"))
            .await
            .unwrap();

        let found = backend.search("corp").await.unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), ["bob"]);

        let found = backend.search("^(alice|bob)$").await.unwrap();
        assert_eq!(found.len(), 2);

        assert!(matches!(
            backend.search("[").await,
            Err(BackendError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let backend = InMemoryBackend::new(config());
        let other = backend.clone();

        backend.add_user(&alice()).await.unwrap();

        assert!(other.get_user("alice").await.is_ok());
    }
}
