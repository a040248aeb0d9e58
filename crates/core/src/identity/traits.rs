use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{Result, UserRecord};

/// Users keyed by their key attribute, as returned by [`IdentityBackend::search`].
pub type UserMap = BTreeMap<String, UserRecord>;

/// User and group operations a front end can run against any identity store.
///
/// Implementations enforce the existence and uniqueness rules themselves and
/// report them with the domain variants of [`BackendError`](super::BackendError).
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Checks a password. Unknown users and wrong passwords are `Ok(false)`.
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool>;

    /// Adds a user. Fails with `UserAlreadyExists` if the key is taken.
    async fn add_user(&self, attrs: &UserRecord) -> Result<()>;

    /// Deletes a user. Fails with `UserDoesntExist` if absent.
    async fn delete_user(&self, username: &str) -> Result<()>;

    /// Updates only the supplied attributes of an existing user.
    async fn set_attributes(&self, username: &str, attrs: &UserRecord) -> Result<()>;

    /// Adds the user to every listed group not already present.
    async fn add_to_groups(&self, username: &str, groups: &[String]) -> Result<()>;

    /// Removes the user from every listed group.
    async fn remove_from_groups(&self, username: &str, groups: &[String]) -> Result<()>;

    /// Finds users whose key or mail matches `pattern`.
    async fn search(&self, pattern: &str) -> Result<UserMap>;

    /// Gets every stored attribute of a user.
    async fn get_user(&self, username: &str) -> Result<UserRecord>;

    /// Gets the user's groups in membership order.
    async fn get_groups(&self, username: &str) -> Result<Vec<String>>;
}
