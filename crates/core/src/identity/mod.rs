mod config;
mod error;
mod functions;
mod groups;
mod traits;
mod types;
mod validation;

pub use config::{BackendConfig, ConnectionParams, DEFAULT_TABLE, DEFAULT_TIMEOUT_SECS};
pub use error::{BackendError, Result};
pub use functions::{
    compile_search_pattern, hash_password, prepare_new_user, prepare_update, record_matches,
    verify_password,
};
pub use groups::{merge_groups, remove_groups};
pub use traits::{IdentityBackend, UserMap};
pub use types::{
    GroupList, UserRecord, GROUPS_ATTRIBUTE, GROUP_SEPARATOR, MAIL_ATTRIBUTE, PASSWORD_ATTRIBUTE,
};
pub use validation::{check_group_universe, validate_attribute_names, validate_group_names};
