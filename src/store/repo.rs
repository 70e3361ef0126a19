use crate::domain::chat::{ChatId, Profile};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub name: String,
    pub firstname: Option<String>,
    pub username: Option<String>,
    pub is_registered: bool,
    pub created_at: i64,
}

/// Durable per-chat registration state behind the password gate.
pub trait UserDirectory: Send + Sync {
    fn get_user(&self, chat: &ChatId) -> Result<Option<UserRecord>, StoreError>;

    fn is_registered(&self, chat: &ChatId) -> Result<bool, StoreError> {
        Ok(self.get_user(chat)?.is_some_and(|u| u.is_registered))
    }

    /// Mark the chat registered, creating the row if needed.
    fn register(&self, chat: &ChatId, profile: &Profile) -> Result<(), StoreError>;

    /// Record a first contact. Leaves an existing row untouched.
    fn create_unregistered(&self, chat: &ChatId, profile: &Profile) -> Result<(), StoreError>;

    /// Whitespace-trimmed, case-sensitive comparison with the shared password.
    fn check_password(&self, candidate: &str) -> bool;

    fn registered_users(&self) -> Result<Vec<UserRecord>, StoreError>;
}
