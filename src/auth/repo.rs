use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    auth::{password::check_hash, repo_types::User},
    config::UserEntry,
};

/// Lookup capability the authenticator depends on. A database-backed store
/// can replace the in-memory one without touching the auth flow.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
}

/// Users fixed at startup.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: HashMap<String, User>,
}

impl InMemoryUserStore {
    /// Fails if any entry carries a hash that is not a PHC string.
    pub fn from_entries(entries: &[UserEntry]) -> anyhow::Result<Self> {
        let mut users = HashMap::with_capacity(entries.len());
        for entry in entries {
            check_hash(&entry.password_hash)
                .map_err(|e| e.context(format!("user `{}`", entry.username)))?;
            users.insert(
                entry.username.clone(),
                User {
                    username: entry.username.clone(),
                    password_hash: entry.password_hash.clone(),
                },
            );
        }
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;

    #[tokio::test]
    async fn finds_configured_user() {
        let hash = hash_password("pw").unwrap();
        let store = InMemoryUserStore::from_entries(&[UserEntry {
            username: "alice".into(),
            password_hash: hash.clone(),
        }])
        .expect("valid entries");

        let user = store.find_by_username("alice").await.unwrap().expect("present");
        assert_eq!(user.password_hash, hash);
        assert!(store.find_by_username("bob").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejects_malformed_hash() {
        let err = InMemoryUserStore::from_entries(&[UserEntry {
            username: "alice".into(),
            password_hash: "plaintext".into(),
        }])
        .unwrap_err();
        assert!(format!("{err:#}").contains("alice"));
    }
}
