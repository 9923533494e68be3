use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        dto::TokenResponse,
        jwt::JwtKeys,
        password::{hash_password, verify_password_blocking},
        repo::{InMemoryUserStore, UserStore},
    },
    config::AppConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Who a verified bearer token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Password login and bearer token verification.
pub struct Authenticator {
    keys: JwtKeys,
    users: Arc<dyn UserStore>,
    // Verified against when the username is unknown.
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(keys: JwtKeys, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        Ok(Self {
            keys,
            users,
            dummy_hash: hash_password("unknown-user-placeholder")?,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = InMemoryUserStore::from_entries(&config.users)?;
        if store.is_empty() {
            warn!("no users configured (AUTH_USERS is empty); every login will fail");
        } else {
            info!(users = store.len(), "user store loaded");
        }
        Self::new(JwtKeys::from_config(&config.jwt), Arc::new(store))
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            let _ = verify_password_blocking(password, &self.dummy_hash).await;
            warn!(username, "login unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password_blocking(password, &user.password_hash).await? {
            warn!(username, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.sign(&user.username)?;
        info!(username, "user logged in");
        Ok(TokenResponse::bearer(token))
    }

    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AuthError::Unauthorized
        })?;

        match self.users.find_by_username(&claims.sub).await? {
            Some(user) => Ok(Identity {
                username: user.username,
            }),
            None => {
                warn!(username = %claims.sub, "token subject is not a known user");
                Err(AuthError::Unauthorized)
            }
        }
    }
}
