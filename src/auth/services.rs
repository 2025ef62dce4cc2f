use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::PasswordHasher,
        repo::UserStore,
        repo_types::{InsertOutcome, NewUser, User},
    },
    errors::ApiError,
};

pub const MIN_PASSWORD_LEN: usize = 6;

// Verified against when the username is unknown, so both login failure
// paths do the same work.
const DUMMY_PASSWORD: &str = "taskgate-dummy-password";

/// Canonical form used for storage and lookup.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Registration and login over a [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: PasswordHasher,
        keys: JwtKeys,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?.into();
        Ok(Self {
            users,
            hasher,
            keys,
            dummy_hash,
        })
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Creates the account; does not log the user in.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::validation("username and password are required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = self.hasher.spawn_hash(password.to_owned()).await?;

        match self
            .users
            .insert(NewUser {
                username: username.clone(),
                password_hash,
            })
            .await?
        {
            InsertOutcome::Created(user) => {
                info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user)
            }
            InsertOutcome::DuplicateKey => {
                warn!(username = %username, "username already registered");
                Err(ApiError::Conflict)
            }
        }
    }

    /// Returns a signed bearer token. Unknown user and wrong password produce
    /// the same [`ApiError::InvalidCredentials`].
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::validation("username and password are required"));
        }

        let user = self.users.find_by_normalized_username(&username).await?;
        let stored = match &user {
            Some(u) => u.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let ok = self.hasher.spawn_verify(password.to_owned(), stored).await?;

        let user = match user {
            Some(u) if ok => u,
            Some(u) => {
                warn!(user_id = %u.id, "login invalid password");
                return Err(ApiError::InvalidCredentials);
            }
            None => {
                warn!(username = %username, "login unknown username");
                return Err(ApiError::InvalidCredentials);
            }
        };

        let token = self.keys.issue(user.id, &user.username)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }
}
