//! Registration, login, and session management.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use souq_core::{Email, EmailError, Role, UserId};

use crate::models::User;
use crate::store::{Store, StoreError};

use super::random_token;

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("current password is incorrect")]
    WrongPassword,

    #[error("{0}")]
    Validation(String),

    #[error("password hashing failed")]
    Hash,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<serde_json::Value>,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    session_ttl: Duration,
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, session_ttl_days: i64) -> Self {
        Self {
            store,
            session_ttl: Duration::days(session_ttl_days),
        }
    }

    /// Create an account and log it in.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("name is required".to_owned()));
        }
        let email = Email::parse(email)?;
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            name: name.to_owned(),
            email,
            password_hash: Some(hash_password(password)?),
            google_id: None,
            phone: None,
            address: None,
            avatar: String::new(),
            role: Role::User,
            is_active: true,
            wishlist: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let user = self.store.insert_user(user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        })?;
        self.open_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let Some(user) = self.store.user_by_email(&email).await? else {
            // Unknown accounts still pay for a verification.
            let _ = verify_password(DUMMY_HASH, password);
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(hash, password) {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        self.open_session(user).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete_session(token).await?;
        Ok(())
    }

    /// Resolve a bearer token to its active user.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.store.session_user(token).await? else {
            return Ok(None);
        };
        let user = self.store.user(user_id).await?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn change_password(
        &self,
        mut user: User,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::WrongPassword);
        };
        if !verify_password(hash, current) {
            return Err(AuthError::WrongPassword);
        }
        if new.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort);
        }
        user.password_hash = Some(hash_password(new)?);
        user.updated_at = Utc::now();
        self.store.update_user(user).await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        mut user: User,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        if let Some(name) = update.name {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(AuthError::Validation("name cannot be empty".to_owned()));
            }
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(address) = update.address {
            user.address = Some(address);
        }
        if let Some(avatar) = update.avatar {
            user.avatar = avatar;
        }
        user.updated_at = Utc::now();
        Ok(self.store.update_user(user).await?)
    }

    async fn open_session(&self, user: User) -> Result<Session, AuthError> {
        let token = random_token();
        let expires_at = Utc::now() + self.session_ttl;
        self.store
            .insert_session(&token, user.id, expires_at)
            .await?;
        Ok(Session { token, user })
    }
}

/// Argon2 hash of an empty string, verified against when the account
/// does not exist.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AuthError::Hash)
}

fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("hunter22").expect("hash");
        assert!(verify_password(&hash, "hunter22"));
        assert!(!verify_password(&hash, "hunter23"));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-hash", "anything"));
    }
}
