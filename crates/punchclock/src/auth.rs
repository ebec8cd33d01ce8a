//! User accounts and the login boundary.
//!
//! Registered users live under [`keys::USERS`]; the logged-in user under
//! [`keys::CURRENT_USER`]. Passwords are kept as Argon2 PHC strings.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::store::{keys, KeyValueStore};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identifier, used as the ledger's `userId`.
    pub id: String,
    /// Login email, stored lowercase.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2 hash of the password.
    pub password_hash: String,
}

/// Registration and login over the key-value store.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: Arc<dyn KeyValueStore>,
}

impl Accounts {
    /// Create an account registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All registered users.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails or holds malformed data.
    pub fn users(&self) -> Result<Vec<User>> {
        match self.store.get(keys::USERS)? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::storage(format!("malformed user list: {e}"))),
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `UserExists` if the email is taken, or a storage error.
    pub fn register(&self, email: &str, name: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let mut users = self.users()?;

        if users.iter().any(|u| u.email == email) {
            return Err(Error::UserExists { email });
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: name.trim().to_string(),
            password_hash: hash_password(password)?,
        };
        users.push(user.clone());
        self.store.set(keys::USERS, &serde_json::to_value(&users)?)?;

        info!(user_id = %user.id, email = %user.email, "Registered user");
        Ok(user)
    }

    /// Log in and remember the user as current.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if no user matches, or a storage error.
    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let user = self
            .users()?
            .into_iter()
            .find(|u| u.email == email && verify_password(password, &u.password_hash))
            .ok_or(Error::InvalidCredentials)?;

        self.store
            .set(keys::CURRENT_USER, &serde_json::to_value(&user)?)?;
        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Forget the current user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be written.
    pub fn logout(&self) -> Result<()> {
        self.store.remove(keys::CURRENT_USER)?;
        info!("Logged out");
        Ok(())
    }

    /// The logged-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails or holds malformed data.
    pub fn current_user(&self) -> Result<Option<User>> {
        self.store
            .get(keys::CURRENT_USER)?
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| Error::storage(format!("malformed current user: {e}")))
            })
            .transpose()
    }

    /// Check if someone is logged in.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails.
    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.current_user()?.is_some())
    }

    /// The logged-in user, or `NotLoggedIn`.
    ///
    /// # Errors
    ///
    /// Returns `NotLoggedIn` when logged out, or a storage error.
    pub fn require_user(&self) -> Result<User> {
        self.current_user()?.ok_or(Error::NotLoggedIn)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
