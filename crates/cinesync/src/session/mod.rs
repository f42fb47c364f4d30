//! Persisted login session and the admin gate.
//!
//! The session lives in a [`KeyValueStore`] under the `currentUser`,
//! `isAuthenticated` and `rememberMe` keys. Two backends are provided: an
//! in-memory map and a JSON file.

mod file;
mod memory;

pub use file::FileKv;
pub use memory::MemoryKv;

use std::sync::Arc;

use cinesync_core::cinema::User;
use cinesync_core::session::{
    check_admin, credentials_match, KeyValueStore, Result, SessionError, CURRENT_USER_KEY,
    IS_AUTHENTICATED_KEY, REMEMBER_ME_KEY,
};
use cinesync_core::store::{Filter, RemoteStore};

use crate::collection::{decode_rows, Resource};
use crate::resources::Users;

/// Login state of the dashboard operator.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Session kept only for the life of the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKv::new()))
    }

    /// Stores `user` as the authenticated operator.
    pub async fn login(&self, user: &User, remember_me: bool) -> Result<()> {
        let raw = serde_json::to_string(user).map_err(|e| SessionError::Storage(e.to_string()))?;
        self.storage.set(CURRENT_USER_KEY, &raw).await?;
        self.storage.set(IS_AUTHENTICATED_KEY, "true").await?;
        if remember_me {
            self.storage.set(REMEMBER_ME_KEY, "true").await?;
        } else {
            self.storage.remove(REMEMBER_ME_KEY).await?;
        }
        tracing::info!(user_id = user.id, email = %user.email, "Logged in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.storage.remove(CURRENT_USER_KEY).await?;
        self.storage.remove(IS_AUTHENTICATED_KEY).await?;
        self.storage.remove(REMEMBER_ME_KEY).await?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        match self.storage.get(CURRENT_USER_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| SessionError::Corrupted(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.storage.get(IS_AUTHENTICATED_KEY).await?.as_deref() == Some("true"))
    }

    pub async fn remember_me(&self) -> Result<bool> {
        Ok(self.storage.get(REMEMBER_ME_KEY).await?.as_deref() == Some("true"))
    }

    /// Lets the stored user through only when it is an authenticated
    /// administrator.
    pub async fn authorize_admin(&self) -> Result<User> {
        let current_user = self.storage.get(CURRENT_USER_KEY).await?;
        let is_authenticated = self.storage.get(IS_AUTHENTICATED_KEY).await?;
        let result = check_admin(current_user.as_deref(), is_authenticated.as_deref());
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Admin gate rejected session");
        }
        result
    }

    /// Checks the credentials against `usuario` and logs the user in.
    pub async fn sign_in(
        &self,
        store: &dyn RemoteStore,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<User> {
        let query = Users
            .query()
            .filter(Filter::ilike("email", email.trim()));
        let rows = store
            .select(&query)
            .await
            .map_err(|e| SessionError::Lookup(e.to_string()))?;
        let users: Vec<User> =
            decode_rows(rows).map_err(|e| SessionError::Lookup(e.to_string()))?;

        let Some(user) = users
            .into_iter()
            .find(|user| credentials_match(user, email, password))
        else {
            tracing::warn!(email = %email.trim(), "Sign-in rejected");
            return Err(SessionError::InvalidCredentials);
        };

        self.login(&user, remember_me).await?;
        Ok(user)
    }
}
