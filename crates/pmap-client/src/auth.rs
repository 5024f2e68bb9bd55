use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use pmap_types::User;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};

/// Who is signed in, if anyone. Both halves are present or neither is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
}

/// Single owner of the session. Views share it through an `Arc` and the
/// API client borrows the token per request.
pub struct AuthStore {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<AuthState>,
}

impl AuthStore {
    /// Restore whatever session the storage holds.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let state = read_persisted(storage.as_ref());
        match &state.user {
            Some(user) => info!("Restored session for {}", user.email),
            None => debug!("No stored session"),
        }

        Self {
            storage,
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().ok().and_then(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.state
            .read()
            .map(|s| s.user.is_some() && s.token.is_some())
            .unwrap_or(false)
    }

    pub async fn login(&self, api: &ApiClient, email: &str, password: &str) -> Result<User, ClientError> {
        let response = api.login(email, password).await?;
        self.sign_in(response.user.clone(), response.token)?;
        info!("Signed in as {}", response.user.email);
        Ok(response.user)
    }

    /// Tell the server, then forget the session locally no matter what it said.
    pub async fn logout(&self, api: &ApiClient) {
        let token = self.token();
        if let Err(e) = api.logout(token.as_deref()).await {
            warn!("Remote logout failed, signing out locally anyway: {}", e);
        }
        self.clear();
        info!("Signed out");
    }

    /// The server rejected our token: drop the session without a round trip.
    pub fn expire(&self) {
        warn!("Session expired");
        self.clear();
    }

    fn sign_in(&self, user: User, token: String) -> Result<(), ClientError> {
        let encoded = serde_json::to_string(&user).map_err(crate::storage::StorageError::from)?;
        self.storage.set(USER_KEY, &encoded)?;
        self.storage.set(TOKEN_KEY, &token)?;

        if let Ok(mut state) = self.state.write() {
            *state = AuthState {
                user: Some(user),
                token: Some(token),
            };
        }
        Ok(())
    }

    fn clear(&self) {
        for key in [USER_KEY, TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!("Failed to remove stored {}: {}", key, e);
            }
        }
        match self.state.write() {
            Ok(mut state) => *state = AuthState::default(),
            Err(poisoned) => *poisoned.into_inner() = AuthState::default(),
        }
    }
}

/// Browsers used to persist the literal strings "undefined" and "null".
fn is_present(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty() && raw != "undefined" && raw != "null"
}

fn read_persisted(storage: &dyn KeyValueStore) -> AuthState {
    let token = storage.get(TOKEN_KEY).filter(|t| is_present(t));
    let user = storage
        .get(USER_KEY)
        .filter(|u| is_present(u))
        .and_then(|raw| match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring corrupt stored user: {}", e);
                None
            }
        });

    match (user, token) {
        (Some(user), Some(token)) => AuthState {
            user: Some(user),
            token: Some(token),
        },
        _ => AuthState::default(),
    }
}
