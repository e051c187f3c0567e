use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::storage::{KeyValueStore, TOKEN_KEY, USERNAME_KEY, USER_TYPE_KEY};

pub const ADMIN_ROLE: &str = "admin";

/// Current identity as seen by the client.
///
/// `is_logged_in` is derived: it holds iff both `username` and `token` are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
    pub user_type: String,
    pub is_logged_in: bool,
}

impl Session {
    fn derive_logged_in(mut self) -> Self {
        self.is_logged_in = !self.username.is_empty() && !self.token.is_empty();
        self
    }
}

#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub username: String,
    pub token: String,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    pub username: String,
    pub token: String,
}

impl AuthHeaders {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.token.is_empty()
    }
}

/// Owns the session and its persisted copy.
///
/// The in-memory state is refreshed only by [`Store::hydrate`]; callers re-hydrate
/// after any gap in which another holder may have logged out.
pub struct Store {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<Session>,
}

impl Store {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            state: RwLock::new(Session::default()),
        }
    }

    pub fn hydrate(&self) -> Result<Session> {
        let username = self.storage.get_string(USERNAME_KEY)?;
        let token = self.storage.get_string(TOKEN_KEY)?;
        let user_type = self.storage.get_string(USER_TYPE_KEY)?;
        let session = Session {
            username,
            token,
            user_type,
            is_logged_in: false,
        }
        .derive_logged_in();
        *self.state.write() = session.clone();
        Ok(session)
    }

    pub fn set_auth(&self, payload: AuthPayload) -> Result<()> {
        self.storage
            .set_string(USERNAME_KEY, &payload.username)
            .context("session: persist username")?;
        self.storage
            .set_string(TOKEN_KEY, &payload.token)
            .context("session: persist token")?;
        if let Some(user_type) = payload.user_type.as_deref() {
            self.storage
                .set_string(USER_TYPE_KEY, user_type)
                .context("session: persist user type")?;
        }

        let mut state = self.state.write();
        let user_type = payload.user_type.unwrap_or_else(|| state.user_type.clone());
        *state = Session {
            username: payload.username,
            token: payload.token,
            user_type,
            is_logged_in: false,
        }
        .derive_logged_in();
        if state.is_logged_in {
            tracing::info!(username = %state.username, "session established");
        } else {
            tracing::warn!(username = %state.username, "session stored without complete credentials");
        }
        Ok(())
    }

    pub fn set_user_type(&self, user_type: Option<&str>) -> Result<()> {
        let normalized = user_type.unwrap_or_default().to_string();
        self.storage
            .set_string(USER_TYPE_KEY, &normalized)
            .context("session: persist user type")?;
        self.state.write().user_type = normalized;
        Ok(())
    }

    pub fn clear_auth(&self) -> Result<()> {
        *self.state.write() = Session::default();
        self.storage
            .remove(USERNAME_KEY)
            .context("session: remove username")?;
        self.storage.remove(TOKEN_KEY).context("session: remove token")?;
        self.storage
            .remove(USER_TYPE_KEY)
            .context("session: remove user type")?;
        tracing::info!("session cleared");
        Ok(())
    }

    pub fn current(&self) -> Session {
        self.state.read().clone()
    }

    pub fn is_admin(&self) -> bool {
        self.state.read().user_type.eq_ignore_ascii_case(ADMIN_ROLE)
    }

    pub fn auth_headers(&self) -> AuthHeaders {
        let state = self.state.read();
        AuthHeaders {
            username: state.username.clone(),
            token: state.token.clone(),
        }
    }

    /// Releases the in-memory copy; persisted values are left alone.
    pub fn dispose(&self) {
        *self.state.write() = Session::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, Store) {
        let kv = Arc::new(MemoryStore::new());
        let store = Store::new(kv.clone());
        (kv, store)
    }

    fn alice() -> AuthPayload {
        AuthPayload {
            username: "alice".into(),
            token: "tok".into(),
            user_type: None,
        }
    }

    #[test]
    fn hydrate_derives_login_from_persisted_keys() {
        let (kv, store) = store();
        assert!(!store.hydrate().unwrap().is_logged_in);

        kv.set_string(USERNAME_KEY, "alice").unwrap();
        assert!(!store.hydrate().unwrap().is_logged_in);

        kv.set_string(TOKEN_KEY, "tok").unwrap();
        let session = store.hydrate().unwrap();
        assert!(session.is_logged_in);
        assert_eq!(session.username, "alice");
    }

    #[test]
    fn set_auth_keeps_previous_user_type_when_absent() {
        let (kv, store) = store();
        store.set_user_type(Some("admin")).unwrap();
        store.set_auth(alice()).unwrap();

        let session = store.current();
        assert!(session.is_logged_in);
        assert_eq!(session.user_type, "admin");
        assert_eq!(kv.get_string(USER_TYPE_KEY).unwrap(), "admin");
    }

    #[test]
    fn set_auth_is_visible_to_hydrate_and_headers() {
        let (_kv, store) = store();
        store.set_auth(alice()).unwrap();
        assert_eq!(
            store.hydrate().unwrap(),
            Session {
                username: "alice".into(),
                token: "tok".into(),
                user_type: String::new(),
                is_logged_in: true,
            }
        );
        let headers = store.auth_headers();
        assert!(headers.is_complete());
        assert_eq!(headers.username, "alice");
    }

    #[test]
    fn empty_token_is_not_a_login() {
        let (_kv, store) = store();
        store
            .set_auth(AuthPayload {
                token: String::new(),
                ..alice()
            })
            .unwrap();
        assert!(!store.current().is_logged_in);
        assert!(!store.auth_headers().is_complete());
        assert_eq!(store.hydrate().unwrap().is_logged_in, store.current().is_logged_in);
    }

    #[test]
    fn clear_then_hydrate_yields_logged_out_default() {
        let (kv, store) = store();
        store
            .set_auth(AuthPayload {
                user_type: Some("ADMIN".into()),
                ..alice()
            })
            .unwrap();
        store.clear_auth().unwrap();

        assert_eq!(store.hydrate().unwrap(), Session::default());
        assert!(kv.is_empty());
        assert_eq!(store.auth_headers(), AuthHeaders::default());
    }

    #[test]
    fn admin_check_ignores_case() {
        let (_kv, store) = store();
        store.set_user_type(Some("Admin")).unwrap();
        assert!(store.is_admin());
        store.set_user_type(None).unwrap();
        assert!(!store.is_admin());
        assert_eq!(store.current().user_type, "");
    }
}
