//! Credential values and their per-node inheritance state

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// A credential value usable by an authentication adapter.
///
/// `kind` selects the adapter (and the auth scheme entry) at run time,
/// e.g. `"oauth2"` or `"basic"`. `value` is the adapter-specific shape:
/// password grant expects `{"user": {...}, "client": {"id", "secret"}}`,
/// basic auth expects `{"username", "password"}`.
///
/// The token slot is a shared cache: when an adapter exchanges these
/// credentials for a token, it stores the token here, and every later
/// test case holding the same `Arc<Credentials>` reuses it without a
/// network round trip. The cache has no expiry and no refresh; it lives
/// as long as the `Arc` does.
#[derive(Debug)]
pub struct Credentials {
    pub description: String,
    pub kind: String,
    pub value: Value,
    token: Mutex<Option<String>>,
}

impl Credentials {
    pub fn new(
        description: impl Into<String>,
        kind: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            description: description.into(),
            kind: kind.into(),
            value,
            token: Mutex::new(None),
        }
    }

    /// Password-grant OAuth2 credentials: a resource-owner `user` object
    /// plus the client id/secret used for the token exchange.
    pub fn oauth2(
        description: impl Into<String>,
        user: Value,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::new(
            description,
            "oauth2",
            json!({
                "user": user,
                "client": { "id": client_id.into(), "secret": client_secret.into() },
            }),
        )
    }

    /// Basic-auth credentials.
    pub fn basic(
        description: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            description,
            "basic",
            json!({ "username": username.into(), "password": password.into() }),
        )
    }

    /// Wrap in an `Arc` so several scopes (and their compiled cases)
    /// share one token cache.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn cached_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    pub fn cache_token(&self, token: String) {
        *self.token.lock() = Some(token);
    }
}

/// Per-node credential state.
///
/// `Inherit` (the default) defers to the nearest ancestor; `Removed` is
/// an explicit tombstone that makes the effective credentials none,
/// which is distinct from merely being unset.
#[derive(Clone, Debug, Default)]
pub enum CredentialState {
    #[default]
    Inherit,
    Removed,
    Set(Arc<Credentials>),
}

impl CredentialState {
    /// Fold one more level of the root-to-leaf chain into the
    /// accumulated effective credentials.
    pub fn apply(&self, acc: Option<Arc<Credentials>>) -> Option<Arc<Credentials>> {
        match self {
            CredentialState::Inherit => acc,
            CredentialState::Removed => None,
            CredentialState::Set(creds) => Some(Arc::clone(creds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cache_is_shared_through_clone_of_the_arc() {
        let creds = Credentials::basic("svc", "u", "p").shared();
        let other = Arc::clone(&creds);
        assert_eq!(other.cached_token(), None);
        creds.cache_token("tok".into());
        assert_eq!(other.cached_token(), Some("tok".into()));
    }

    #[test]
    fn removed_tombstone_overrides_inherited_value() {
        let creds = Credentials::basic("svc", "u", "p").shared();
        let inherited = CredentialState::Set(creds).apply(None);
        assert!(inherited.is_some());
        assert!(CredentialState::Removed.apply(inherited).is_none());
        let creds2 = Credentials::basic("svc2", "u", "p").shared();
        let kept = CredentialState::Inherit.apply(Some(creds2));
        assert_eq!(kept.unwrap().description, "svc2");
    }
}
