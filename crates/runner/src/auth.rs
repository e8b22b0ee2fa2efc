//! Authentication adapters
//!
//! An adapter turns a credential value plus its auth scheme
//! configuration into an `Authorization` header value. Adapters are
//! selected by the credential kind, which must match both a registry
//! entry and a key in the case's merged scheme map; when either is
//! absent the case proceeds without authorization.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use restspec_core::{CaseContext, Credentials};

use crate::error::{RunError, RunResult};

#[async_trait]
pub trait AuthAdapter: Send + Sync {
    /// The credential kind this adapter handles, e.g. `"oauth2"`.
    fn kind(&self) -> &'static str;

    /// Produce the `Authorization` header value for one case.
    async fn authorize(
        &self,
        scheme: &Value,
        credentials: &Credentials,
        client: &reqwest::Client,
    ) -> RunResult<String>;
}

/// Registry of adapters keyed by credential kind.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn AuthAdapter>>,
}

impl AdapterRegistry {
    /// Registry with the built-in `oauth2` and `basic` adapters.
    pub fn builtin() -> Self {
        let mut registry = Self {
            adapters: HashMap::new(),
        };
        registry.register(Arc::new(PasswordGrantAdapter));
        registry.register(Arc::new(BasicAuthAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn AuthAdapter>) {
        self.adapters.insert(adapter.kind().to_string(), adapter);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn AuthAdapter>> {
        self.adapters.get(kind)
    }
}

/// Authentication pre-step for one case.
///
/// Returns the `Authorization` header value, or `None` when the case
/// has no credentials or no matching scheme/adapter.
pub async fn authorize_case(
    registry: &AdapterRegistry,
    context: &CaseContext,
    client: &reqwest::Client,
) -> RunResult<Option<String>> {
    let Some(credentials) = &context.credentials else {
        return Ok(None);
    };
    let Some(scheme) = context.auth_schemes.get(&credentials.kind) else {
        debug!(kind = %credentials.kind, "no auth scheme for credential kind, skipping auth");
        return Ok(None);
    };
    let Some(adapter) = registry.get(&credentials.kind) else {
        debug!(kind = %credentials.kind, "no adapter for credential kind, skipping auth");
        return Ok(None);
    };
    adapter.authorize(scheme, credentials, client).await.map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuth2Scheme {
    grant_types: GrantTypes,
}

#[derive(Deserialize)]
struct GrantTypes {
    password: Option<PasswordGrant>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordGrant {
    token_endpoint: TokenEndpoint,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenEndpoint {
    url: String,
    token_name: String,
}

#[derive(Deserialize)]
struct OAuth2Credentials {
    user: serde_json::Map<String, Value>,
    client: ClientCredentials,
}

#[derive(Deserialize)]
struct ClientCredentials {
    id: String,
    secret: String,
}

/// OAuth2 password-grant adapter.
///
/// A token already cached on the shared credential value is reused
/// without a network call; otherwise one token exchange runs and its
/// result is cached for every later case holding the same credentials.
pub struct PasswordGrantAdapter;

#[async_trait]
impl AuthAdapter for PasswordGrantAdapter {
    fn kind(&self) -> &'static str {
        "oauth2"
    }

    async fn authorize(
        &self,
        scheme: &Value,
        credentials: &Credentials,
        client: &reqwest::Client,
    ) -> RunResult<String> {
        if let Some(token) = credentials.cached_token() {
            debug!(credentials = %credentials.description, "reusing cached token");
            return Ok(format!("Bearer {token}"));
        }

        let scheme: OAuth2Scheme = serde_json::from_value(scheme.clone())
            .map_err(|e| RunError::Auth(format!("malformed oauth2 scheme: {e}")))?;
        let grant = scheme
            .grant_types
            .password
            .ok_or_else(|| RunError::UnsupportedGrant("password".to_string()))?;
        let creds: OAuth2Credentials = serde_json::from_value(credentials.value.clone())
            .map_err(|e| RunError::Auth(format!("malformed oauth2 credentials: {e}")))?;

        let mut body = serde_json::Map::new();
        body.insert("grant_type".to_string(), Value::String("password".to_string()));
        body.extend(creds.user);

        debug!(url = %grant.token_endpoint.url, "exchanging password grant for a token");
        let response = client
            .post(&grant.token_endpoint.url)
            .basic_auth(&creds.client.id, Some(&creds.client.secret))
            .json(&Value::Object(body))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, "token exchange rejected");
            return Err(RunError::TokenStatus {
                status: status.as_u16(),
            });
        }

        let payload: Value = response.json().await?;
        let token = payload
            .get(&grant.token_endpoint.token_name)
            .and_then(Value::as_str)
            .ok_or_else(|| RunError::TokenMissing(grant.token_endpoint.token_name.clone()))?;

        credentials.cache_token(token.to_string());
        Ok(format!("Bearer {token}"))
    }
}

/// Basic auth adapter; purely local, no handshake.
pub struct BasicAuthAdapter;

#[derive(Deserialize)]
struct BasicCredentials {
    username: String,
    password: String,
}

#[async_trait]
impl AuthAdapter for BasicAuthAdapter {
    fn kind(&self) -> &'static str {
        "basic"
    }

    async fn authorize(
        &self,
        _scheme: &Value,
        credentials: &Credentials,
        _client: &reqwest::Client,
    ) -> RunResult<String> {
        let creds: BasicCredentials = serde_json::from_value(credentials.value.clone())
            .map_err(|e| RunError::Auth(format!("malformed basic credentials: {e}")))?;
        let encoded = BASE64.encode(format!("{}:{}", creds.username, creds.password));
        Ok(format!("Basic {encoded}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn context(
        credentials: Option<Arc<Credentials>>,
        schemes: BTreeMap<String, Value>,
    ) -> CaseContext {
        CaseContext {
            base_url: "http://localhost".to_string(),
            path: String::new(),
            verb: "get".to_string(),
            params: Default::default(),
            credentials,
            auth_schemes: schemes,
            options: Default::default(),
            expects: Vec::new(),
        }
    }

    #[tokio::test]
    async fn basic_credentials_encode_to_the_expected_header() {
        let creds = Credentials::basic("svc", "aladdin", "opensesame");
        let adapter = BasicAuthAdapter;
        let header = adapter
            .authorize(&json!({}), &creds, &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(header, "Basic YWxhZGRpbjpvcGVuc2VzYW1l");
    }

    #[tokio::test]
    async fn missing_scheme_skips_authentication() {
        let creds = Credentials::basic("svc", "u", "p").shared();
        let registry = AdapterRegistry::builtin();
        let ctx = context(Some(creds), BTreeMap::new());
        let header = authorize_case(&registry, &ctx, &reqwest::Client::new())
            .await
            .unwrap();
        assert!(header.is_none());
    }

    #[tokio::test]
    async fn missing_adapter_skips_authentication() {
        let creds = Credentials::new("svc", "hmac", json!({})).shared();
        let registry = AdapterRegistry::builtin();
        let mut schemes = BTreeMap::new();
        schemes.insert("hmac".to_string(), json!({}));
        let ctx = context(Some(creds), schemes);
        let header = authorize_case(&registry, &ctx, &reqwest::Client::new())
            .await
            .unwrap();
        assert!(header.is_none());
    }

    #[tokio::test]
    async fn cached_token_short_circuits_the_exchange() {
        let creds =
            Credentials::oauth2("svc", json!({"username": "a", "password": "b"}), "c1", "s1");
        creds.cache_token("tok".to_string());
        let adapter = PasswordGrantAdapter;
        // Scheme is never consulted on a cache hit, so an empty value
        // is enough here.
        let header = adapter
            .authorize(&json!({}), &creds, &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(header, "Bearer tok");
    }

    #[tokio::test]
    async fn scheme_without_a_password_grant_fails() {
        let creds =
            Credentials::oauth2("svc", json!({"username": "a", "password": "b"}), "c1", "s1");
        let adapter = PasswordGrantAdapter;
        let err = adapter
            .authorize(
                &json!({"grantTypes": {}}),
                &creds,
                &reqwest::Client::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::UnsupportedGrant(_)));
    }
}
