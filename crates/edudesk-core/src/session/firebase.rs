//! Firebase Identity Toolkit provider client.
//!
//! Speaks the Identity Toolkit REST API: password sign-in/sign-up, federated
//! sign-in, account lookup, secure-token refresh, and verification-email
//! dispatch. Holds the
//! refresh token internally; bearer tokens are handed out per-call through
//! [`IdentityProvider::current_token`] and refreshed when forced or expired.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::{Credential, IdentityProvider, Principal};
use crate::util::unix_timestamp_now;

const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Clone, PartialEq, Eq)]
struct TokenState {
    id_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl TokenState {
    fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenState")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Production [`IdentityProvider`] backed by the Identity Toolkit REST API.
pub struct FirebaseIdentityProvider {
    identity_url: String,
    token_url: String,
    api_key: String,
    client: Client,
    tokens: Mutex<Option<TokenState>>,
}

impl std::fmt::Debug for FirebaseIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentityProvider")
            .field("identity_url", &self.identity_url)
            .field("token_url", &self.token_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FirebaseIdentityProvider {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_endpoints(
            &config.identity_url,
            SECURE_TOKEN_URL,
            &config.identity_api_key,
            config.request_timeout(),
        )
    }

    /// Construct against explicit endpoints; used by tests and by `new`.
    pub fn with_endpoints(
        identity_url: &str,
        token_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::InvalidInput(
                "identity API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            identity_url: identity_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: Client::builder().timeout(timeout).build()?,
            tokens: Mutex::new(None),
        })
    }

    /// Resume a persisted session from a stored refresh token.
    ///
    /// Refreshes immediately and looks the account up so the caller gets a
    /// current [`Principal`]; a rejected refresh token clears nothing on the
    /// server and simply fails.
    pub async fn adopt_refresh_token(&self, refresh_token: &str) -> Result<Principal> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(Error::InvalidInput(
                "refresh token must not be empty".to_string(),
            ));
        }

        let state = self.refresh(refresh_token).await?;
        let principal = self.lookup(&state.id_token).await?;
        *lock_recovering(&self.tokens) = Some(state);
        Ok(principal)
    }

    /// The refresh token to persist across invocations, if signed in.
    pub fn refresh_token_snapshot(&self) -> Option<String> {
        lock_recovering(&self.tokens)
            .as_ref()
            .map(|state| state.refresh_token.clone())
    }

    async fn password_grant(&self, operation: &str, email: &str, password: &str) -> Result<Principal> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let response = self
            .client
            .post(format!(
                "{}/accounts:{operation}?key={}",
                self.identity_url, self.api_key
            ))
            .json(&payload)
            .send()
            .await?;
        self.adopt_grant(response).await
    }

    /// Exchange an OAuth credential from an external provider for a
    /// Firebase session, the `accounts:signInWithIdp` flow.
    async fn idp_grant(&self, provider_id: &str, id_token: &str) -> Result<Principal> {
        let payload = serde_json::json!({
            "postBody": format!("id_token={id_token}&providerId={provider_id}"),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let response = self
            .client
            .post(format!(
                "{}/accounts:signInWithIdp?key={}",
                self.identity_url, self.api_key
            ))
            .json(&payload)
            .send()
            .await?;
        self.adopt_grant(response).await
    }

    /// Decode a token grant, look the account up, and install the tokens.
    async fn adopt_grant(&self, response: reqwest::Response) -> Result<Principal> {
        let granted = decode_identity_response::<SignInResponse>(response).await?;

        let state = TokenState {
            id_token: granted.id_token,
            refresh_token: granted.refresh_token,
            expires_at: expires_at_from(granted.expires_in.as_deref()),
        };
        let principal = self.lookup(&state.id_token).await?;
        *lock_recovering(&self.tokens) = Some(state);
        Ok(principal)
    }

    async fn lookup(&self, id_token: &str) -> Result<Principal> {
        let payload = serde_json::json!({ "idToken": id_token });
        let response = self
            .client
            .post(format!(
                "{}/accounts:lookup?key={}",
                self.identity_url, self.api_key
            ))
            .json(&payload)
            .send()
            .await?;
        let lookup = decode_identity_response::<LookupResponse>(response).await?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("account lookup returned no users".to_string()))?;

        Ok(Principal {
            display_name: user
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| user.email.clone()),
            principal_id: user.local_id,
            email_address: user.email,
            email_verified: user.email_verified,
            avatar_url: user.photo_url,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenState> {
        let response = self
            .client
            .post(format!("{}/token?key={}", self.token_url, self.api_key))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let refreshed = decode_identity_response::<RefreshResponse>(response).await?;

        Ok(TokenState {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at_from(refreshed.expires_in.as_deref()),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal> {
        self.password_grant("signInWithPassword", email, password)
            .await
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<Principal> {
        self.password_grant("signUp", email, password).await
    }

    async fn sign_in_federated(&self, provider_id: &str, id_token: &str) -> Result<Principal> {
        self.idp_grant(provider_id, id_token).await
    }

    async fn sign_out(&self) -> Result<()> {
        // Identity Toolkit has no revocation endpoint for this flow; dropping
        // the held tokens is the whole operation.
        *lock_recovering(&self.tokens) = None;
        Ok(())
    }

    async fn current_token(&self, force_refresh: bool) -> Result<Credential> {
        let held = lock_recovering(&self.tokens).clone();
        let Some(state) = held else {
            return Err(Error::NoActiveSession);
        };

        if !force_refresh && !state.is_expired() {
            return Ok(Credential::new(state.id_token));
        }

        let refreshed = self.refresh(&state.refresh_token).await?;
        let credential = Credential::new(refreshed.id_token.clone());
        *lock_recovering(&self.tokens) = Some(refreshed);
        Ok(credential)
    }

    async fn send_verification_email(&self) -> Result<()> {
        let id_token = {
            let held = lock_recovering(&self.tokens);
            held.as_ref()
                .map(|state| state.id_token.clone())
                .ok_or(Error::NoActiveSession)?
        };

        let payload = serde_json::json!({
            "requestType": "VERIFY_EMAIL",
            "idToken": id_token,
        });
        let response = self
            .client
            .post(format!(
                "{}/accounts:sendOobCode?key={}",
                self.identity_url, self.api_key
            ))
            .json(&payload)
            .send()
            .await?;
        decode_identity_response::<serde_json::Value>(response).await?;
        Ok(())
    }
}

async fn decode_identity_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Provider(parse_identity_error(status, &body)));
    }
    response.json::<T>().await.map_err(Into::into)
}

#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
    error: Option<IdentityErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorDetail {
    message: Option<String>,
}

fn parse_identity_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<IdentityErrorBody>(body) {
        if let Some(message) = payload.error.and_then(|detail| detail.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

/// Cap a raw error body so an HTML dump never floods the message.
fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

fn expires_at_from(expires_in: Option<&str>) -> i64 {
    let seconds = expires_in
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);
    unix_timestamp_now().saturating_add(seconds)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_error_prefers_structured_message() {
        let body = r#"{"error":{"message":"EMAIL_NOT_FOUND","code":400}}"#;
        let rendered = parse_identity_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(rendered, "EMAIL_NOT_FOUND (400)");
    }

    #[test]
    fn identity_error_falls_back_to_body_text() {
        let rendered = parse_identity_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(rendered, "upstream down (502)");
    }

    #[test]
    fn identity_error_handles_empty_body() {
        let rendered = parse_identity_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(rendered, "HTTP 500");
    }

    #[test]
    fn token_state_debug_redacts_tokens() {
        let state = TokenState {
            id_token: "secret-id".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: 1_700_000_000,
        };
        let rendered = format!("{state:?}");
        assert!(!rendered.contains("secret-id"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn expires_at_handles_missing_and_bad_values() {
        let now = unix_timestamp_now();
        assert!(expires_at_from(Some("3600")) >= now + 3599);
        assert!(expires_at_from(None) <= now + 1);
        assert!(expires_at_from(Some("not-a-number")) <= now + 1);
    }

    #[test]
    fn constructor_rejects_empty_api_key() {
        let error = FirebaseIdentityProvider::with_endpoints(
            "https://identitytoolkit.googleapis.com/v1",
            SECURE_TOKEN_URL,
            "  ",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(error.to_string().contains("API key"));
    }

    #[test]
    fn raw_error_bodies_are_capped() {
        let long = "x".repeat(500);
        let message = parse_identity_error(StatusCode::BAD_GATEWAY, &long);
        assert!(message.len() < 200);
        assert!(message.ends_with("(502)"));
    }

    #[test]
    fn provider_debug_output_redacts_the_api_key() {
        let provider = FirebaseIdentityProvider::with_endpoints(
            "https://identitytoolkit.googleapis.com/v1",
            SECURE_TOKEN_URL,
            "secret-api-key",
            Duration::from_secs(5),
        )
        .unwrap();
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("secret-api-key"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn expired_state_detection_applies_skew() {
        let fresh = TokenState {
            id_token: "a".to_string(),
            refresh_token: "b".to_string(),
            expires_at: unix_timestamp_now() + 3600,
        };
        assert!(!fresh.is_expired());

        let nearly = TokenState {
            expires_at: unix_timestamp_now() + EXPIRY_SKEW_SECONDS - 5,
            ..fresh
        };
        assert!(nearly.is_expired());
    }
}
