//! CLI identity session helpers with secure keychain persistence.
//!
//! Only the long-lived refresh token and the principal snapshot are stored;
//! short-lived bearer tokens never touch disk.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use serde::{Deserialize, Serialize};

use edudesk_core::session::firebase::FirebaseIdentityProvider;
use edudesk_core::{Error, Principal, Result, SessionManager};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "edudesk-cli";

const KEYRING_ACCOUNT: &str = "identity_session";

/// What survives between CLI invocations.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub refresh_token: String,
    pub principal: Principal,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StoredSession")
            .field("refresh_token", &"[REDACTED]")
            .field("principal", &self.principal)
            .finish()
    }
}

#[cfg(test)]
fn test_store() -> &'static Mutex<HashMap<String, String>> {
    static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(not(test))]
fn entry() -> Result<Entry> {
    Entry::new(KEYRING_SERVICE_NAME, KEYRING_ACCOUNT)
        .map_err(|error| Error::Provider(format!("secure storage unavailable: {error}")))
}

#[cfg(not(test))]
pub fn load_stored_session() -> Result<Option<StoredSession>> {
    match entry()?.get_password() {
        Ok(raw) => {
            let stored = serde_json::from_str(&raw)
                .map_err(|error| Error::Provider(format!("corrupt stored session: {error}")))?;
            Ok(Some(stored))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(Error::Provider(format!("secure storage read failed: {error}"))),
    }
}

#[cfg(test)]
pub fn load_stored_session() -> Result<Option<StoredSession>> {
    let guard = test_store().lock().unwrap();
    match guard.get(KEYRING_ACCOUNT) {
        Some(raw) => {
            let stored = serde_json::from_str(raw)
                .map_err(|error| Error::Provider(format!("corrupt stored session: {error}")))?;
            Ok(Some(stored))
        }
        None => Ok(None),
    }
}

#[cfg(not(test))]
pub fn save_stored_session(stored: &StoredSession) -> Result<()> {
    let raw = serde_json::to_string(stored)
        .map_err(|error| Error::Provider(format!("session serialization failed: {error}")))?;
    entry()?
        .set_password(&raw)
        .map_err(|error| Error::Provider(format!("secure storage write failed: {error}")))
}

#[cfg(test)]
pub fn save_stored_session(stored: &StoredSession) -> Result<()> {
    let raw = serde_json::to_string(stored)
        .map_err(|error| Error::Provider(format!("session serialization failed: {error}")))?;
    test_store()
        .lock()
        .unwrap()
        .insert(KEYRING_ACCOUNT.to_string(), raw);
    Ok(())
}

#[cfg(not(test))]
pub fn clear_stored_session() -> Result<()> {
    match entry()?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(error) => Err(Error::Provider(format!("secure storage delete failed: {error}"))),
    }
}

#[cfg(test)]
pub fn clear_stored_session() -> Result<()> {
    test_store().lock().unwrap().remove(KEYRING_ACCOUNT);
    Ok(())
}

/// Snapshot the provider's refresh token and persist it alongside the
/// signed-in principal.
pub fn persist_session(
    manager: &SessionManager<FirebaseIdentityProvider>,
    principal: &Principal,
) -> Result<()> {
    let Some(refresh_token) = manager.provider().refresh_token_snapshot() else {
        return Err(Error::Provider(
            "sign-in succeeded but no refresh token was issued".to_string(),
        ));
    };
    save_stored_session(&StoredSession {
        refresh_token,
        principal: principal.clone(),
    })
}

/// Rehydrate the session manager from the keychain. Returns whether a
/// session was restored. A stale or revoked refresh token clears the stored
/// entry so the next invocation starts clean.
pub async fn restore_session(manager: &SessionManager<FirebaseIdentityProvider>) -> Result<bool> {
    let Some(stored) = load_stored_session()? else {
        return Ok(false);
    };

    match manager
        .provider()
        .adopt_refresh_token(&stored.refresh_token)
        .await
    {
        Ok(principal) => {
            manager.apply_provider_state(Some(principal));
            Ok(true)
        }
        Err(error) => {
            tracing::warn!(%error, "stored session rejected, clearing");
            clear_stored_session()?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn principal() -> Principal {
        Principal {
            principal_id: "uid-1".to_string(),
            display_name: "Asha".to_string(),
            email_address: "asha@college.edu".to_string(),
            email_verified: true,
            avatar_url: None,
        }
    }

    #[test]
    fn stored_session_round_trips() {
        clear_stored_session().unwrap();
        assert!(load_stored_session().unwrap().is_none());

        save_stored_session(&StoredSession {
            refresh_token: "rt-1".to_string(),
            principal: principal(),
        })
        .unwrap();

        let loaded = load_stored_session().unwrap().unwrap();
        assert_eq!(loaded.refresh_token, "rt-1");
        assert_eq!(loaded.principal, principal());

        clear_stored_session().unwrap();
        assert!(load_stored_session().unwrap().is_none());
    }

    #[test]
    fn debug_redacts_refresh_token() {
        let stored = StoredSession {
            refresh_token: "rt-secret".to_string(),
            principal: principal(),
        };
        let rendered = format!("{stored:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("rt-secret"));
    }
}
