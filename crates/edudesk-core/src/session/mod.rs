//! Identity session management.
//!
//! Tracks the single current [`Session`], notifies subscribers synchronously
//! on every change, and hands out fresh bearer [`Credential`]s on demand. The
//! identity provider itself is behind the [`IdentityProvider`] trait so tests
//! can substitute a deterministic fake.

pub mod firebase;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The authenticated identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: String,
    pub display_name: String,
    pub email_address: String,
    pub email_verified: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The current signed-in state. Exactly one per client process, swapped
/// atomically on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
    /// Unix seconds at which this session was installed locally
    pub signed_in_at: i64,
}

impl Session {
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            signed_in_at: crate::util::unix_timestamp_now(),
        }
    }
}

/// An opaque short-lived bearer token.
///
/// Never cached beyond a single call's lifetime; re-requested from the
/// provider immediately before each authenticated network call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Credential")
            .field(&"[REDACTED]")
            .finish()
    }
}

/// The external identity provider collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal>;

    async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<Principal>;

    /// Exchange a federated identity token (Google, GitHub, ...) for a
    /// signed-in principal.
    async fn sign_in_federated(&self, provider_id: &str, id_token: &str) -> Result<Principal>;

    async fn sign_out(&self) -> Result<()>;

    /// Return a bearer token valid for the immediate call.
    ///
    /// `force_refresh` must be honored by refreshing against the provider
    /// even when a non-expired token is held locally.
    async fn current_token(&self, force_refresh: bool) -> Result<Credential>;

    async fn send_verification_email(&self) -> Result<()>;
}

type Listener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    entries: Vec<(u64, Listener)>,
}

/// Scoped subscription handle; dropping it unregisters the listener.
pub struct SessionSubscription {
    id: u64,
    registry: Arc<Mutex<ListenerRegistry>>,
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        let mut registry = lock_recovering(&self.registry);
        registry.entries.retain(|(id, _)| *id != self.id);
    }
}

/// Maintains the current [`Session`] and notifies subscribers on change.
///
/// State machine: `SignedOut -> SignedIn -> SignedOut`. Credential refresh is
/// transparent per-call; no intermediate state is externally observable.
pub struct SessionManager<P> {
    provider: P,
    session: Mutex<Option<Session>>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    next_listener_id: AtomicU64,
}

impl<P: IdentityProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            session: Mutex::new(None),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current session, if any.
    pub fn session(&self) -> Option<Session> {
        lock_recovering(&self.session).clone()
    }

    pub fn is_signed_in(&self) -> bool {
        lock_recovering(&self.session).is_some()
    }

    /// Register a listener, invoking it once immediately with the current
    /// state and then synchronously on every subsequent change.
    pub fn subscribe(
        &self,
        listener: impl Fn(Option<&Session>) + Send + Sync + 'static,
    ) -> SessionSubscription {
        let current = self.session();
        listener(current.as_ref());

        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let mut registry = lock_recovering(&self.listeners);
        registry.entries.push((id, Arc::new(listener)));

        SessionSubscription {
            id,
            registry: Arc::clone(&self.listeners),
        }
    }

    /// Fetch a bearer token for the immediate call.
    ///
    /// Fails with [`Error::NoActiveSession`] when signed out, including when
    /// the session disappeared while the provider round-trip was in flight —
    /// a credential is never handed out for a session that is gone.
    pub async fn credential(&self, force_refresh: bool) -> Result<Credential> {
        if !self.is_signed_in() {
            return Err(Error::NoActiveSession);
        }

        let credential = self.provider.current_token(force_refresh).await?;

        if !self.is_signed_in() {
            return Err(Error::NoActiveSession);
        }
        Ok(credential)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        validate_sign_in_input(email, password)?;
        let principal = self.provider.sign_in_with_password(email, password).await?;
        Ok(self.install(principal))
    }

    pub async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<Session> {
        validate_sign_in_input(email, password)?;
        let principal = self.provider.sign_up_with_password(email, password).await?;
        Ok(self.install(principal))
    }

    /// Sign in with a token obtained from an external identity provider
    /// (for example a Google OAuth flow run outside this client).
    pub async fn sign_in_federated(&self, provider_id: &str, id_token: &str) -> Result<Session> {
        if provider_id.trim().is_empty() {
            return Err(Error::InvalidInput("provider is required".to_string()));
        }
        if id_token.trim().is_empty() {
            return Err(Error::InvalidInput("identity token is required".to_string()));
        }
        let principal = self.provider.sign_in_federated(provider_id, id_token).await?;
        Ok(self.install(principal))
    }

    /// Sign out, clearing the local session before the provider round-trip.
    ///
    /// The local session is always cleared and subscribers notified even when
    /// the provider call fails; the failure is still reported as
    /// [`Error::SignOutFailed`] so the caller can surface it.
    pub async fn sign_out(&self) -> Result<()> {
        self.swap_session(None);

        if let Err(error) = self.provider.sign_out().await {
            tracing::warn!("Provider sign-out failed after local clear: {error}");
            return Err(Error::SignOutFailed(error.to_string()));
        }
        Ok(())
    }

    /// Apply a provider-initiated auth-state change (signed-in principal or
    /// signed-out null), the subscribe-to-auth-state-changes collaborator path.
    pub fn apply_provider_state(&self, principal: Option<Principal>) {
        self.swap_session(principal.map(Session::new));
    }

    pub async fn send_verification_email(&self) -> Result<()> {
        if !self.is_signed_in() {
            return Err(Error::NoActiveSession);
        }
        self.provider.send_verification_email().await
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn install(&self, principal: Principal) -> Session {
        let session = Session::new(principal);
        self.swap_session(Some(session.clone()));
        session
    }

    fn swap_session(&self, next: Option<Session>) {
        {
            let mut current = lock_recovering(&self.session);
            if *current == next {
                return;
            }
            *current = next.clone();
        }
        self.notify(next.as_ref());
    }

    /// Invoke listeners on a snapshot taken under the lock, so a listener
    /// may subscribe or drop a [`SessionSubscription`] without deadlocking.
    fn notify(&self, session: Option<&Session>) {
        let snapshot: Vec<Listener> = {
            let registry = lock_recovering(&self.listeners);
            registry
                .entries
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in snapshot {
            listener(session);
        }
    }
}

fn validate_sign_in_input(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(Error::InvalidInput("email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(Error::InvalidInput("password is required".to_string()));
    }
    Ok(())
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct FakeProvider {
        token_calls: AtomicUsize,
        fail_sign_out: bool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                token_calls: AtomicUsize::new(0),
                fail_sign_out: false,
            }
        }

        fn failing_sign_out() -> Self {
            Self {
                fail_sign_out: true,
                ..Self::new()
            }
        }
    }

    fn principal() -> Principal {
        Principal {
            principal_id: "uid-1".to_string(),
            display_name: "Asha".to_string(),
            email_address: "asha@college.edu".to_string(),
            email_verified: true,
            avatar_url: None,
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Principal> {
            Ok(principal())
        }

        async fn sign_up_with_password(&self, _email: &str, _password: &str) -> Result<Principal> {
            Ok(principal())
        }

        async fn sign_in_federated(&self, provider_id: &str, _id_token: &str) -> Result<Principal> {
            Ok(Principal {
                display_name: format!("via {provider_id}"),
                ..principal()
            })
        }

        async fn sign_out(&self) -> Result<()> {
            if self.fail_sign_out {
                Err(Error::Provider("revocation endpoint unreachable".to_string()))
            } else {
                Ok(())
            }
        }

        async fn current_token(&self, _force_refresh: bool) -> Result<Credential> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential::new("token-abc"))
        }

        async fn send_verification_email(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn subscribe_fires_immediately_and_on_change() {
        let manager = SessionManager::new(FakeProvider::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let _subscription = manager.subscribe(move |session| {
            seen_clone
                .lock()
                .unwrap()
                .push(session.map(|s| s.principal.email_address.clone()));
        });

        manager
            .sign_in_with_password("asha@college.edu", "pw")
            .await
            .unwrap();
        manager.sign_out().await.unwrap();

        let observed = seen.lock().unwrap().clone();
        assert_eq!(
            observed,
            vec![None, Some("asha@college.edu".to_string()), None]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropped_subscription_stops_receiving() {
        let manager = SessionManager::new(FakeProvider::new());
        let seen = Arc::new(Mutex::new(0usize));

        let seen_clone = Arc::clone(&seen);
        let subscription = manager.subscribe(move |_| {
            *seen_clone.lock().unwrap() += 1;
        });
        drop(subscription);

        manager.sign_in_with_password("a@b.c", "pw").await.unwrap();
        // Only the immediate invocation at subscribe time was delivered.
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn listener_may_drop_another_subscription_during_notification() {
        let manager = SessionManager::new(FakeProvider::new());
        let held: Arc<Mutex<Option<SessionSubscription>>> = Arc::new(Mutex::new(None));

        let held_clone = Arc::clone(&held);
        let _watcher = manager.subscribe(move |session: Option<&Session>| {
            if session.is_some() {
                held_clone.lock().unwrap().take();
            }
        });

        let counted = Arc::new(Mutex::new(0usize));
        let counted_clone = Arc::clone(&counted);
        *held.lock().unwrap() = Some(manager.subscribe(move |_| {
            *counted_clone.lock().unwrap() += 1;
        }));

        manager.sign_in_with_password("a@b.c", "pw").await.unwrap();
        manager.sign_out().await.unwrap();

        // The watcher dropped the counted subscription during the sign-in
        // notification; that notification still reached it (same snapshot),
        // but the sign-out one did not.
        assert_eq!(*counted.lock().unwrap(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn credential_fails_when_signed_out() {
        let manager = SessionManager::new(FakeProvider::new());
        assert_eq!(
            manager.credential(false).await.unwrap_err(),
            Error::NoActiveSession
        );
        assert_eq!(
            manager.provider().token_calls.load(Ordering::SeqCst),
            0,
            "no provider round-trip without a session"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn forced_credential_after_sign_out_never_returns_stale_token() {
        let manager = SessionManager::new(FakeProvider::new());
        manager.sign_in_with_password("a@b.c", "pw").await.unwrap();
        assert!(manager.credential(true).await.is_ok());

        manager.sign_out().await.unwrap();
        assert_eq!(
            manager.credential(true).await.unwrap_err(),
            Error::NoActiveSession
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sign_out_clears_locally_even_when_provider_fails() {
        let manager = SessionManager::new(FakeProvider::failing_sign_out());
        manager.sign_in_with_password("a@b.c", "pw").await.unwrap();

        let error = manager.sign_out().await.unwrap_err();
        assert!(matches!(error, Error::SignOutFailed(_)));
        assert!(!manager.is_signed_in());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn federated_sign_in_installs_a_session() {
        let manager = SessionManager::new(FakeProvider::new());
        let session = manager
            .sign_in_federated("google.com", "oauth-id-token")
            .await
            .unwrap();
        assert_eq!(session.principal.display_name, "via google.com");
        assert!(manager.is_signed_in());

        assert!(matches!(
            manager.sign_in_federated("google.com", " ").await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn provider_state_changes_swap_the_session() {
        let manager = SessionManager::new(FakeProvider::new());
        manager.apply_provider_state(Some(principal()));
        assert!(manager.is_signed_in());

        manager.apply_provider_state(None);
        assert!(!manager.is_signed_in());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn verification_email_requires_session() {
        let manager = SessionManager::new(FakeProvider::new());
        assert_eq!(
            manager.send_verification_email().await.unwrap_err(),
            Error::NoActiveSession
        );
    }

    #[test]
    fn credential_debug_redacts_token() {
        let credential = Credential::new("secret-bearer-token");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret-bearer-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn sign_in_input_is_validated() {
        assert!(validate_sign_in_input(" ", "pw").is_err());
        assert!(validate_sign_in_input("a@b.c", " ").is_err());
        assert!(validate_sign_in_input("a@b.c", "pw").is_ok());
    }
}
