use std::sync::Arc;

use tokio::sync::watch;

/// Bearer credential shared by every transport of a client session.
///
/// Backed by a watch channel so long-lived connections can notice when the
/// credential is replaced or cleared and reconnect with the new value.
#[derive(Clone)]
pub struct Credentials {
    token: Arc<watch::Sender<Option<String>>>,
}

impl Credentials {
    /// Create a credential holder, optionally seeded with a token.
    pub fn new(initial: Option<String>) -> Self {
        let initial = initial.filter(|token| !token.trim().is_empty());
        let (tx, _rx) = watch::channel(initial);
        Self { token: Arc::new(tx) }
    }

    /// Current bearer token, if the session is authenticated.
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// Whether a credential is currently available.
    pub fn is_present(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Replace the credential.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        self.token.send_replace(Some(token));
    }

    /// Drop the credential, returning whether one was present.
    pub fn clear(&self) -> bool {
        self.token.send_replace(None).is_some()
    }

    /// Subscribe to credential changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(None)
    }
}
