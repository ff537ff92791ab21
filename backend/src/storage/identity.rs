//! Anonymous identity provider.
//!
//! Every terminal signs in anonymously; the identity only exists so that
//! purchases can be stamped with `createdBy` / `modifiedBy`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use super::traits::{GatewayError, Identity, IdentityProvider};

/// Issues a fresh uuid-based identity per sign-in
#[derive(Clone)]
pub struct AnonymousIdentityProvider {
    state: Arc<watch::Sender<Option<Identity>>>,
    disabled: Arc<AtomicBool>,
}

impl Default for AnonymousIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonymousIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
            disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate anonymous sign-in being switched off for the project
    pub fn disable_anonymous_sign_in(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, GatewayError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(GatewayError::PermissionDenied(
                "anonymous authentication is not enabled".to_string(),
            ));
        }

        let identity = Identity {
            uid: format!("anon-{}", Uuid::new_v4().simple()),
        };
        info!("Signed in anonymously as {}", identity.uid);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!("Signed out {}", previous.uid);
        }
    }

    fn auth_state(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
