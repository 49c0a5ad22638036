use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::client::BackendClient;
use crate::config::API_KEY_ENV_VAR;

/// Snapshot of the backend session as last observed. In-memory only; the
/// backend (via its session cookie) is the source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub session_id: Option<String>,
}

/// Owns the authentication state for one front-end lifetime: status checks,
/// API-key login, and periodic re-validation. Constructed by the front end
/// and passed by reference to whatever needs it — deliberately not a
/// process-wide singleton.
///
/// Every state transition is published on a watch channel so dependents
/// observe externally expired sessions without polling.
#[derive(Debug)]
pub struct SessionGuard {
    client: BackendClient,
    api_key: Option<String>,
    session_tx: watch::Sender<Session>,
}

impl SessionGuard {
    pub fn new(client: BackendClient, api_key: Option<String>) -> Self {
        let (session_tx, _) = watch::channel(Session::default());
        Self {
            client,
            api_key,
            session_tx,
        }
    }

    pub fn session(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Query the backend's session-status endpoint. Any network or protocol
    /// failure degrades to an unauthenticated session; this never returns an
    /// error to the caller.
    pub async fn check_status(&self) -> Session {
        let session = match self.client.auth_status().await {
            Ok(status) => Session {
                authenticated: status.authenticated,
                session_id: status.session_id,
            },
            Err(err) => {
                warn!("auth status check failed: {err}");
                Session::default()
            }
        };
        self.publish(session.clone());
        session
    }

    /// Present the configured API key to the login endpoint. The login
    /// response body is not trusted as the source of truth: success is
    /// whatever a follow-up status check reports. Returns `false` without a
    /// network call when no API key is configured.
    pub async fn login(&self) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("login requested but {API_KEY_ENV_VAR} is not configured");
            return false;
        };
        if let Err(err) = self.client.login(api_key).await {
            warn!("login call failed: {err}");
            self.publish(Session::default());
            return false;
        }
        self.check_status().await.authenticated
    }

    fn publish(&self, session: Session) {
        self.session_tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                debug!(
                    authenticated = session.authenticated,
                    "session state changed"
                );
                *current = session;
                true
            }
        });
    }

    /// Run an immediate status check, then re-validate on a fixed interval
    /// until the returned handle is dropped.
    pub fn spawn_revalidation(self: &Arc<Self>, interval: Duration) -> RevalidationHandle {
        let guard = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    // The first tick fires immediately, which doubles as the
                    // on-first-use status check.
                    _ = ticker.tick() => {
                        guard.check_status().await;
                    }
                }
            }
        });
        RevalidationHandle {
            cancel,
            _task: task,
        }
    }
}

/// Cancels the periodic re-validation task on drop.
#[derive(Debug)]
pub struct RevalidationHandle {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl Drop for RevalidationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
