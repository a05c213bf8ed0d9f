//! Single-flight access token refresh
//!
//! The first caller that asks for a refresh while none is running becomes
//! the leader of a *flight*: it reads the refresh token, calls the
//! [`RefreshExecutor`], and stores the result. Callers arriving while the
//! flight is airborne are parked on a oneshot channel in FIFO order and
//! released with a clone of the leader's outcome when it lands.
//!
//! ```text
//!   caller A ──► request_refresh ──► [in_flight = true] ──► executor ──┐
//!   caller B ──► request_refresh ──► queue (rx B)                      │
//!   caller C ──► request_refresh ──► queue (rx C)                      │
//!                                                                      ▼
//!                          [in_flight = false, take queue] ◄── outcome
//!                                   │
//!                     send(outcome) to B, C; return outcome to A
//! ```
//!
//! The state mutex is only ever held between suspension points, never
//! across an `.await`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::executor::{RefreshExecutor, RefreshGrant};
use crate::auth::{CredentialStore, Token, TokenKind};
use crate::callbacks::{LogOnlyRedirect, SharedLoginRedirect};
use crate::config::RefreshPolicy;
use crate::error::RefreshError;

type Outcome = Result<Token, RefreshError>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

/// Coordinates access token refreshes so that at most one exchange with
/// the refresh endpoint is outstanding at any time.
///
/// One coordinator belongs to one session; share it between request
/// pipelines with an [`Arc`].
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    executor: Arc<dyn RefreshExecutor>,
    redirect: SharedLoginRedirect,
    policy: RefreshPolicy,
    state: Mutex<RefreshState>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("policy", &self.policy)
            .field("in_flight", &self.is_refreshing())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator with the default policy and a log-only redirect
    pub fn new(store: Arc<dyn CredentialStore>, executor: Arc<dyn RefreshExecutor>) -> Self {
        Self {
            store,
            executor,
            redirect: Arc::new(LogOnlyRedirect),
            policy: RefreshPolicy::default(),
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Set the callback invoked when the session is invalidated
    #[must_use]
    pub fn with_redirect(mut self, redirect: SharedLoginRedirect) -> Self {
        self.redirect = redirect;
        self
    }

    /// Set the refresh policy
    #[must_use]
    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the refresh policy
    #[must_use]
    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Get the credential store this coordinator writes to
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Whether a flight is currently outstanding
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state().in_flight
    }

    /// Number of callers parked on the current flight
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state().waiters.len()
    }

    /// Obtain a fresh access token.
    ///
    /// Starts a flight if none is running, otherwise joins the running one.
    /// All callers of one flight receive the same token or the same error.
    ///
    /// # Errors
    ///
    /// Returns the flight's [`RefreshError`]; by then the session has been
    /// invalidated if the policy calls for it.
    pub async fn request_refresh(&self) -> Result<Token, RefreshError> {
        let queued = {
            let mut state = self.state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some((rx, state.waiters.len()))
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some((rx, position)) = queued {
            tracing::debug!(position, "Refresh already in flight; waiting");
            return self.wait(rx).await;
        }

        let flight = Flight {
            coordinator: self,
            landed: false,
        };
        let outcome = self.fly().await;
        flight.land(outcome.clone());
        outcome
    }

    /// Clear both credentials and hand over to the login redirect.
    pub fn invalidate_session(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear credential store");
        }
        self.redirect.redirect_to_login();
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        // critical sections never panic, but don't let a poisoned lock wedge every caller
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait(&self, rx: oneshot::Receiver<Outcome>) -> Outcome {
        let received = match self.policy.wait_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!(?limit, "Gave up waiting for in-flight refresh");
                    return Err(RefreshError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        received.unwrap_or(Err(RefreshError::Interrupted))
    }

    async fn fly(&self) -> Outcome {
        match self.refresh().await {
            Ok(token) => {
                tracing::info!("Access token refreshed");
                Ok(token)
            }
            Err(err) => {
                if self.policy.invalidates_on(&err) {
                    tracing::warn!(error = %err, "Refresh failed; invalidating session");
                    self.invalidate_session();
                } else {
                    tracing::warn!(error = %err, "Refresh failed; keeping stored credentials");
                }
                Err(err)
            }
        }
    }

    async fn refresh(&self) -> Outcome {
        let refresh_token = self
            .store
            .get(TokenKind::Refresh)
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::NoRefreshToken)?;

        let grant = self.exchange(&refresh_token).await?;

        self.store
            .set(TokenKind::Access, grant.access_token.clone())
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        if self.policy.rotate_refresh_token {
            if let Some(rotated) = grant.refresh_token {
                self.store
                    .set(TokenKind::Refresh, rotated)
                    .map_err(|e| RefreshError::Storage(e.to_string()))?;
            }
        }

        Ok(grant.access_token)
    }

    async fn exchange(&self, refresh_token: &Token) -> Result<RefreshGrant, RefreshError> {
        let mut attempt = 0u32;
        loop {
            let result = match self.policy.refresh_timeout {
                Some(limit) => {
                    tokio::time::timeout(limit, self.executor.exchange(refresh_token))
                        .await
                        .unwrap_or(Err(RefreshError::Timeout(limit)))
                }
                None => self.executor.exchange(refresh_token).await,
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.policy.max_network_retries => {
                    attempt += 1;
                    let delay = self.policy.retry_backoff * attempt;
                    tracing::warn!(attempt, ?delay, error = %err, "Transient refresh failure; retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    fn drain(&self, outcome: &Outcome) {
        let waiters = {
            let mut state = self.state();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            tracing::debug!(
                waiters = waiters.len(),
                success = outcome.is_ok(),
                "Releasing queued refresh callers"
            );
        }
        for waiter in waiters {
            // a receiver that timed out is already gone
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Leader-side guard: whatever happens to the leader's future, the flag is
/// reset and every waiter is released exactly once.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    landed: bool,
}

impl Flight<'_> {
    fn land(mut self, outcome: Outcome) {
        self.landed = true;
        self.coordinator.drain(&outcome);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.landed {
            tracing::warn!("Refresh flight abandoned before completion");
            self.coordinator.drain(&Err(RefreshError::Interrupted));
        }
    }
}
