//! Connection establishment hook
//!
//! The channel calls its connector for the first dial and again whenever a
//! request arrives after the underlying connection went away. The hook sits
//! in front of every such attempt and turns them into connection state:
//!
//! - a successful attempt marks the connection `Connected`
//! - the first attempt after being `Connected` is a loss; it is logged and
//!   the reconnect policy is asked, both exactly once
//! - once the policy said no, every further attempt fails with
//!   `ReconnectDisabled` without touching the transport
//!
//! Failed attempts back off exponentially before the next one.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::error::ConnectError;

/// Decides whether to reconnect after a connection loss.
pub type ReconnectPolicy = Arc<dyn Fn() -> bool + Send + Sync>;

/// Delay after the first failed attempt; doubled per consecutive failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No attempt has succeeded yet.
    Connecting,
    Connected,
    /// A previously established connection went away.
    Lost,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Lost => "lost",
        };
        f.write_str(s)
    }
}

struct Attempts {
    reconnect: bool,
    consecutive_failures: u32,
}

pub struct ReconnectHook {
    endpoint: String,
    policy: Option<ReconnectPolicy>,
    max_backoff: Duration,
    // held across a whole attempt, so attempts never overlap
    attempts: Mutex<Attempts>,
    state: watch::Sender<ConnectionState>,
}

impl ReconnectHook {
    pub fn new(
        endpoint: impl Into<String>,
        policy: Option<ReconnectPolicy>,
        max_backoff: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            endpoint: endpoint.into(),
            policy,
            max_backoff,
            attempts: Mutex::new(Attempts {
                reconnect: true,
                consecutive_failures: 0,
            }),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run one low-level connect attempt through the hook.
    pub async fn attempt<F, Fut, T>(&self, connect: F) -> Result<T, ConnectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let mut attempts = self.attempts.lock().await;

        let was_connected = self.state() == ConnectionState::Connected;
        if was_connected {
            error!(endpoint = %self.endpoint, "Lost connection to {}", self.endpoint);
            self.state.send_replace(ConnectionState::Lost);
            if let Some(policy) = &self.policy {
                attempts.reconnect = policy();
                if !attempts.reconnect {
                    warn!(endpoint = %self.endpoint, "Reconnecting disabled by policy");
                }
            }
        }

        if !attempts.reconnect {
            return Err(ConnectError::ReconnectDisabled(self.endpoint.clone()));
        }

        if attempts.consecutive_failures > 0 {
            let delay = backoff_delay(attempts.consecutive_failures, self.max_backoff);
            debug!(
                endpoint = %self.endpoint,
                failures = attempts.consecutive_failures,
                delay_ms = delay.as_millis() as u64,
                "Backing off before next dial"
            );
            tokio::time::sleep(delay).await;
        }

        debug!(endpoint = %self.endpoint, "Dialing");
        match connect().await {
            Ok(io) => {
                attempts.consecutive_failures = 0;
                if self.state() != ConnectionState::Connected {
                    info!(endpoint = %self.endpoint, "Connected to {}", self.endpoint);
                }
                self.state.send_replace(ConnectionState::Connected);
                Ok(io)
            }
            Err(err) => {
                attempts.consecutive_failures = attempts.consecutive_failures.saturating_add(1);
                debug!(endpoint = %self.endpoint, error = %err, "Dial failed");
                Err(ConnectError::dial(&self.endpoint, err))
            }
        }
    }
}

impl fmt::Debug for ReconnectHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectHook")
            .field("endpoint", &self.endpoint)
            .field("has_policy", &self.policy.is_some())
            .field("max_backoff", &self.max_backoff)
            .field("state", &self.state())
            .finish()
    }
}

/// Delay before the attempt following `failures` consecutive failures.
pub fn backoff_delay(failures: u32, max_backoff: Duration) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = (failures - 1).min(16);
    INITIAL_BACKOFF
        .saturating_mul(1u32 << exponent)
        .min(max_backoff)
}
