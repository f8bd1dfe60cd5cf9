//! # Network Probe
//!
//! Dual-stage reachability probe, generalized from the upstream
//! WebSocket transport's connect/reconnect state machine to a
//! point-in-time HTTP health check pair:
//!
//! 1. `HEAD /health` against the configured base URL, 3s timeout. Failure
//!    here means "offline" outright; the probe retries after 5s.
//! 2. `GET /health/aladin` (the external dependency health check), 5s
//!    timeout, only attempted after stage 1 succeeds and a 1s stabilization
//!    delay has elapsed. Failure here means "online but degraded": local
//!    connectivity is fine, but a downstream dependency isn't, so the sync
//!    engine proceeds rather than blocking.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::events::{EventBus, SyncEvent};

const STAGE1_TIMEOUT: Duration = Duration::from_secs(3);
const STAGE2_TIMEOUT: Duration = Duration::from_secs(5);
const STABILIZATION_DELAY: Duration = Duration::from_secs(1);
const STAGE1_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Current reachability state, as last observed by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeState {
    pub is_online: bool,
    pub is_local_reachable: bool,
    pub is_external_reachable: bool,
}

/// Dual-stage HTTP reachability probe.
pub struct NetworkProbe {
    client: reqwest::Client,
    base_url: String,
    state: Arc<RwLock<ProbeState>>,
    events: EventBus,
}

impl NetworkProbe {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, events: EventBus) -> Self {
        NetworkProbe {
            client,
            base_url: base_url.into(),
            state: Arc::new(RwLock::new(ProbeState::default())),
            events,
        }
    }

    pub async fn state(&self) -> ProbeState {
        *self.state.read().await
    }

    /// Runs one full probe cycle: stage 1, then (if it passed) stabilize
    /// and run stage 2. Updates state and emits Online/Offline transitions
    /// on the event bus.
    pub async fn check_once(&self) -> SyncResult<ProbeState> {
        let stage1_ok = self.check_stage1().await;

        let new_state = if !stage1_ok {
            ProbeState {
                is_online: false,
                is_local_reachable: false,
                is_external_reachable: false,
            }
        } else {
            tokio::time::sleep(STABILIZATION_DELAY).await;
            let stage2_ok = self.check_stage2().await;
            ProbeState {
                is_online: true,
                is_local_reachable: true,
                is_external_reachable: stage2_ok,
            }
        };

        self.transition(new_state).await;
        Ok(new_state)
    }

    async fn check_stage1(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        match tokio::time::timeout(STAGE1_TIMEOUT, self.client.head(&url).send()).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                debug!(error = %e, "stage1 health check failed");
                false
            }
            Err(_) => {
                debug!("stage1 health check timed out after {:?}", STAGE1_TIMEOUT);
                false
            }
        }
    }

    async fn check_stage2(&self) -> bool {
        let url = format!("{}/health/aladin", self.base_url.trim_end_matches('/'));
        match tokio::time::timeout(STAGE2_TIMEOUT, self.client.get(&url).send()).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                warn!(error = %e, "stage2 health check failed, proceeding degraded");
                false
            }
            Err(_) => {
                warn!("stage2 health check timed out after {:?}, proceeding degraded", STAGE2_TIMEOUT);
                false
            }
        }
    }

    /// Directly sets the probe's observed state and emits the
    /// corresponding Online/Offline transition if one occurred. Exposed so
    /// a caller with its own connectivity signal (an OS reachability
    /// callback, a test harness) can push state immediately instead of
    /// waiting for the next poll.
    pub async fn transition(&self, new_state: ProbeState) {
        let mut state = self.state.write().await;
        let was_online = state.is_online;
        *state = new_state;
        drop(state);

        if new_state.is_online && !was_online {
            self.events.publish(SyncEvent::Online);
        } else if !new_state.is_online && was_online {
            self.events.publish(SyncEvent::Offline);
        }
    }

    fn create_backoff() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: STAGE1_RETRY_DELAY,
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs the probe on a loop: immediately, then with exponential
    /// backoff (capped at 60s) while offline, resetting to the
    /// caller-supplied `poll_interval` as soon as the probe reports
    /// online again. Returns a handle that can be aborted on shutdown.
    pub fn spawn(self: Arc<Self>, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Self::create_backoff();

            loop {
                let state = match self.check_once().await {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(error = %e, "probe cycle failed");
                        let delay = backoff.next_backoff().unwrap_or(STAGE1_RETRY_DELAY);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                };

                let delay = if state.is_online {
                    backoff.reset();
                    poll_interval
                } else {
                    backoff.next_backoff().unwrap_or(STAGE1_RETRY_DELAY)
                };
                tokio::time::sleep(delay).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_state_is_offline() {
        let probe = NetworkProbe::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            EventBus::new(),
        );
        assert_eq!(probe.state().await, ProbeState::default());
    }

    #[tokio::test]
    async fn unreachable_host_reports_offline() {
        // Port 1 is reserved and will refuse the connection immediately.
        let probe = NetworkProbe::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            EventBus::new(),
        );
        let state = probe.check_once().await.unwrap();
        assert!(!state.is_online);
        assert!(!state.is_local_reachable);
        assert!(!state.is_external_reachable);
    }

    #[tokio::test]
    async fn transition_emits_online_event_once() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let probe = NetworkProbe::new(reqwest::Client::new(), "http://127.0.0.1:1", bus);

        probe
            .transition(ProbeState {
                is_online: true,
                is_local_reachable: true,
                is_external_reachable: true,
            })
            .await;
        probe
            .transition(ProbeState {
                is_online: true,
                is_local_reachable: true,
                is_external_reachable: false,
            })
            .await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event, SyncEvent::Online);
        assert!(rx.try_recv().is_err(), "second transition should not re-emit Online");
    }
}
