//! Reachability tracking for the aggregation service.

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Reachability of the remote aggregation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Unknown,
    Reachable,
    Unreachable,
}

/// Probe seam: answers whether the service is reachable right now.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Holds the current [`ConnectivityState`] and surfaces transitions.
///
/// The watch channel only fires on change, so subscribers see each
/// transition exactly once regardless of probe cadence.
pub struct ConnectivityMonitor {
    state_tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::Unknown);
        Self { state_tx }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Fold one probe result into the state machine. Returns true exactly
    /// when this result caused a transition into `Reachable`, which is the
    /// debounced signal to drain the queue.
    pub fn record_probe_result(&self, reachable: bool) -> bool {
        let next = if reachable {
            ConnectivityState::Reachable
        } else {
            ConnectivityState::Unreachable
        };

        let mut became_reachable = false;
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            became_reachable = next == ConnectivityState::Reachable;
            *state = next;
            true
        });

        if became_reachable {
            info!("[Connectivity] aggregation service reachable");
        }
        became_reachable
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
