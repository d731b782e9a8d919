//! Connectivity oracle
//!
//! A best-effort answer to "is the network reachable right now". The answer
//! may be stale or optimistic; callers must still handle fetch failures.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default timeout for a reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Network connectivity state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NetworkState {
    /// Connected to network
    Online,

    /// Disconnected from network
    Offline,

    /// Network state unknown
    #[default]
    Unknown,
}

impl NetworkState {
    /// Whether callers should attempt network work
    ///
    /// `Unknown` counts as online: an attempt that fails is handled the same
    /// way as any other fetch failure.
    pub fn is_online(&self) -> bool {
        !matches!(self, NetworkState::Offline)
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Online => write!(f, "online"),
            NetworkState::Offline => write!(f, "offline"),
            NetworkState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Source of the online/offline signal
pub trait Connectivity: Send + Sync {
    /// Whether the network is believed reachable
    fn is_online(&self) -> bool;
}

/// Settable connectivity state with change notifications
///
/// # Examples
/// ```
/// use networking::{Connectivity, NetworkMonitor, NetworkState};
///
/// let monitor = NetworkMonitor::new();
/// assert!(monitor.is_online());
///
/// monitor.set_state(NetworkState::Offline);
/// assert!(!monitor.is_online());
/// ```
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    state: Arc<RwLock<NetworkState>>,
    tx: broadcast::Sender<NetworkState>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    /// Create a monitor in the `Unknown` state
    pub fn new() -> Self {
        Self::with_state(NetworkState::Unknown)
    }

    /// Create a monitor with an initial state
    pub fn with_state(state: NetworkState) -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { state: Arc::new(RwLock::new(state)), tx }
    }

    /// Current state
    pub fn state(&self) -> NetworkState {
        *self.state.read()
    }

    /// Record a new state, notifying subscribers if it changed
    pub fn set_state(&self, state: NetworkState) {
        let mut current = self.state.write();
        if *current != state {
            tracing::info!("Network state changed: {} -> {}", *current, state);
            *current = state;
            let _ = self.tx.send(state);
        }
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkState> {
        self.tx.subscribe()
    }

    /// Check reachability of `url` with a single HEAD request and record it
    ///
    /// Any HTTP response, whatever its status, means the network is up.
    pub async fn probe(&self, url: &str) -> NetworkState {
        self.probe_with_timeout(url, PROBE_TIMEOUT).await
    }

    /// [`probe`](Self::probe) with an explicit timeout
    pub async fn probe_with_timeout(&self, url: &str, timeout: Duration) -> NetworkState {
        let state = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => match client.head(url).send().await {
                Ok(_) => NetworkState::Online,
                Err(e) => {
                    tracing::debug!("Reachability probe to {} failed: {}", url, e);
                    NetworkState::Offline
                }
            },
            Err(e) => {
                tracing::warn!("Could not build probe client: {}", e);
                NetworkState::Unknown
            }
        };

        self.set_state(state);
        state
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.state().is_online()
    }
}
