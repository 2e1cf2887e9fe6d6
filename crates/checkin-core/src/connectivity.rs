//! Connectivity signal and the start-up sync completion signal.

use std::time::Duration;

use tokio::sync::watch;

/// Boundary-provided "is currently online" flag with edge notifications.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self { sender }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Record the current connectivity. Returns `true` when the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receiver that observes every change made through [`Self::set_online`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Completion of the first attendee refresh of this process run.
///
/// Completed exactly once with whether the refresh succeeded; later
/// completions are ignored.
#[derive(Debug, Clone)]
pub struct InitialSyncSignal {
    sender: watch::Sender<Option<bool>>,
}

impl Default for InitialSyncSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl InitialSyncSignal {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self { sender }
    }

    /// Mark the initial refresh as finished. Returns `false` if it already was.
    pub fn complete(&self, ok: bool) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_some() {
                false
            } else {
                *state = Some(ok);
                true
            }
        })
    }

    /// `Some(ok)` once the initial refresh has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<bool> {
        *self.sender.borrow()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome().is_some()
    }

    /// Wait up to `timeout` for completion; `None` when the wait timed out.
    pub async fn wait(&self, timeout: Duration) -> Option<bool> {
        let mut receiver = self.sender.subscribe();
        let completed = tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await;
        match completed {
            Ok(Ok(state)) => *state,
            _ => None,
        }
    }
}
