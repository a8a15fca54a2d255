//! Connectivity monitoring.
//!
//! The monitor is a thin edge detector: hosts report online/offline from
//! whatever platform signal they have, and the engine reacts only to the
//! offline → online edge. Repeated reports of the same state are absorbed
//! so a chatty host cannot trigger redundant sync passes.

use parking_lot::RwLock;
use tokio::sync::watch;

/// Current connectivity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Whether the host last reported the network as reachable.
    pub is_online: bool,
    /// UTC milliseconds of the last state change, if any occurred since
    /// construction.
    pub last_transition_at: Option<i64>,
}

/// Tracks reported connectivity and publishes transitions.
pub struct ConnectivityMonitor {
    state: RwLock<ConnectivityState>,
    watch_tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial assumption.
    pub fn new(initially_online: bool) -> Self {
        let (watch_tx, _) = watch::channel(initially_online);
        Self {
            state: RwLock::new(ConnectivityState {
                is_online: initially_online,
                last_transition_at: None,
            }),
            watch_tx,
        }
    }

    /// Returns whether the host currently reports being online.
    pub fn is_online(&self) -> bool {
        self.state.read().is_online
    }

    /// Returns the full connectivity snapshot.
    pub fn state(&self) -> ConnectivityState {
        *self.state.read()
    }

    /// Records an online report.
    ///
    /// Returns true only when this report is an offline → online
    /// transition; a repeated online report returns false and publishes
    /// nothing.
    pub fn notify_online(&self) -> bool {
        let mut state = self.state.write();
        if state.is_online {
            return false;
        }
        state.is_online = true;
        state.last_transition_at = Some(chrono::Utc::now().timestamp_millis());
        drop(state);
        self.watch_tx.send_replace(true);
        true
    }

    /// Records an offline report.
    pub fn notify_offline(&self) {
        let mut state = self.state.write();
        if !state.is_online {
            return;
        }
        state.is_online = false;
        state.last_transition_at = Some(chrono::Utc::now().timestamp_millis());
        drop(state);
        self.watch_tx.send_replace(false);
    }

    /// Subscribes to connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.watch_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_initial_assumption() {
        assert!(ConnectivityMonitor::new(true).is_online());
        assert!(!ConnectivityMonitor::new(false).is_online());
    }

    #[test]
    fn only_the_edge_reports_a_transition() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(monitor.notify_online());
        assert!(!monitor.notify_online());
        assert!(monitor.is_online());

        monitor.notify_offline();
        assert!(!monitor.is_online());
        assert!(monitor.notify_online());
    }

    #[test]
    fn transition_is_timestamped() {
        let monitor = ConnectivityMonitor::new(true);
        assert_eq!(monitor.state().last_transition_at, None);

        monitor.notify_offline();
        assert!(monitor.state().last_transition_at.is_some());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();
        assert!(!*rx.borrow());

        monitor.notify_online();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn duplicate_reports_do_not_wake_subscribers() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.notify_online();
        assert!(!rx.has_changed().unwrap());
    }
}
