//! In-memory presence registry.
//!
//! Maps a user id to the set of live hub connection ids. A user may hold many
//! connections at once (tabs, devices). The whole map sits behind one mutex so
//! that "mutate, then check whether the set is empty" is a single critical
//! section: exactly one caller observes each Online/Offline transition.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Process-wide presence state, owned by `AppState` and shared via `Arc`.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The map holds no invariant a panicking holder could break halfway,
    /// so a poisoned lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        self.online.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add `connection_id` to the user's connection set.
    ///
    /// Returns `true` when this was the user's first connection, i.e. the user
    /// just came online and the caller should announce it.
    pub fn register_connection(&self, user_id: &str, connection_id: &str) -> bool {
        if user_id.is_empty() || connection_id.is_empty() {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Ignoring registration with empty identifier"
            );
            return false;
        }

        let mut online = self.lock();
        let connections = online.entry(user_id.to_string()).or_default();
        let inserted = connections.insert(connection_id.to_string());
        let came_online = inserted && connections.len() == 1;

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = connections.len(),
            "Presence connection registered"
        );

        came_online
    }

    /// Remove `connection_id` from the user's connection set, dropping the user
    /// entirely once the set is empty.
    ///
    /// Returns `true` when the last connection was removed (user went offline).
    /// Unknown users and unknown connections are a no-op: transports do not
    /// guarantee disconnect ordering.
    pub fn unregister_connection(&self, user_id: &str, connection_id: &str) -> bool {
        let mut online = self.lock();

        let Some(connections) = online.get_mut(user_id) else {
            return false;
        };

        if !connections.remove(connection_id) {
            return false;
        }

        let went_offline = connections.is_empty();
        if went_offline {
            online.remove(user_id);
        }

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            went_offline,
            "Presence connection unregistered"
        );

        went_offline
    }

    /// Snapshot of online user ids, ascending.
    pub fn online_users(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Snapshot of a user's connection ids (empty when the user is offline).
    pub fn connections_for_user(&self, user_id: &str) -> BTreeSet<String> {
        self.lock().get(user_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn register_adds_user_and_connection() {
        let tracker = PresenceTracker::new();

        assert!(tracker.register_connection("user1", "conn1"));

        assert_eq!(tracker.online_users(), vec!["user1".to_string()]);
        assert_eq!(
            tracker.connections_for_user("user1"),
            BTreeSet::from(["conn1".to_string()])
        );
    }

    #[test]
    fn second_connection_does_not_report_came_online() {
        let tracker = PresenceTracker::new();

        assert!(tracker.register_connection("user1", "conn1"));
        assert!(!tracker.register_connection("user1", "conn2"));

        let connections = tracker.connections_for_user("user1");
        assert_eq!(connections.len(), 2);
        assert!(connections.contains("conn1"));
        assert!(connections.contains("conn2"));
    }

    #[test]
    fn duplicate_registration_is_idempotent() {
        let tracker = PresenceTracker::new();

        assert!(tracker.register_connection("user1", "conn1"));
        assert!(!tracker.register_connection("user1", "conn1"));

        assert_eq!(tracker.connections_for_user("user1").len(), 1);
    }

    #[test]
    fn unregister_one_of_two_connections_keeps_user_online() {
        let tracker = PresenceTracker::new();
        tracker.register_connection("user1", "conn1");
        tracker.register_connection("user1", "conn2");

        assert!(!tracker.unregister_connection("user1", "conn1"));

        assert_eq!(
            tracker.connections_for_user("user1"),
            BTreeSet::from(["conn2".to_string()])
        );
        assert_eq!(tracker.online_users(), vec!["user1".to_string()]);
    }

    #[test]
    fn unregister_last_connection_takes_user_offline() {
        let tracker = PresenceTracker::new();
        tracker.register_connection("user1", "conn1");

        assert!(tracker.unregister_connection("user1", "conn1"));

        assert!(tracker.online_users().is_empty());
        assert!(tracker.connections_for_user("user1").is_empty());
    }

    #[test]
    fn unregister_unknown_pair_is_noop() {
        let tracker = PresenceTracker::new();
        tracker.register_connection("user1", "conn1");

        assert!(!tracker.unregister_connection("ghost", "conn1"));
        assert!(!tracker.unregister_connection("user1", "ghost-conn"));

        assert_eq!(tracker.online_users(), vec!["user1".to_string()]);
        assert_eq!(tracker.connections_for_user("user1").len(), 1);
    }

    #[test]
    fn empty_identifiers_are_ignored() {
        let tracker = PresenceTracker::new();

        assert!(!tracker.register_connection("", "conn1"));
        assert!(!tracker.register_connection("user1", ""));

        assert!(tracker.online_users().is_empty());
    }

    #[test]
    fn online_users_are_sorted() {
        let tracker = PresenceTracker::new();
        tracker.register_connection("z-user", "c1");
        tracker.register_connection("a-user", "c2");
        tracker.register_connection("m-user", "c3");

        assert_eq!(tracker.online_users(), vec!["a-user", "m-user", "z-user"]);
    }

    #[test]
    fn connections_for_offline_user_is_empty() {
        let tracker = PresenceTracker::new();
        assert!(tracker.connections_for_user("missing").is_empty());
    }

    #[test]
    fn multi_tab_walkthrough() {
        let tracker = PresenceTracker::new();
        tracker.register_connection("user1", "conn1");
        tracker.register_connection("user1", "conn2");
        assert_eq!(tracker.online_users(), vec!["user1"]);

        tracker.unregister_connection("user1", "conn1");
        assert_eq!(
            tracker.connections_for_user("user1"),
            BTreeSet::from(["conn2".to_string()])
        );
        assert_eq!(tracker.online_users(), vec!["user1"]);

        tracker.unregister_connection("user1", "conn2");
        assert!(tracker.online_users().is_empty());
        assert!(tracker.connections_for_user("user1").is_empty());
    }

    #[test]
    fn concurrent_registrations_are_not_lost() {
        const N: usize = 64;
        let tracker = Arc::new(PresenceTracker::new());

        let came_online: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..N)
                .map(|i| {
                    let tracker = Arc::clone(&tracker);
                    scope.spawn(move || tracker.register_connection("user1", &format!("conn{i}")))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("registration thread panicked") as usize)
                .sum()
        });

        assert_eq!(came_online, 1);
        assert_eq!(tracker.connections_for_user("user1").len(), N);
    }

    #[test]
    fn concurrent_unregistrations_report_offline_once() {
        const N: usize = 64;
        let tracker = Arc::new(PresenceTracker::new());
        for i in 0..N {
            tracker.register_connection("user1", &format!("conn{i}"));
        }

        let went_offline: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..N)
                .map(|i| {
                    let tracker = Arc::clone(&tracker);
                    scope.spawn(move || tracker.unregister_connection("user1", &format!("conn{i}")))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("unregistration thread panicked") as usize)
                .sum()
        });

        assert_eq!(went_offline, 1);
        assert!(tracker.online_users().is_empty());
    }
}
