//! Connection registry: identity ↔ connection mappings and the admin set.
//!
//! At most one live connection is associated with an identity at a time;
//! a later registration under the same identity overwrites the mapping
//! (last-register-wins). The admin set always equals the connections
//! currently registered with role `admin`.

use crate::relay::ConnId;
use callwire_core::Role;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conn_of: HashMap<String, ConnId>,
    identity_of: HashMap<ConnId, String>,
    role_of: HashMap<String, Role>,
    admins: HashSet<ConnId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under an identity and role.
    ///
    /// Rejects empty identities (no state change). Displaces any previous
    /// connection holding the same identity, and any previous identity held
    /// by this connection.
    pub fn register(&mut self, conn: ConnId, identity: &str, role: Role) -> bool {
        if identity.is_empty() {
            return false;
        }

        // A connection re-registering under a new identity drops its old one.
        if let Some(old_identity) = self.identity_of.get(&conn).cloned() {
            if old_identity != identity {
                self.conn_of.remove(&old_identity);
                self.role_of.remove(&old_identity);
            }
        }

        // Last-register-wins: the previous holder of this identity loses it.
        if let Some(old_conn) = self.conn_of.insert(identity.to_string(), conn) {
            if old_conn != conn {
                self.identity_of.remove(&old_conn);
                self.admins.remove(&old_conn);
                debug!(identity, old_conn = %old_conn, new_conn = %conn, "identity re-registered");
            }
        }

        self.identity_of.insert(conn, identity.to_string());
        if role.is_admin() {
            self.admins.insert(conn);
        } else {
            self.admins.remove(&conn);
        }
        self.role_of.insert(identity.to_string(), role.clone());

        info!(conn = %conn, identity, role = %role, "peer registered");
        true
    }

    /// Remove all mappings for a connection, returning the identity it held.
    pub fn unregister(&mut self, conn: ConnId) -> Option<String> {
        self.admins.remove(&conn);
        let identity = self.identity_of.remove(&conn)?;
        // Only clear the forward mapping if it still points at us; a later
        // registration may have taken the identity over.
        if self.conn_of.get(&identity) == Some(&conn) {
            self.conn_of.remove(&identity);
            self.role_of.remove(&identity);
        }
        debug!(conn = %conn, identity = %identity, "peer unregistered");
        Some(identity)
    }

    pub fn connection_of(&self, identity: &str) -> Option<ConnId> {
        self.conn_of.get(identity).copied()
    }

    pub fn identity_of(&self, conn: ConnId) -> Option<&str> {
        self.identity_of.get(&conn).map(String::as_str)
    }

    pub fn role_of(&self, identity: &str) -> Option<&Role> {
        self.role_of.get(identity)
    }

    /// Connections currently registered with role `admin`.
    pub fn admin_conns(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.admins.iter().copied()
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    pub fn count(&self) -> usize {
        self.identity_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut reg = ConnectionRegistry::new();
        assert!(reg.register(ConnId(1), "c1", Role::Caller));
        assert_eq!(reg.connection_of("c1"), Some(ConnId(1)));
        assert_eq!(reg.identity_of(ConnId(1)), Some("c1"));
        assert_eq!(reg.role_of("c1"), Some(&Role::Caller));
        assert_eq!(reg.admin_count(), 0);
    }

    #[test]
    fn empty_identity_rejected() {
        let mut reg = ConnectionRegistry::new();
        assert!(!reg.register(ConnId(1), "", Role::Caller));
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn admin_set_tracks_admin_registrations() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "a1", Role::Admin);
        reg.register(ConnId(2), "c1", Role::Caller);
        let admins: Vec<_> = reg.admin_conns().collect();
        assert_eq!(admins, vec![ConnId(1)]);
    }

    #[test]
    fn last_register_wins_displaces_old_connection() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "a1", Role::Admin);
        reg.register(ConnId(2), "a1", Role::Admin);
        assert_eq!(reg.connection_of("a1"), Some(ConnId(2)));
        assert_eq!(reg.identity_of(ConnId(1)), None);
        // The displaced connection is no longer a registered admin.
        let admins: Vec<_> = reg.admin_conns().collect();
        assert_eq!(admins, vec![ConnId(2)]);
    }

    #[test]
    fn reregistering_with_new_role_updates_admin_set() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "u1", Role::Admin);
        assert_eq!(reg.admin_count(), 1);
        reg.register(ConnId(1), "u1", Role::Caller);
        assert_eq!(reg.admin_count(), 0);
    }

    #[test]
    fn connection_switching_identity_drops_old_one() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "old", Role::Caller);
        reg.register(ConnId(1), "new", Role::Caller);
        assert_eq!(reg.connection_of("old"), None);
        assert_eq!(reg.role_of("old"), None);
        assert_eq!(reg.connection_of("new"), Some(ConnId(1)));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn unregister_returns_identity_and_clears_admin() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "a1", Role::Admin);
        assert_eq!(reg.unregister(ConnId(1)), Some("a1".to_string()));
        assert_eq!(reg.connection_of("a1"), None);
        assert_eq!(reg.admin_count(), 0);
        // Idempotent on a gone connection.
        assert_eq!(reg.unregister(ConnId(1)), None);
    }

    #[test]
    fn unregister_displaced_connection_keeps_new_mapping() {
        let mut reg = ConnectionRegistry::new();
        reg.register(ConnId(1), "a1", Role::Admin);
        reg.register(ConnId(2), "a1", Role::Admin);
        // The displaced connection disconnecting must not clear conn 2's claim.
        assert_eq!(reg.unregister(ConnId(1)), None);
        assert_eq!(reg.connection_of("a1"), Some(ConnId(2)));
        assert_eq!(reg.admin_count(), 1);
    }
}
