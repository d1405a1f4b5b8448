//! Caller-admin binding table: sticky first-claim-wins pairing.
//!
//! The binding is the sole authority for which admin may speak to a caller.
//! It is keyed by caller identity and holds the bound admin's connection, so
//! an admin reconnecting under the same identity but a new connection does
//! not inherit old claims.

use crate::relay::ConnId;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct BindingTable {
    by_caller: HashMap<String, ConnId>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a caller for an admin connection.
    ///
    /// Succeeds if the caller is unbound or already bound to this same
    /// connection. A different admin holding the claim means rejection, with
    /// no state change.
    pub fn try_bind(&mut self, caller: &str, admin: ConnId) -> bool {
        match self.by_caller.get(caller) {
            Some(&bound) if bound != admin => false,
            Some(_) => true,
            None => {
                self.by_caller.insert(caller.to_string(), admin);
                debug!(caller, admin = %admin, "caller bound to admin");
                true
            }
        }
    }

    pub fn is_bound(&self, caller: &str) -> bool {
        self.by_caller.contains_key(caller)
    }

    pub fn bound_admin(&self, caller: &str) -> Option<ConnId> {
        self.by_caller.get(caller).copied()
    }

    /// Release every binding held by a disconnecting admin connection.
    /// Returns the callers that became unbound.
    pub fn release_for(&mut self, admin: ConnId) -> Vec<String> {
        let mut released = Vec::new();
        self.by_caller.retain(|caller, &mut bound| {
            if bound == admin {
                released.push(caller.clone());
                false
            } else {
                true
            }
        });
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let mut table = BindingTable::new();
        assert!(table.try_bind("c1", ConnId(1)));
        assert!(!table.try_bind("c1", ConnId(2)));
        assert_eq!(table.bound_admin("c1"), Some(ConnId(1)));
    }

    #[test]
    fn same_connection_rebind_confirms() {
        let mut table = BindingTable::new();
        assert!(table.try_bind("c1", ConnId(1)));
        assert!(table.try_bind("c1", ConnId(1)));
        assert_eq!(table.bound_admin("c1"), Some(ConnId(1)));
    }

    #[test]
    fn release_only_affects_that_admin() {
        let mut table = BindingTable::new();
        table.try_bind("x", ConnId(1));
        table.try_bind("y", ConnId(1));
        table.try_bind("z", ConnId(2));

        let mut released = table.release_for(ConnId(1));
        released.sort();
        assert_eq!(released, vec!["x".to_string(), "y".to_string()]);

        assert!(!table.is_bound("x"));
        assert!(!table.is_bound("y"));
        assert_eq!(table.bound_admin("z"), Some(ConnId(2)));

        // Released callers are eligible for rebinding by another admin.
        assert!(table.try_bind("x", ConnId(2)));
    }

    #[test]
    fn release_with_no_bindings_is_noop() {
        let mut table = BindingTable::new();
        assert!(table.release_for(ConnId(9)).is_empty());
    }
}
