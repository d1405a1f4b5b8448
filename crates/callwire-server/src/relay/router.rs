//! Signal router: the protocol state machine.
//!
//! All relay state lives in one [`RelayState`] behind a single mutex; every
//! connection event, inbound signal, and retry tick locks it for the
//! duration of its state transition, which is what makes the at-most-one
//! invariants (one connection per identity, one admin per caller, one retry
//! task per caller) enforceable rather than conventional.
//!
//! Routing has two branches. A `signal` with no target is a caller
//! broadcast: delivered to every registered admin now and re-delivered on a
//! fixed interval until some admin claims the caller. A `signal` with a
//! target is an admin reply: the first reply wins the binding, stops the
//! caller's retry task, and is delivered directly or buffered if the caller
//! is offline.

use crate::relay::binding::BindingTable;
use crate::relay::pending::PendingSignals;
use crate::relay::registry::ConnectionRegistry;
use crate::relay::{ConnId, Outbound};
use callwire_core::{RegisterPayload, ServerEvent, SignalPayload};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// All mutable relay state, behind one serialization boundary.
#[derive(Debug, Default)]
pub struct RelayState {
    registry: ConnectionRegistry,
    pending: PendingSignals,
    bindings: BindingTable,
    /// Outbound senders for live connections, keyed by connection ID.
    outbound: HashMap<ConnId, Outbound>,
}

impl RelayState {
    /// Push an event to a connection's writer task, best effort.
    fn deliver(&self, conn: ConnId, event: ServerEvent) {
        match self.outbound.get(&conn) {
            Some(tx) => {
                if tx.try_send(event).is_err() {
                    warn!(conn = %conn, "outbound queue full or closed, dropping signal");
                }
            }
            None => debug!(conn = %conn, "no outbound sender for connection"),
        }
    }

    /// Deliver an event to every registered admin connection. An empty admin
    /// set means nothing happens this cycle; the retry task will try again.
    fn broadcast_to_admins(&self, event: &ServerEvent) {
        for conn in self.registry.admin_conns() {
            self.deliver(conn, event.clone());
        }
    }
}

/// Read-only snapshot of relay counters, for the health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RelayStats {
    pub connections: usize,
    pub registered: usize,
    pub admins: usize,
    pub active_retries: usize,
}

/// Handle for driving the relay state machine. Cheap to clone; all clones
/// share the same state.
#[derive(Clone)]
pub struct SignalRouter {
    state: Arc<Mutex<RelayState>>,
    retry_interval: Duration,
}

impl SignalRouter {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            retry_interval,
        }
    }

    /// Record a newly accepted connection's outbound sender.
    pub async fn connect(&self, conn: ConnId, tx: Outbound) {
        let mut st = self.state.lock().await;
        st.outbound.insert(conn, tx);
    }

    /// Handle a `register` event: store the identity/role mappings and flush
    /// any signals buffered for the identity while it was offline.
    pub async fn handle_register(&self, conn: ConnId, payload: &RegisterPayload) {
        let (identity, role) = match (payload.identity(), payload.role()) {
            (Some(id), Some(role)) => (id.to_string(), role),
            _ => {
                warn!(conn = %conn, "malformed registration (missing identity or role), dropped");
                return;
            }
        };

        let mut st = self.state.lock().await;
        if !st.registry.register(conn, &identity, role) {
            return;
        }

        let flushed = st.pending.take_buffered(&identity);
        if !flushed.is_empty() {
            info!(identity = %identity, count = flushed.len(), "flushing buffered signals");
            for event in flushed {
                st.deliver(conn, event);
            }
        }
    }

    /// Handle a `signal` event: caller broadcast or admin targeted reply.
    pub async fn handle_signal(&self, conn: ConnId, payload: SignalPayload) {
        let mut st = self.state.lock().await;

        let sender = match payload
            .from()
            .map(str::to_string)
            .or_else(|| st.registry.identity_of(conn).map(str::to_string))
        {
            Some(s) => s,
            None => {
                debug!(conn = %conn, "signal from unknown sender, dropped");
                return;
            }
        };

        match payload.target() {
            Some(target) => {
                let target = target.to_string();
                self.route_admin_reply(&mut st, conn, &sender, &target, payload.data);
            }
            None => {
                self.route_caller_broadcast(&mut st, &sender, payload.data);
            }
        }
    }

    /// Branch A: a caller looking for any admin.
    fn route_caller_broadcast(&self, st: &mut RelayState, sender: &str, data: serde_json::Value) {
        if st.bindings.is_bound(sender) {
            debug!(caller = %sender, "broadcast from already-bound caller, ignored");
            return;
        }
        if st.pending.retry_active(sender) {
            debug!(caller = %sender, "retry broadcast already active, ignored");
            return;
        }

        let event = ServerEvent::signal(data, sender);
        info!(caller = %sender, admins = st.registry.admin_count(), "caller broadcast");
        st.broadcast_to_admins(&event);

        let state = self.state.clone();
        let caller = sender.to_string();
        let interval = self.retry_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the broadcast for it
            // already happened synchronously above.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut st = state.lock().await;
                if st.bindings.is_bound(&caller) || !st.pending.retry_active(&caller) {
                    st.pending.clear_retry(&caller);
                    break;
                }
                debug!(caller = %caller, admins = st.registry.admin_count(), "retry broadcast tick");
                st.broadcast_to_admins(&event);
            }
        });
        st.pending.track_retry(sender, handle);
    }

    /// Branch B: an admin replying to a specific caller.
    fn route_admin_reply(
        &self,
        st: &mut RelayState,
        conn: ConnId,
        sender: &str,
        target: &str,
        data: serde_json::Value,
    ) {
        if !st.bindings.try_bind(target, conn) {
            warn!(
                caller = %target,
                admin = %conn,
                bound_to = ?st.bindings.bound_admin(target),
                "reply to already-bound caller rejected"
            );
            return;
        }

        // The caller has its admin now; stop the broadcast storm.
        st.pending.cancel_retry(target);

        let event = ServerEvent::signal(data, sender);
        match st.registry.connection_of(target) {
            Some(target_conn) => {
                debug!(caller = %target, admin = %sender, "reply delivered");
                st.deliver(target_conn, event);
            }
            None => {
                debug!(caller = %target, admin = %sender, "caller offline, reply buffered");
                st.pending.buffer(target, event);
            }
        }
    }

    /// Handle a connection going away: drop its mappings and release every
    /// binding it held as an admin. A disconnecting caller's retry task is
    /// left running on purpose — it is keyed by identity, not connection,
    /// and keeps broadcasting for the identity until an admin claims it.
    pub async fn disconnect(&self, conn: ConnId) {
        let mut st = self.state.lock().await;
        st.outbound.remove(&conn);
        let identity = st.registry.unregister(conn);
        let released = st.bindings.release_for(conn);
        if !released.is_empty() {
            info!(conn = %conn, callers = ?released, "admin disconnect released bindings");
        }
        debug!(conn = %conn, identity = ?identity, "connection closed");
    }

    /// Abort all retry tasks; called once at process shutdown.
    pub async fn shutdown(&self) {
        let mut st = self.state.lock().await;
        st.pending.cancel_all();
    }

    pub async fn stats(&self) -> RelayStats {
        let st = self.state.lock().await;
        RelayStats {
            connections: st.outbound.len(),
            registered: st.registry.count(),
            admins: st.registry.admin_count(),
            active_retries: st.pending.retry_count(),
        }
    }
}
