//! In-memory relay state: registry, pending signals, bindings, and the router.

pub mod binding;
pub mod pending;
pub mod registry;
pub mod router;

pub use router::SignalRouter;

use callwire_core::ServerEvent;
use tokio::sync::mpsc;

/// Opaque connection handle assigned by the server at accept time.
/// Monotonically increasing, never reused within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound sender for pushing events to a connection's writer task.
pub type Outbound = mpsc::Sender<ServerEvent>;
