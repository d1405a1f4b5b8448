//! JSON wire messages for the signaling protocol.
//!
//! Clients send `register` and `signal` events as JSON text frames; the
//! server only ever pushes `signal` events back. Registration payloads are
//! lenient about where the identity lives (`id`, `userId`, or `user.id`)
//! because different client builds have sent all three shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role declared by a peer at registration time.
///
/// Only `admin` has special routing behavior (membership in the broadcast
/// set); any other value is carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Caller,
    Admin,
    Other(String),
}

impl Role {
    /// Parse a role string from a registration payload.
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "caller" => Role::Caller,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Caller => f.write_str("caller"),
            Role::Admin => f.write_str("admin"),
            Role::Other(s) => f.write_str(s),
        }
    }
}

/// An inbound client event, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    Register(RegisterPayload),
    Signal(SignalPayload),
}

/// Payload of a `register` event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

/// Nested `user` object some clients send instead of top-level fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl RegisterPayload {
    /// Resolve the declared identity: `id`, then `userId`, then `user.id`.
    /// Empty strings count as absent.
    pub fn identity(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
            .or_else(|| non_empty(self.user_id.as_deref()))
            .or_else(|| non_empty(self.user.as_ref().and_then(|u| u.id.as_deref())))
    }

    /// Resolve the declared role: top-level `role`, then `user.role`.
    pub fn role(&self) -> Option<Role> {
        non_empty(self.role.as_deref())
            .or_else(|| non_empty(self.user.as_ref().and_then(|u| u.role.as_deref())))
            .map(Role::parse)
    }
}

/// Payload of a `signal` event.
///
/// No `targetUserId` means a caller broadcast seeking any admin; a present
/// target means an admin's reply to a specific caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    #[serde(default)]
    pub target_user_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub from_user_id: Option<String>,
}

impl SignalPayload {
    /// Target identity, with empty strings treated as absent.
    pub fn target(&self) -> Option<&str> {
        non_empty(self.target_user_id.as_deref())
    }

    /// Sender identity override, with empty strings treated as absent.
    pub fn from(&self) -> Option<&str> {
        non_empty(self.from_user_id.as_deref())
    }
}

/// An event pushed from the server to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Signal {
        data: Value,
        #[serde(rename = "fromUserId")]
        from_user_id: String,
    },
}

impl ServerEvent {
    /// Convenience constructor for the only server-pushed event.
    pub fn signal(data: Value, from_user_id: impl Into<String>) -> ServerEvent {
        ServerEvent::Signal {
            data,
            from_user_id: from_user_id.into(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_top_level_id() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"type":"register","id":"c1","role":"caller"}"#).unwrap();
        match ev {
            ClientEvent::Register(p) => {
                assert_eq!(p.identity(), Some("c1"));
                assert_eq!(p.role(), Some(Role::Caller));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn register_user_id_variant() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"type":"register","userId":"a1","role":"admin"}"#).unwrap();
        match ev {
            ClientEvent::Register(p) => {
                assert_eq!(p.identity(), Some("a1"));
                assert!(p.role().unwrap().is_admin());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn register_nested_user_object() {
        let raw = r#"{"type":"register","user":{"id":"a2","role":"admin"}}"#;
        let ev: ClientEvent = serde_json::from_str(raw).unwrap();
        match ev {
            ClientEvent::Register(p) => {
                assert_eq!(p.identity(), Some("a2"));
                assert_eq!(p.role(), Some(Role::Admin));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn register_empty_strings_are_absent() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"type":"register","id":"","role":""}"#).unwrap();
        match ev {
            ClientEvent::Register(p) => {
                assert_eq!(p.identity(), None);
                assert_eq!(p.role(), None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn signal_without_target_is_broadcast_shaped() {
        let raw = r#"{"type":"signal","data":{"sdp":"offer"},"fromUserId":"c1"}"#;
        let ev: ClientEvent = serde_json::from_str(raw).unwrap();
        match ev {
            ClientEvent::Signal(p) => {
                assert_eq!(p.target(), None);
                assert_eq!(p.from(), Some("c1"));
                assert_eq!(p.data, json!({"sdp":"offer"}));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn signal_with_target() {
        let raw = r#"{"type":"signal","targetUserId":"c1","data":"candidate"}"#;
        let ev: ClientEvent = serde_json::from_str(raw).unwrap();
        match ev {
            ClientEvent::Signal(p) => {
                assert_eq!(p.target(), Some("c1"));
                assert_eq!(p.from(), None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_event_wire_shape() {
        let ev = ServerEvent::signal(json!({"sdp":"answer"}), "a1");
        let raw = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            raw,
            json!({"type":"signal","data":{"sdp":"answer"},"fromUserId":"a1"})
        );
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        let res = serde_json::from_str::<ClientEvent>(r#"{"type":"dance"}"#);
        assert!(res.is_err());
    }
}
