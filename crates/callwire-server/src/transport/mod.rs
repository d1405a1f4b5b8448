//! Transport layer: WebSocket listener and frame helpers.

pub mod websocket;
