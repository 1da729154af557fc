//! Client sessions for SocketForge.
//!
//! A [`Session`] drives one Socket.IO connection through
//! `Idle → Connecting → Open → Closing → Closed` over either carrier:
//!
//! - [`PollingSession`]: HTTP long-polling through an
//!   [`HttpClient`](socketforge_transport::HttpClient)
//! - [`WebSocketSession`]: one WebSocket through a
//!   [`WebSocketConnector`](socketforge_transport::WebSocketConnector)
//!
//! Application code registers handlers with [`Session::on`] and friends
//! and sends with [`Session::emit`].

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod observer;
mod polling;
mod session;
mod state;
mod transport;
mod uri;
mod websocket;

pub use config::{SessionConfig, TransportKind};
pub use error::SessionError;
pub use observer::{AckResponder, Event};
pub use polling::PollingSession;
pub use session::Session;
pub use state::{DisconnectReason, SessionInfo, SessionState};
pub use transport::TransportSession;
pub use websocket::WebSocketSession;
