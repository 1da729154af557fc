//! # SocketForge
//!
//! Socket.IO / Engine.IO client toolkit for the v3 (Socket.IO v2) and v4
//! (Socket.IO v4/v5) protocol generations.
//!
//! The crates stack up as transport → protocol → session, with rooms and
//! retry alongside:
//!
//! - `socketforge-transport`: HTTP and WebSocket carrier traits
//! - `socketforge-protocol`: packet serialization, payload and frame codecs
//! - `socketforge-session`: the connection state machine
//! - `socketforge-room`: room membership index
//! - `socketforge-retry`: bounded, jittered, cancellable retry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use socketforge::prelude::*;
//!
//! # async fn run() -> Result<(), SocketForgeError> {
//! let client = ClientBuilder::new("http://localhost:3000").build_websocket();
//! client.session().on("chat", |event| println!("{:?}", event.args));
//! client.connect().await?;
//! client.session().emit("chat", vec!["hello".into()]).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{Client, ClientBuilder, WebSocketClient};
pub use error::SocketForgeError;

pub use socketforge_protocol as protocol;
pub use socketforge_retry as retry;
pub use socketforge_room as room;
pub use socketforge_session as session;
pub use socketforge_transport as transport;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{Client, ClientBuilder, SocketForgeError, WebSocketClient};
    pub use socketforge_protocol::{Data, EngineIoVersion, ProtocolMessage};
    pub use socketforge_retry::{RetryPolicy, retry};
    pub use socketforge_room::RoomManager;
    pub use socketforge_session::{
        AckResponder, DisconnectReason, Event, Session, SessionConfig, SessionState,
        TransportKind,
    };
    pub use socketforge_transport::{HttpClient, HttpMethod, HttpRequest};
}
