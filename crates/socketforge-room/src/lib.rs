//! Room membership for SocketForge.
//!
//! A room is a named group of socket ids. [`RoomManager`] keeps the index
//! in both directions (room → sockets and socket → rooms) so either
//! question is a single lookup.
//!
//! # Key types
//!
//! - [`RoomManager`]: the shared, thread-safe index
//! - [`RoomError`]: rejected identifiers

mod error;
mod manager;

pub use error::RoomError;
pub use manager::RoomManager;
