//! Error types for the room layer.

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// A socket id or room name was empty.
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
}
