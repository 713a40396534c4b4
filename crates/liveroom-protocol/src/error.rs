//! Error types for the protocol layer.

/// Errors raised when a raw value cannot be turned into a protocol type.
///
/// These only occur at the edges, where numbers arrive from a request body
/// or a storage row and have to be checked against the known enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The difficulty code is not one of the recognised levels.
    #[error("unknown difficulty code {0}")]
    UnknownDifficulty(u8),

    /// The room status code is not one of the lifecycle states.
    #[error("unknown room status code {0}")]
    UnknownStatus(u8),
}
