use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RoomCode;

/// Failure while encoding or decoding a wire frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame exceeded maximum length")]
    FrameLength,
    #[error("connection reset while a frame was in flight")]
    ConnectionReset,
    #[error(transparent)]
    Codec(#[from] bincode::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error addressed to a single client, rendered for user-facing display.
#[derive(Debug, Error, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProtocolError {
    #[error("client version {0} does not match server version {1}")]
    VersionMismatch(String, String),
    #[error("no open room with code {0}")]
    InvalidRoomCode(RoomCode),
    #[error("a room with code {0} already exists")]
    DuplicateRoomCode(RoomCode),
    #[error("received an invalid message")]
    InvalidMessage,
    #[error("remote client disconnected")]
    Disconnected,
    #[error("{0}")]
    Message(String),
}
