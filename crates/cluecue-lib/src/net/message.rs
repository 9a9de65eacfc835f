use serde::{Deserialize, Serialize};

use super::ProtocolError;
use crate::room::RoomSnapshot;
use crate::{Card, RoomCode};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum Message {
    Error {
        error: ProtocolError,
    },
    /// First frame a client sends; must match the server version exactly.
    Version {
        version: String,
    },
    /// Create a room. A proposed code is honored if free, otherwise the
    /// server answers with [`ProtocolError::DuplicateRoomCode`].
    RoomHost {
        user: String,
        code: Option<RoomCode>,
    },
    /// Join (or rejoin) an existing room.
    RoomJoin {
        code: RoomCode,
        user: String,
    },
    RoomAccept {
        code: RoomCode,
        user: String,
    },
    Room(RoomRequest),
    /// Broadcast to every participant after each successful mutation.
    RoomState {
        state: RoomSnapshot,
    },
    /// Private delivery of one player's 8-card hand. Never broadcast.
    HandDealt {
        cards: Vec<Card>,
    },
}

impl From<RoomRequest> for Message {
    fn from(req: RoomRequest) -> Self {
        Self::Room(req)
    }
}

/// In-room actions a joined client may request.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum RoomRequest {
    StartGame,
    SubmitCards { indices: Vec<usize> },
    SelectGiver { user: String },
    Guess,
    Skip,
    EndTurn,
}
