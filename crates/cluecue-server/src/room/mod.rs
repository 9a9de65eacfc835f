use std::sync::Arc;

use cluecue_lib::net::ProtocolError;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::catalog::{Catalog, CatalogError};
use crate::state::OwnedCode;

use self::room_actor::RoomActor;
use self::room_handle::{RoomHandle, RoomHandleProvider};

mod room_actor;
pub mod room_handle;
pub mod room_state;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("at least 4 players are needed to start, the room has {have}")]
    NotEnoughPlayers { have: usize },
    #[error("exactly 5 distinct cards from your hand must be chosen")]
    InvalidSelection,
    #[error("no player named {0} in this room")]
    UnknownPlayer(String),
    #[error("that action is not allowed right now")]
    IllegalAction,
    #[error(transparent)]
    InsufficientCards(#[from] CatalogError),
    #[error("the room handle is no longer connected to a room")]
    HandleInvalid,
}

impl From<RoomError> for ProtocolError {
    fn from(v: RoomError) -> Self {
        Self::Message(v.to_string())
    }
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Spawn the actor task for a freshly created room and hand back a provider
/// (for later joiners) plus a concrete handle for the creator.
pub fn start_new_room(
    code: OwnedCode,
    creator: &str,
    catalog: Arc<Catalog>,
) -> (RoomHandleProvider, RoomHandle) {
    let (sender, receiver) = mpsc::channel(64);
    let weak_sender = sender.downgrade();
    let actor = RoomActor::new(code, creator, receiver, catalog);
    let handle = RoomHandle {
        sender,
        user: creator.to_owned(),
    };
    tokio::spawn(actor.run());

    (
        RoomHandleProvider {
            sender: weak_sender,
        },
        handle,
    )
}
