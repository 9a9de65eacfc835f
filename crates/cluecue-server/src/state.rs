use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

use cluecue_lib::net::ProtocolError;
use cluecue_lib::RoomCode;
use rand::{thread_rng, Rng};

use crate::catalog::Catalog;
use crate::room;
use crate::room::room_handle::{RoomHandle, RoomHandleProvider};

const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 4;

/// Registry of all open rooms, keyed by join code. Room lifecycle is under
/// its exclusive control: entries are created here and removed when the
/// owning actor drops its [`OwnedCode`].
#[derive(Clone, Debug, Default)]
pub struct ServerState {
    rooms: Arc<Mutex<HashMap<RoomCode, RoomHandleProvider>>>,
}

impl ServerState {
    /// Open a new room with `creator` as its only player. A proposed code is
    /// honored when free; without one a fresh random code is generated.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::DuplicateRoomCode`] when the proposed code is
    /// already in use.
    pub fn open_room(
        &self,
        creator: &str,
        proposed: Option<RoomCode>,
        catalog: Arc<Catalog>,
    ) -> Result<(RoomCode, RoomHandle), ProtocolError> {
        let mut rooms = self.rooms();
        let code = match proposed {
            Some(code) => {
                if rooms.contains_key(&code) {
                    return Err(ProtocolError::DuplicateRoomCode(code));
                }
                code
            }
            None => loop {
                let code = random_code();
                if !rooms.contains_key(&code) {
                    break code;
                }
            },
        };

        let (provider, handle) = room::start_new_room(
            OwnedCode::new(self.clone(), code.clone()),
            creator,
            catalog,
        );
        rooms.insert(code.clone(), provider);
        tracing::info!(%code, "Room registered");
        Ok((code, handle))
    }

    /// Get the [`RoomHandleProvider`] for an open room.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidRoomCode`] when no room has that code.
    pub fn handle_provider(&self, code: &RoomCode) -> Result<RoomHandleProvider, ProtocolError> {
        self.rooms()
            .get(code)
            .cloned()
            .ok_or_else(|| ProtocolError::InvalidRoomCode(code.clone()))
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomCode, RoomHandleProvider>> {
        self.rooms.lock().unwrap()
    }
}

fn random_code() -> RoomCode {
    let mut rng = thread_rng();
    let code: String = (0..CODE_LEN)
        .map(|_| char::from(CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())]))
        .collect();
    RoomCode::new(code)
}

/// Room code handed to the owning actor; removes the registry entry when
/// dropped so a room's code frees up exactly when its actor exits.
#[derive(Debug)]
pub struct OwnedCode {
    state: ServerState,
    code: RoomCode,
}

impl OwnedCode {
    pub(crate) fn new(state: ServerState, code: RoomCode) -> Self {
        Self { state, code }
    }

    pub fn clone_code(&self) -> RoomCode {
        self.code.clone()
    }
}

impl Display for OwnedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.code.fmt(f)
    }
}

/// Workaround for constructing actors directly in tests
#[cfg(test)]
impl From<RoomCode> for OwnedCode {
    fn from(code: RoomCode) -> Self {
        Self {
            state: ServerState::default(),
            code,
        }
    }
}

impl Drop for OwnedCode {
    fn drop(&mut self) {
        // This will crash the program if we're dropping due to a previous
        // panic caused by a poisoned lock, and that's fine for now.
        self.state.rooms().remove(&self.code);
    }
}
