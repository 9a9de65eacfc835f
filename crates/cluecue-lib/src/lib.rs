use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

pub mod net;
pub mod room;

/// Minimum roster size before the selection phase may begin.
pub const MIN_PLAYERS: usize = 4;
/// Cards dealt to each player at the start of the selection phase.
pub const HAND_SIZE: usize = 8;
/// Cards each player keeps from their hand.
pub const PICK_SIZE: usize = 5;

/// Join code identifying one room. Codes are normalized to uppercase and
/// never change after the room is created.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for RoomCode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

impl Display for RoomCode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single guessable term. Opaque to the engine.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Card(String);

impl Card {
    pub fn new(term: impl Into<String>) -> Self {
        Self(term.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for Card {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for Card {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn other(self) -> Self {
        match self {
            Team::One => Team::Two,
            Team::Two => Team::One,
        }
    }
}

impl Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::One => f.write_str("1"),
            Team::Two => f.write_str("2"),
        }
    }
}

/// Coarse stage of a match. Transitions are strictly forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Phase {
    Lobby,
    Selection,
    RoundOne,
    RoundTwo,
    RoundThree,
    Finished,
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Phase::Lobby => Phase::Selection,
            Phase::Selection => Phase::RoundOne,
            Phase::RoundOne => Phase::RoundTwo,
            Phase::RoundTwo => Phase::RoundThree,
            Phase::RoundThree | Phase::Finished => Phase::Finished,
        }
    }

    pub fn is_round(self) -> bool {
        self.deck_index().is_some()
    }

    /// Which of the three round decks is live during this phase.
    pub fn deck_index(self) -> Option<usize> {
        match self {
            Phase::RoundOne => Some(0),
            Phase::RoundTwo => Some(1),
            Phase::RoundThree => Some(2),
            _ => None,
        }
    }
}
