//! Public projection of a room's state, safe to broadcast to every
//! participant. Hands and selections never appear here; they travel on
//! per-player private channels only.

use serde::{Deserialize, Serialize};

use crate::{Card, Phase, RoomCode, Team};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Scores {
    pub team_one: u32,
    pub team_two: u32,
}

impl Scores {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::One => self.team_one,
            Team::Two => self.team_two,
        }
    }

    pub fn add(&mut self, team: Team) {
        match team {
            Team::One => self.team_one += 1,
            Team::Two => self.team_two += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlayerSummary {
    pub user: String,
    pub team: Option<Team>,
    pub has_selected: bool,
}

/// Everything a client needs to render the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TurnInfo {
    /// Captain of the team that picks the next clue giver.
    pub chooser: Option<String>,
    pub clue_giver: Option<String>,
    pub clue_giver_team: Option<Team>,
    pub card_in_play: Option<Card>,
    /// Whole seconds until the turn deadline, 0 when no turn is running.
    pub seconds_remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub creator: String,
    pub phase: Phase,
    pub players: Vec<PlayerSummary>,
    pub scores: Scores,
    pub turn: TurnInfo,
}
