//! The authoritative state machine for one match. Purely synchronous: time
//! enters only as [`Instant`] arguments and randomness only as `Rng`
//! arguments, so every transition is deterministic under test. Each operation
//! either fully applies or returns an error leaving the room untouched.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use cluecue_lib::room::{PlayerSummary, RoomSnapshot, Scores, TurnInfo};
use cluecue_lib::{Card, Phase, RoomCode, Team, HAND_SIZE, MIN_PLAYERS, PICK_SIZE};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::Catalog;

use super::{RoomError, RoomResult};

/// Nominal length of one clue-giving turn.
pub const TURN_SECONDS: u64 = 30;
/// Allowance past the deadline during which a late guess or skip still
/// applies, covering network latency.
pub const GRACE_SECONDS: u64 = 1;

#[derive(Debug, Clone)]
pub struct Player {
    pub user: String,
    pub team: Option<Team>,
    pub hand: Vec<Card>,
    /// Empty until the player submits, then exactly five cards.
    pub selection: Vec<Card>,
}

impl Player {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_owned(),
            team: None,
            hand: Vec::new(),
            selection: Vec::new(),
        }
    }

    pub fn has_selected(&self) -> bool {
        self.selection.len() == PICK_SIZE
    }
}

/// Fixed team representatives, set once when the selection phase begins.
#[derive(Debug, Clone)]
pub struct Captains {
    pub team_one: String,
    pub team_two: String,
}

impl Captains {
    pub fn get(&self, team: Team) -> &str {
        match team {
            Team::One => &self.team_one,
            Team::Two => &self.team_two,
        }
    }
}

#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    creator: String,
    phase: Phase,
    /// Insertion order, re-ordered exactly once by the selection-phase shuffle.
    players: Vec<Player>,
    /// Three independent copies of the compiled match deck, one per round.
    decks: [VecDeque<Card>; 3],
    scores: Scores,
    captains: Option<Captains>,
    /// Team whose captain picks the next clue giver.
    chooser: Team,
    clue_giver: Option<String>,
    turn_deadline: Option<Instant>,
}

impl Room {
    pub fn new(code: RoomCode, creator: &str) -> Self {
        Self {
            code,
            creator: creator.to_owned(),
            phase: Phase::Lobby,
            players: vec![Player::new(creator)],
            decks: Default::default(),
            scores: Scores::default(),
            captains: None,
            chooser: Team::One,
            clue_giver: None,
            turn_deadline: None,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn clue_giver(&self) -> Option<&str> {
        self.clue_giver.as_deref()
    }

    pub fn turn_deadline(&self) -> Option<Instant> {
        self.turn_deadline
    }

    pub fn hand_of(&self, user: &str) -> Option<&[Card]> {
        self.player(user).map(|p| p.hand.as_slice())
    }

    fn player(&self, user: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user == user)
    }

    fn team_of(&self, user: &str) -> Option<Team> {
        self.player(user).and_then(|p| p.team)
    }

    fn active_deck(&self) -> Option<&VecDeque<Card>> {
        self.phase.deck_index().map(|i| &self.decks[i])
    }

    fn active_deck_mut(&mut self) -> Option<&mut VecDeque<Card>> {
        self.phase.deck_index().map(|i| &mut self.decks[i])
    }

    /// The card currently being guessed: the front of the live round deck,
    /// present only while a clue giver is set.
    pub fn card_in_play(&self) -> Option<&Card> {
        self.clue_giver.as_ref()?;
        self.active_deck().and_then(VecDeque::front)
    }

    /// Idempotent join: a known identity rejoins with their roster entry
    /// intact, a new identity may only be added while the room is still in
    /// the lobby.
    pub fn add_player(&mut self, user: &str) -> RoomResult<()> {
        if self.player(user).is_some() {
            return Ok(());
        }
        if self.phase != Phase::Lobby {
            return Err(RoomError::IllegalAction);
        }
        self.players.push(Player::new(user));
        Ok(())
    }

    /// Shuffle the roster, split it into two teams, deal eight cards to every
    /// player and enter the selection phase. Teams and captains are assigned
    /// here and never change afterwards.
    pub fn start_selection(&mut self, catalog: &Catalog, rng: &mut impl Rng) -> RoomResult<()> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::IllegalAction);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers {
                have: self.players.len(),
            });
        }

        // The draw is the only fallible step; nothing mutates before it.
        let mut dealt = catalog.sample(rng, HAND_SIZE * self.players.len())?;

        self.players.shuffle(rng);
        for (i, player) in self.players.iter_mut().enumerate() {
            player.team = Some(if i % 2 == 0 { Team::One } else { Team::Two });
            player.hand = dealt.drain(..HAND_SIZE).collect();
        }

        self.scores = Scores::default();
        self.captains = Some(Captains {
            team_one: self.first_of(Team::One),
            team_two: self.first_of(Team::Two),
        });
        self.chooser = Team::One;
        self.phase = Phase::Selection;
        Ok(())
    }

    fn first_of(&self, team: Team) -> String {
        self.players
            .iter()
            .find(|p| p.team == Some(team))
            .map(|p| p.user.clone())
            .unwrap_or_default()
    }

    /// Record which five of their hand a player keeps. Indices are resolved
    /// against the current hand at call time; anything other than exactly
    /// five distinct in-range positions records nothing. Resubmission
    /// overwrites until the decks compile, after which the phase gate makes
    /// further submissions illegal.
    pub fn submit_selection(
        &mut self,
        user: &str,
        indices: &[usize],
        rng: &mut impl Rng,
    ) -> RoomResult<()> {
        if self.phase != Phase::Selection {
            return Err(RoomError::IllegalAction);
        }
        let slot = self
            .players
            .iter()
            .position(|p| p.user == user)
            .ok_or_else(|| RoomError::UnknownPlayer(user.to_owned()))?;

        let hand_len = self.players[slot].hand.len();
        let mut seen = HashSet::new();
        let mut picked = Vec::with_capacity(PICK_SIZE);
        for &index in indices {
            // Out-of-range positions are dropped; the survivors are counted.
            if index >= hand_len {
                continue;
            }
            if !seen.insert(index) {
                return Err(RoomError::InvalidSelection);
            }
            picked.push(index);
        }
        if picked.len() != PICK_SIZE {
            return Err(RoomError::InvalidSelection);
        }

        let hand = &self.players[slot].hand;
        self.players[slot].selection = picked.iter().map(|&i| hand[i].clone()).collect();

        if self.players.iter().all(Player::has_selected) {
            self.compile_match_deck(rng);
        }
        Ok(())
    }

    /// Concatenate every player's five picks in roster order, shuffle once
    /// and copy the result into three independent round decks.
    fn compile_match_deck(&mut self, rng: &mut impl Rng) {
        let mut master: Vec<Card> = self
            .players
            .iter()
            .flat_map(|p| p.selection.iter().cloned())
            .collect();
        master.shuffle(rng);

        self.decks = [
            VecDeque::from(master.clone()),
            VecDeque::from(master.clone()),
            VecDeque::from(master),
        ];
        self.phase = self.phase.next();
    }

    /// Name the player who describes cards next and start their turn.
    pub fn set_clue_giver(&mut self, user: &str, now: Instant) -> RoomResult<()> {
        if !self.phase.is_round() {
            return Err(RoomError::IllegalAction);
        }
        if self.player(user).is_none() {
            return Err(RoomError::UnknownPlayer(user.to_owned()));
        }

        self.clue_giver = Some(user.to_owned());
        self.start_turn(now);
        Ok(())
    }

    fn start_turn(&mut self, now: Instant) {
        match self.active_deck() {
            Some(deck) if !deck.is_empty() => {
                self.turn_deadline = Some(now + Duration::from_secs(TURN_SECONDS));
            }
            _ => self.end_round(),
        }
    }

    fn within_grace(&self, now: Instant) -> bool {
        self.turn_deadline
            .is_some_and(|deadline| now <= deadline + Duration::from_secs(GRACE_SECONDS))
    }

    /// The team guessed the card in play. Consumes it permanently and scores
    /// one point for the clue giver's team. Silently ignored when no turn is
    /// running or the grace window has passed. Returns whether state changed.
    pub fn guess_correct(&mut self, now: Instant) -> bool {
        let Some(giver) = self.clue_giver.clone() else {
            return false;
        };
        if !self.within_grace(now) {
            return false;
        }
        let Some(team) = self.team_of(&giver) else {
            return false;
        };
        let Some(deck) = self.active_deck_mut() else {
            return false;
        };
        if deck.pop_front().is_none() {
            return false;
        }
        let exhausted = deck.is_empty();

        self.scores.add(team);
        if exhausted {
            self.end_round();
        }
        true
    }

    /// Rotate the card in play to the back of the deck. Disallowed during
    /// round one; late calls are silently ignored like [`Self::guess_correct`].
    pub fn skip_card(&mut self, now: Instant) -> RoomResult<bool> {
        if !self.phase.is_round() || self.phase == Phase::RoundOne {
            return Err(RoomError::IllegalAction);
        }
        if self.clue_giver.is_none() || !self.within_grace(now) {
            return Ok(false);
        }
        let Some(deck) = self.active_deck_mut() else {
            return Ok(false);
        };
        let Some(card) = deck.pop_front() else {
            return Ok(false);
        };
        deck.push_back(card);
        Ok(true)
    }

    /// Close the running turn and pass choosing rights to the other team.
    pub fn end_turn(&mut self) {
        self.clue_giver = None;
        self.turn_deadline = None;
        self.chooser = self.chooser.other();
    }

    /// Close the turn and advance the match one round. Scores accumulate
    /// across rounds.
    pub fn end_round(&mut self) {
        self.end_turn();
        self.phase = self.phase.next();
    }

    /// Lazy deadline check for the surrounding sweep: ends the turn if its
    /// deadline has passed and reports whether it did.
    pub fn expire_turn(&mut self, now: Instant) -> bool {
        match self.turn_deadline {
            Some(deadline) if now > deadline => {
                self.end_turn();
                true
            }
            _ => false,
        }
    }

    /// Read-only public projection, safe to broadcast to every participant.
    pub fn snapshot(&self, now: Instant) -> RoomSnapshot {
        let seconds_remaining = self
            .turn_deadline
            .map_or(0, |deadline| deadline.saturating_duration_since(now).as_secs());

        RoomSnapshot {
            code: self.code.clone(),
            creator: self.creator.clone(),
            phase: self.phase,
            players: self
                .players
                .iter()
                .map(|p| PlayerSummary {
                    user: p.user.clone(),
                    team: p.team,
                    has_selected: p.has_selected(),
                })
                .collect(),
            scores: self.scores,
            turn: TurnInfo {
                chooser: self
                    .captains
                    .as_ref()
                    .map(|c| c.get(self.chooser).to_owned()),
                clue_giver: self.clue_giver.clone(),
                clue_giver_team: self
                    .clue_giver
                    .as_deref()
                    .and_then(|user| self.team_of(user)),
                card_in_play: self.card_in_play().cloned(),
                seconds_remaining,
            },
        }
    }
}
