use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cluecue_lib::net::Message;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::instrument;

use crate::catalog::Catalog;
use crate::state::OwnedCode;

use super::room_state::{Room, GRACE_SECONDS};
use super::RoomResult;

pub struct RoomActor {
    receiver: mpsc::Receiver<RoomAction>,
    room: Room,
    /// Keeps this room registered; dropping it removes the registry entry.
    code: OwnedCode,
    sender: broadcast::Sender<Message>,
    /// Private delivery channels by identity. Delivery only, never roster
    /// ownership: a player outliving their connection stays in the room.
    privates: HashMap<String, mpsc::Sender<Message>>,
    catalog: Arc<Catalog>,
    rng: StdRng,
}

#[derive(Debug)]
pub enum RoomAction {
    Join {
        respond_to: oneshot::Sender<RoomResult<broadcast::Receiver<Message>>>,
        user: String,
        private: mpsc::Sender<Message>,
    },
    Leave {
        user: String,
    },
    StartGame {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
    },
    SubmitCards {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
        indices: Vec<usize>,
    },
    SelectGiver {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
        target: String,
    },
    Guess {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
    },
    Skip {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
    },
    EndTurn {
        respond_to: oneshot::Sender<RoomResult<()>>,
        user: String,
    },
}

impl RoomActor {
    pub fn new(
        code: OwnedCode,
        creator: &str,
        receiver: mpsc::Receiver<RoomAction>,
        catalog: Arc<Catalog>,
    ) -> Self {
        let (sender, _) = broadcast::channel(100);

        Self {
            receiver,
            room: Room::new(code.clone_code(), creator),
            code,
            sender,
            privates: HashMap::new(),
            catalog,
            rng: StdRng::from_entropy(),
        }
    }

    #[instrument(skip_all, fields(room = %self.code))]
    pub async fn run(mut self) {
        tracing::info!("Room opened");
        loop {
            // Sweep arm: once the deadline plus the grace window passes
            // without a terminal action, the turn ends on its own. The
            // engine itself only ever checks deadlines lazily.
            let sweep_at = self
                .room
                .turn_deadline()
                .map(|deadline| deadline + Duration::from_secs(GRACE_SECONDS));

            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(action) => self.handle(action),
                    None => break,
                },
                () = sleep_until_std(sweep_at), if sweep_at.is_some() => {
                    if self.room.expire_turn(Instant::now()) {
                        tracing::info!("Turn deadline expired");
                        self.send_state();
                    }
                }
            }
        }
        tracing::info!("Closing room");
    }

    fn handle(&mut self, action: RoomAction) {
        match action {
            RoomAction::Join {
                respond_to,
                user,
                private,
            } => {
                let _ = respond_to.send(self.join(user, private));
            }
            RoomAction::Leave { user } => self.leave(&user),
            RoomAction::StartGame { respond_to, user } => {
                let _ = respond_to.send(self.start_game(&user));
            }
            RoomAction::SubmitCards {
                respond_to,
                user,
                indices,
            } => {
                let _ = respond_to.send(self.submit_cards(&user, &indices));
            }
            RoomAction::SelectGiver {
                respond_to,
                user,
                target,
            } => {
                let _ = respond_to.send(self.select_giver(&user, &target));
            }
            RoomAction::Guess { respond_to, user } => {
                let _ = respond_to.send(self.guess(&user));
            }
            RoomAction::Skip { respond_to, user } => {
                let _ = respond_to.send(self.skip(&user));
            }
            RoomAction::EndTurn { respond_to, user } => {
                let _ = respond_to.send(self.end_turn(&user));
            }
        }
    }

    fn send_state(&mut self) {
        let _ = self.sender.send(Message::RoomState {
            state: self.room.snapshot(Instant::now()),
        });
    }
}

// ----------------------------------------------------------------------------
// Action Handlers
// ----------------------------------------------------------------------------
impl RoomActor {
    #[instrument(skip(self, private))]
    fn join(
        &mut self,
        user: String,
        private: mpsc::Sender<Message>,
    ) -> RoomResult<broadcast::Receiver<Message>> {
        self.room.add_player(&user)?;

        // A rejoining player already holds a dealt hand; deliver it again on
        // the fresh channel so a reconnect can still complete selection.
        if let Some(hand) = self.room.hand_of(&user).filter(|hand| !hand.is_empty()) {
            let message = Message::HandDealt {
                cards: hand.to_vec(),
            };
            if private.try_send(message).is_err() {
                tracing::warn!("Failed to redeliver a hand on the private channel");
            }
        }
        self.privates.insert(user, private);

        // Subscribe early so the joiner receives the update that adds them
        let recv = self.sender.subscribe();
        tracing::info!("Player joined room");
        self.send_state();
        Ok(recv)
    }

    /// A connection went away. The roster is untouched; the identity may
    /// rejoin later and find their team, hand and selection intact.
    #[instrument(skip(self))]
    fn leave(&mut self, user: &str) {
        if self.privates.remove(user).is_none() {
            tracing::warn!("Disconnect for a user with no private channel");
            return;
        }
        tracing::info!("Player disconnected");

        // Close the room after the last connection drops by closing our
        // receiver; the run loop drains whatever is queued and exits.
        if self.privates.is_empty() {
            self.receiver.close();
        }
    }

    #[instrument(skip(self))]
    fn start_game(&mut self, user: &str) -> RoomResult<()> {
        self.room.start_selection(&self.catalog, &mut self.rng)?;
        tracing::info!("Selection phase started");

        // Hands go to each player individually, never on the broadcast.
        for player in self.room.players() {
            if let Some(tx) = self.privates.get(&player.user) {
                let message = Message::HandDealt {
                    cards: player.hand.clone(),
                };
                if tx.try_send(message).is_err() {
                    tracing::warn!(user = %player.user, "Failed to deliver a hand on the private channel");
                }
            }
        }

        self.send_state();
        Ok(())
    }

    #[instrument(skip(self, indices))]
    fn submit_cards(&mut self, user: &str, indices: &[usize]) -> RoomResult<()> {
        self.room.submit_selection(user, indices, &mut self.rng)?;
        if self.room.phase().is_round() {
            tracing::info!("All selections in, match decks compiled");
        }
        self.send_state();
        Ok(())
    }

    #[instrument(skip(self))]
    fn select_giver(&mut self, user: &str, target: &str) -> RoomResult<()> {
        self.room.set_clue_giver(target, Instant::now())?;
        tracing::info!(%target, "Clue giver selected");
        self.send_state();
        Ok(())
    }

    #[instrument(skip(self))]
    fn guess(&mut self, user: &str) -> RoomResult<()> {
        if self.room.guess_correct(Instant::now()) {
            self.send_state();
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn skip(&mut self, user: &str) -> RoomResult<()> {
        if self.room.skip_card(Instant::now())? {
            self.send_state();
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn end_turn(&mut self, user: &str) -> RoomResult<()> {
        self.room.end_turn();
        self.send_state();
        Ok(())
    }
}

/// `sleep_until` over a std `Instant`; pending forever when `None` (the
/// select arm is disabled in that case anyway).
async fn sleep_until_std(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cluecue_lib::net::{Message, RoomRequest};
    use cluecue_lib::{Phase, RoomCode, Team};
    use tokio::sync::mpsc;

    use crate::catalog::Catalog;
    use crate::room::RoomError;

    use super::RoomActor;

    fn setup() -> RoomActor {
        let (_, rx) = mpsc::channel(2);
        RoomActor::new(
            RoomCode::new("TEST").into(),
            "alice",
            rx,
            Arc::new(Catalog::builtin()),
        )
    }

    fn private() -> mpsc::Sender<Message> {
        mpsc::channel(8).0
    }

    fn join_table(actor: &mut RoomActor) -> Vec<mpsc::Receiver<Message>> {
        ["alice", "bob", "cara", "dan"]
            .into_iter()
            .map(|user| {
                let (tx, rx) = mpsc::channel(8);
                actor.join(user.to_owned(), tx).unwrap();
                rx
            })
            .collect()
    }

    #[tokio::test]
    async fn start_game_needs_a_full_table() {
        let mut actor = setup();
        let (tx, _rx) = mpsc::channel(8);
        actor.join("alice".to_owned(), tx).unwrap();

        assert_eq!(
            actor.start_game("alice"),
            Err(RoomError::NotEnoughPlayers { have: 1 })
        );
        assert_eq!(actor.room.phase(), Phase::Lobby);
    }

    #[tokio::test]
    async fn hands_are_delivered_privately() {
        let mut actor = setup();
        let mut receivers = join_table(&mut actor);
        actor.start_game("alice").unwrap();

        for rx in &mut receivers {
            let Ok(Message::HandDealt { cards }) = rx.try_recv() else {
                panic!("player did not receive a private hand");
            };
            assert_eq!(cards.len(), 8);
        }
    }

    #[tokio::test]
    async fn every_mutation_broadcasts_a_snapshot() {
        let mut actor = setup();
        let (tx, _rx) = mpsc::channel(8);
        let mut updates = actor.join("alice".to_owned(), tx).unwrap();

        let Ok(Message::RoomState { state }) = updates.try_recv() else {
            panic!("join did not broadcast the room state");
        };
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.phase, Phase::Lobby);

        let (tx, _rx2) = mpsc::channel(8);
        actor.join("bob".to_owned(), tx).unwrap();
        let Ok(Message::RoomState { state }) = updates.try_recv() else {
            panic!("second join did not broadcast");
        };
        assert_eq!(state.players.len(), 2);
    }

    #[tokio::test]
    async fn full_round_through_the_actor() {
        let mut actor = setup();
        let _receivers = join_table(&mut actor);

        actor.start_game("alice").unwrap();
        for user in ["alice", "bob", "cara", "dan"] {
            actor.submit_cards(user, &[0, 1, 2, 3, 4]).unwrap();
        }
        assert_eq!(actor.room.phase(), Phase::RoundOne);

        let giver = actor
            .room
            .players()
            .iter()
            .find(|p| p.team == Some(Team::One))
            .unwrap()
            .user
            .clone();
        actor.select_giver("alice", &giver).unwrap();
        assert!(actor.room.card_in_play().is_some());

        actor.guess("alice").unwrap();
        assert_eq!(actor.room.scores().get(Team::One), 1);

        // Skip is refused in round one and nothing changes.
        assert_eq!(actor.skip("alice"), Err(RoomError::IllegalAction));
        assert_eq!(actor.room.scores().get(Team::One), 1);

        actor.end_turn("alice").unwrap();
        assert!(actor.room.clue_giver().is_none());
    }

    #[tokio::test]
    async fn disconnect_keeps_the_roster() {
        let mut actor = setup();
        let _receivers = join_table(&mut actor);

        actor.leave("bob");
        assert_eq!(actor.room.players().len(), 4);

        // Bob reconnects and is the same player, not a new one.
        actor.join("bob".to_owned(), private()).unwrap();
        assert_eq!(actor.room.players().len(), 4);
    }

    #[tokio::test]
    async fn rejoining_player_receives_their_hand_again() {
        let mut actor = setup();
        let _receivers = join_table(&mut actor);
        actor.start_game("alice").unwrap();

        actor.leave("bob");
        let (tx, mut rx) = mpsc::channel(8);
        actor.join("bob".to_owned(), tx).unwrap();

        let Ok(Message::HandDealt { cards }) = rx.try_recv() else {
            panic!("rejoining player did not receive their hand");
        };
        assert_eq!(cards.len(), 8);
        assert_eq!(cards, actor.room.hand_of("bob").unwrap());
    }

    #[tokio::test]
    async fn joining_in_the_lobby_delivers_no_hand() {
        let mut actor = setup();
        let (tx, mut rx) = mpsc::channel(8);
        actor.join("alice".to_owned(), tx).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn a_clogged_private_channel_does_not_stop_the_deal() {
        let mut actor = setup();
        let (alice_tx, mut alice_rx) = mpsc::channel(8);
        actor.join("alice".to_owned(), alice_tx).unwrap();

        // Bob's channel is full before the deal; his hand is dropped but
        // everyone else still gets theirs.
        let (bob_tx, _bob_rx) = mpsc::channel(1);
        bob_tx
            .try_send(Message::Room(RoomRequest::Guess))
            .unwrap();
        actor.join("bob".to_owned(), bob_tx).unwrap();
        actor.join("cara".to_owned(), private()).unwrap();
        actor.join("dan".to_owned(), private()).unwrap();

        actor.start_game("alice").unwrap();
        assert!(matches!(
            alice_rx.try_recv(),
            Ok(Message::HandDealt { .. })
        ));
    }

    #[tokio::test]
    async fn room_closes_when_the_last_connection_drops() {
        let (_tx, rx) = mpsc::channel(2);
        let mut actor = RoomActor::new(
            RoomCode::new("TEST").into(),
            "alice",
            rx,
            Arc::new(Catalog::builtin()),
        );
        actor.join("alice".to_owned(), private()).unwrap();
        actor.leave("alice");

        // The receiver was closed, so the run loop exits immediately.
        tokio::time::timeout(std::time::Duration::from_millis(50), actor.run())
            .await
            .expect("room failed to close");
    }
}
