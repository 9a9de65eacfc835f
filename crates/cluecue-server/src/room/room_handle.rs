use cluecue_lib::net::Message;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::room_actor::RoomAction;
use super::{RoomError, RoomResult};

/// Stored in the registry; hands out concrete handles to joining clients
/// without keeping the room alive by itself.
#[derive(Clone, Debug)]
pub struct RoomHandleProvider {
    pub(super) sender: mpsc::WeakSender<RoomAction>,
}

impl RoomHandleProvider {
    pub fn into_handle(self, user: impl Into<String>) -> RoomResult<RoomHandle> {
        Ok(RoomHandle {
            sender: self.sender.upgrade().ok_or(RoomError::HandleInvalid)?,
            user: user.into(),
        })
    }
}

/// One client's connection to a room, bound to their identity. Dropping the
/// handle reports the disconnect to the room.
#[derive(Debug)]
pub struct RoomHandle {
    pub(super) sender: mpsc::Sender<RoomAction>,
    pub(super) user: String,
}

impl RoomHandle {
    pub fn user(&self) -> &str {
        &self.user
    }

    async fn execute<T>(
        &self,
        msg: RoomAction,
        rx: oneshot::Receiver<RoomResult<T>>,
    ) -> RoomResult<T> {
        // A send error is ignored here; rx.await fails right after because
        // the responder was dropped with the actor.
        let _ = self.sender.send(msg).await;
        rx.await.unwrap_or(Err(RoomError::HandleInvalid))
    }

    /// Join (or rejoin) the room, registering `private` as this player's
    /// individual delivery channel. Returns the broadcast stream of public
    /// state updates.
    pub async fn join_room(
        &self,
        private: mpsc::Sender<Message>,
    ) -> RoomResult<broadcast::Receiver<Message>> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Join {
            respond_to: tx,
            user: self.user.clone(),
            private,
        };
        self.execute(msg, rx).await
    }

    pub async fn start_game(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::StartGame {
            respond_to: tx,
            user: self.user.clone(),
        };
        self.execute(msg, rx).await
    }

    pub async fn submit_cards(&self, indices: Vec<usize>) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::SubmitCards {
            respond_to: tx,
            user: self.user.clone(),
            indices,
        };
        self.execute(msg, rx).await
    }

    pub async fn select_giver(&self, target: String) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::SelectGiver {
            respond_to: tx,
            user: self.user.clone(),
            target,
        };
        self.execute(msg, rx).await
    }

    pub async fn guess(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Guess {
            respond_to: tx,
            user: self.user.clone(),
        };
        self.execute(msg, rx).await
    }

    pub async fn skip(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Skip {
            respond_to: tx,
            user: self.user.clone(),
        };
        self.execute(msg, rx).await
    }

    pub async fn end_turn(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::EndTurn {
            respond_to: tx,
            user: self.user.clone(),
        };
        self.execute(msg, rx).await
    }
}

impl Drop for RoomHandle {
    fn drop(&mut self) {
        let tx = self.sender.clone();
        let user = std::mem::take(&mut self.user);
        tokio::spawn(async move {
            if let Err(e) = tx.send(RoomAction::Leave { user }).await {
                tracing::warn!(%e, "Failed to report a disconnect to the room.");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::room::room_actor::RoomAction;
    use crate::room::RoomError;

    use super::{RoomHandle, RoomHandleProvider};

    fn setup() -> (mpsc::Receiver<RoomAction>, RoomHandle) {
        let (tx, rx) = mpsc::channel(2);
        let handle = RoomHandle {
            sender: tx,
            user: "alice".to_owned(),
        };
        (rx, handle)
    }

    #[tokio::test]
    async fn provider_builds_a_handle_for_the_user() {
        let (tx, _rx) = mpsc::channel(2);
        let provider = RoomHandleProvider {
            sender: tx.downgrade(),
        };

        let handle = provider.into_handle("bob").unwrap();
        assert_eq!(handle.user(), "bob");
    }

    #[tokio::test]
    async fn provider_fails_once_the_room_is_gone() {
        let provider = {
            let (tx, _rx) = mpsc::channel::<RoomAction>(2);
            RoomHandleProvider {
                sender: tx.downgrade(),
            }
        };
        assert!(matches!(
            provider.into_handle("bob"),
            Err(RoomError::HandleInvalid)
        ));
    }

    #[tokio::test]
    async fn actions_carry_the_calling_identity() {
        let (mut rx, handle) = setup();
        let actor = tokio::spawn(async move {
            let RoomAction::SubmitCards {
                respond_to: _,
                user,
                indices,
            } = rx.recv().await.unwrap()
            else {
                panic!("incorrect RoomAction produced");
            };
            assert_eq!(user, "alice");
            assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        });
        let _ = handle.submit_cards(vec![0, 1, 2, 3, 4]).await;
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn select_giver_names_the_target() {
        let (mut rx, handle) = setup();
        let actor = tokio::spawn(async move {
            let RoomAction::SelectGiver {
                respond_to: _,
                user,
                target,
            } = rx.recv().await.unwrap()
            else {
                panic!("incorrect RoomAction produced");
            };
            assert_eq!(user, "alice");
            assert_eq!(target, "bob");
        });
        let _ = handle.select_giver("bob".to_owned()).await;
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_handle_reports_a_disconnect() {
        let (mut rx, handle) = setup();
        let actor = tokio::spawn(async move {
            let m = rx.recv().await.unwrap();
            assert!(matches!(m, RoomAction::Leave { user } if user == "alice"));
        });
        drop(handle);
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn closed_room_yields_handle_invalid() {
        let (mut rx, handle) = setup();

        rx.close();
        assert_eq!(handle.start_game().await, Err(RoomError::HandleInvalid));
        drop(rx);
        assert_eq!(handle.guess().await, Err(RoomError::HandleInvalid));
    }
}
