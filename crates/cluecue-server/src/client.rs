use std::sync::Arc;

use cluecue_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use cluecue_lib::net::{Message, ProtocolError, RoomRequest};
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::room::room_handle::RoomHandle;
use crate::room::RoomError;
use crate::state::ServerState;

/// Take a socket for a newly connected client and begin serving it.
pub async fn handle_new_connection(state: ServerState, catalog: Arc<Catalog>, socket: TcpStream) {
    let client = match ConnectingClient::new(state, catalog, socket).handshake().await {
        Some(c) => c,
        None => return,
    };
    client.run().await;
}

/// A client that connected but has not yet entered a room.
struct ConnectingClient {
    state: ServerState,
    catalog: Arc<Catalog>,
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

/// Everything `try_handshake` produces on success; turned into a
/// [`JoinedClient`] by the caller, which still owns the connection for
/// error reporting.
struct JoinedParts {
    handle: RoomHandle,
    updates: broadcast::Receiver<Message>,
    local_tx: mpsc::Sender<Message>,
    local_rx: mpsc::Receiver<Message>,
}

impl ConnectingClient {
    fn new(state: ServerState, catalog: Arc<Catalog>, socket: TcpStream) -> Self {
        let (conn_tx, conn_rx) = connection::from_socket(socket);
        Self {
            state,
            catalog,
            conn_tx,
            conn_rx,
        }
    }

    async fn handshake(mut self) -> Option<JoinedClient> {
        match self.try_handshake().await {
            Ok(parts) => Some(JoinedClient::from_connecting(self, parts)),
            Err(error) => {
                tracing::error!(%error, "Handshake failed");
                let _ = self.conn_tx.write_frame(&Message::Error { error }).await;
                None
            }
        }
    }

    async fn try_handshake(&mut self) -> Result<JoinedParts, ProtocolError> {
        let version = match self.read_frame().await? {
            Message::Version { version } => version,
            _ => return Err(ProtocolError::InvalidMessage),
        };
        if version != crate::VERSION {
            return Err(ProtocolError::VersionMismatch(
                version,
                crate::VERSION.to_owned(),
            ));
        }

        let (code, handle) = match self.read_frame().await? {
            Message::RoomHost { user, code } => {
                self.state.open_room(&user, code, self.catalog.clone())?
            }
            Message::RoomJoin { code, user } => {
                let handle = self.state.handle_provider(&code)?.into_handle(user)?;
                (code, handle)
            }
            _ => return Err(ProtocolError::InvalidMessage),
        };

        // The private channel doubles as this player's individual delivery
        // path (dealt hands, caller-only errors).
        let (local_tx, local_rx) = mpsc::channel(64);
        let updates = handle
            .join_room(local_tx.clone())
            .await
            .map_err(ProtocolError::from)?;

        self.conn_tx
            .write_frame(&Message::RoomAccept {
                code,
                user: handle.user().to_owned(),
            })
            .await
            .map_err(|_| ProtocolError::Disconnected)?;
        tracing::info!(user = handle.user(), "Client joined a room");

        Ok(JoinedParts {
            handle,
            updates,
            local_tx,
            local_rx,
        })
    }

    async fn read_frame(&mut self) -> Result<Message, ProtocolError> {
        match self.conn_rx.read_frame().await {
            Ok(Some(m)) => Ok(m),
            Ok(None) | Err(_) => Err(ProtocolError::Disconnected),
        }
    }
}

/// Forward room broadcasts and caller-only messages to the socket.
async fn send_task(
    mut conn_tx: ConnectionTx,
    mut updates: broadcast::Receiver<Message>,
    mut local_rx: mpsc::Receiver<Message>,
) {
    loop {
        let m = select! {
            Ok(m) = updates.recv() => m,
            Some(m) = local_rx.recv() => m,
            else => return,
        };

        if conn_tx.write_frame(&m).await.is_err() {
            return;
        }
    }
}

/// A client that entered a room and now only issues room requests.
struct JoinedClient {
    conn_rx: ConnectionRx,
    local_tx: mpsc::Sender<Message>,
    task_handle: JoinHandle<()>,
    handle: RoomHandle,
}

impl JoinedClient {
    fn from_connecting(client: ConnectingClient, parts: JoinedParts) -> Self {
        let task_handle = tokio::spawn(send_task(client.conn_tx, parts.updates, parts.local_rx));

        Self {
            conn_rx: client.conn_rx,
            local_tx: parts.local_tx,
            task_handle,
            handle: parts.handle,
        }
    }

    /// Takes ownership of self to guarantee the client is dropped when its
    /// message loop ends.
    #[instrument(skip_all, fields(user = %self.handle.user()))]
    async fn run(mut self) {
        loop {
            let request = match self.conn_rx.read_frame().await {
                Ok(Some(Message::Room(req))) => req,
                Ok(Some(m)) => {
                    tracing::error!("Invalid message received: {m:?}");
                    let _ = self
                        .local_tx
                        .send(Message::Error {
                            error: ProtocolError::InvalidMessage,
                        })
                        .await;
                    continue;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading message, closing connection: {e:?}");
                    break;
                }
            };

            tracing::debug!("Received request: {request:?}");
            if let Err(e) = self.process(request).await {
                tracing::warn!("Request rejected: {e}");
                let _ = self
                    .local_tx
                    .send(Message::Error { error: e.into() })
                    .await;
            }
        }
        tracing::info!("Client disconnected");
    }

    async fn process(&mut self, request: RoomRequest) -> Result<(), RoomError> {
        match request {
            RoomRequest::StartGame => self.handle.start_game().await,
            RoomRequest::SubmitCards { indices } => self.handle.submit_cards(indices).await,
            RoomRequest::SelectGiver { user } => self.handle.select_giver(user).await,
            RoomRequest::Guess => self.handle.guess().await,
            RoomRequest::Skip => self.handle.skip().await,
            RoomRequest::EndTurn => self.handle.end_turn().await,
        }
    }
}

impl Drop for JoinedClient {
    fn drop(&mut self) {
        // Dropping self.handle reports the disconnect to the room.
        self.task_handle.abort();
    }
}
