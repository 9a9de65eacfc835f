mod catalog;
mod client;
mod room;
mod state;

use std::sync::Arc;

use catalog::Catalog;
use state::ServerState;
use tokio::net::TcpListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 42817;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    tracing::info!("Server version: {}", crate::VERSION);

    let catalog = match std::env::var("CLUECUE_CARDS") {
        Ok(path) => match Catalog::from_file(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("Failed to load card file: {e:#}");
                return;
            }
        },
        Err(_) => Catalog::builtin(),
    };
    tracing::info!("Card catalog loaded with {} terms", catalog.len());
    let catalog = Arc::new(catalog);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    tracing::info!("Listening on port {port}");

    let state = ServerState::default();
    loop {
        let (socket, _) = listener.accept().await.unwrap();

        tokio::spawn(client::handle_new_connection(
            state.clone(),
            catalog.clone(),
            socket,
        ));
    }
}
