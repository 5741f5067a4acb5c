use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use uuid::Uuid;
use warp::ws::WebSocket;
use warp::Filter;

use crate::directory::{self, Directory};
use crate::message::ClientEvent;
use crate::registry::{RoomRegistry, OUTBOUND_QUEUE_CAPACITY};
use crate::session::Session;

/// The room-broadcast service. Cheap to clone; all state lives in the
/// registry.
#[derive(Clone)]
pub struct Server {
    registry: RoomRegistry,
    queue_capacity: usize,
}

impl Default for Server {
    fn default() -> Self {
        Server::new()
    }
}

impl Server {
    #[must_use]
    pub fn new() -> Self {
        Server::with_queue_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    /// Service with a non-default outbound queue capacity per connection.
    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Server {
            registry: RoomRegistry::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Runs one connection to completion: a forwarder task drains the
    /// session's bounded outbound queue into the socket, while this task
    /// reads frames and feeds them to the session state machine. The read
    /// loop also watches the session's shutdown trigger so that an eviction
    /// (queue overflow) or a completed leave tears the transport down
    /// instead of leaving it half-open. Returning drops both halves.
    pub async fn handle_connection(&self, ws: WebSocket) {
        let conn_id = Uuid::new_v4().to_string();
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (queue, mut outbound) = mpsc::channel(self.queue_capacity);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!("{conn_id}: connected");

        let forwarder = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = ws_tx.send(frame).await {
                    error!("websocket send failed: {e}");
                    break;
                }
            }
        });

        let mut session = Session::new(conn_id.clone(), self.registry.clone(), queue, shutdown_tx);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("{conn_id}: registry dropped this subscriber, closing transport");
                    break;
                }
                incoming = ws_rx.next() => {
                    let Some(result) = incoming else {
                        break;
                    };
                    match result {
                        Ok(frame) => {
                            let Ok(text) = frame.to_str() else {
                                continue;
                            };
                            match serde_json::from_str::<ClientEvent>(text) {
                                Ok(event) => session.handle(event).await,
                                Err(e) => warn!("{conn_id}: unparseable event: {e}"),
                            }
                        }
                        Err(e) => {
                            error!("{conn_id}: websocket error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        session.disconnected().await;
        forwarder.abort();
        info!("{conn_id}: disconnected");
    }
}

/// Full route table: websocket upgrade, directory REST, static assets.
pub fn routes(
    directory: Directory,
    server: Server,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let ws = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |upgrade: warp::ws::Ws| {
            let server = server.clone();
            upgrade.on_upgrade(move |socket| async move {
                server.handle_connection(socket).await;
            })
        });

    let static_files = warp::fs::dir("public");

    ws.or(directory::routes(directory))
        .or(static_files)
        .with(warp::cors().allow_any_origin())
}
