//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{ErrorCode, Participant, PusherChannel, RoomError, RoomId, RoomSettings},
    infrastructure::dto::websocket::{ClientMessage, RoomSnapshotDto, ServerMessage},
    ui::state::AppState,
};

/// Query parameters for WebSocket connection
///
/// The identity is verified upstream; the coordinator only validates its shape.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
    pub display_name: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let display_name = query
        .display_name
        .unwrap_or_else(|| query.user_id.clone());

    // Create a channel for this connection to receive events
    let (tx, rx) = mpsc::unbounded_channel();

    match state
        .connect_participant_usecase
        .execute(query.user_id.clone(), display_name, tx.clone())
        .await
    {
        Ok(participant) => {
            tracing::info!(
                "'{}' connected as {}",
                participant.id,
                participant.connection_id
            );
            Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, participant, tx, rx)))
        }
        Err(e) => {
            tracing::warn!("Rejecting connection of '{}': {}", query.user_id, e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// # Arguments
///
/// * `rx` - Channel receiver for serialized server messages
/// * `sender` - WebSocket sink to send messages to this client
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// One WebSocket connection and the room it currently plays in
struct Session {
    state: Arc<AppState>,
    participant: Participant,
    room_id: Option<RoomId>,
    /// Replies go to this connection only, even after it has been replaced in the registry
    reply: PusherChannel,
}

impl Session {
    fn send(&self, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => {
                let _ = self.reply.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize reply: {}", e),
        }
    }

    async fn on_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Malformed message from '{}': {}", self.participant.id, e);
                self.send(&ServerMessage::Error {
                    code: ErrorCode::MalformedRequest,
                    message: e.to_string(),
                });
                return;
            }
        };

        match self.dispatch(message).await {
            Ok(Some(reply)) => self.send(&reply),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("Request of '{}' rejected: {}", self.participant.id, e);
                self.send(&ServerMessage::from(&e));
            }
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<Option<ServerMessage>, RoomError> {
        let store = self.state.room_store.clone();
        match message {
            ClientMessage::CreateRoom { name, settings } => {
                let settings = RoomSettings::try_from(settings)?;
                self.leave_current_room().await;
                let snapshot = store
                    .create_room(self.participant.clone(), name, settings)
                    .await?;
                self.room_id = Some(snapshot.room_id.clone());
                Ok(Some(ServerMessage::RoomCreated {
                    room: RoomSnapshotDto::from(&snapshot),
                }))
            }
            ClientMessage::JoinRoom { room_id } => {
                let room_id = RoomId::new(room_id).map_err(|_| RoomError::RoomNotFound)?;
                if self.room_id.as_ref() != Some(&room_id) {
                    self.leave_current_room().await;
                }
                let snapshot = store.join_room(&room_id, self.participant.clone()).await?;
                self.room_id = Some(room_id);
                Ok(Some(ServerMessage::RoomJoined {
                    room: RoomSnapshotDto::from(&snapshot),
                }))
            }
            ClientMessage::LeaveRoom => {
                let room_id = self.room_id.take().ok_or(RoomError::NotAMember)?;
                store
                    .leave_room(&room_id, self.participant.id.clone())
                    .await?;
                Ok(Some(ServerMessage::RoomLeft {
                    room_id: room_id.as_str().to_string(),
                }))
            }
            ClientMessage::StartQuiz => {
                let room_id = self.room_id.as_ref().ok_or(RoomError::NotAMember)?;
                store
                    .start_quiz(room_id, self.participant.id.clone())
                    .await?;
                Ok(None)
            }
            ClientMessage::SubmitAnswer {
                question_index,
                chosen_option,
            } => {
                let room_id = self.room_id.as_ref().ok_or(RoomError::NotAMember)?;
                // The room pushes `answerAccepted` itself, ahead of the resolution
                store
                    .submit_answer(
                        room_id,
                        self.participant.id.clone(),
                        question_index,
                        chosen_option,
                    )
                    .await?;
                Ok(None)
            }
        }
    }

    async fn leave_current_room(&mut self) {
        if let Some(room_id) = self.room_id.take() {
            let result = self
                .state
                .room_store
                .leave_room(&room_id, self.participant.id.clone())
                .await;
            if let Err(e) = result {
                tracing::debug!("Leaving room {} before switching: {}", room_id, e);
            }
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    participant: Participant,
    reply: PusherChannel,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();

    // Spawn a task to push events to this client
    let mut send_task = pusher_loop(rx, sender);

    let mut session = Session {
        state: state.clone(),
        participant,
        room_id: None,
        reply,
    };

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => session.on_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("'{}' closed the connection", session.participant.id);
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error: {}", e);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                Some(Ok(_)) => {}
            },
        }
    }
    send_task.abort();

    let live = state
        .disconnect_participant_usecase
        .execute(&session.participant, session.room_id.as_ref())
        .await;
    if live {
        tracing::info!("'{}' disconnected", session.participant.id);
    } else {
        tracing::debug!(
            "Replaced connection {} closed",
            session.participant.connection_id
        );
    }
}
