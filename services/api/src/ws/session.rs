//! Manages the WebSocket connection lifecycle for a practice session.
//!
//! Each connection owns one orchestrator and one speech controller for its
//! lifetime; nothing about the session survives the socket.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{
    models::{CatalogResponse, DifficultyDto},
    state::AppState,
};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use salescoach_core::{DifficultyLevel, PracticeOrchestrator, SpeechController};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "practice_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New practice client connected.");

    let (socket_tx, socket_rx) = socket.split();
    if let Err(e) = run_practice_session(state, socket_tx, socket_rx).await {
        error!(error = ?e, "Practice session terminated with error.");
    }
    info!("Practice session finished.");
}

/// The main event loop for an active connection.
///
/// Pushes the catalog on connect, then reacts to client messages and
/// speech-recognition events until the socket closes.
async fn run_practice_session(
    state: Arc<AppState>,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let mut orchestrator = PracticeOrchestrator::new(state.backend.clone());
    let mut speech = SpeechController::new(state.speech.clone());

    let catalog = orchestrator.load_catalog().await;
    let scenarios = CatalogResponse::from(catalog).0;
    send_msg(
        &mut socket_tx,
        ServerMessage::Catalog {
            scenarios,
            difficulties: DifficultyLevel::presets()
                .iter()
                .map(DifficultyDto::from)
                .collect(),
            voice_available: speech.is_available(),
        },
    )
    .await?;

    loop {
        tokio::select! {
            maybe_msg = socket_rx.next() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                handle_client_message(msg, &mut orchestrator, &mut speech, &mut socket_tx).await?;
                            }
                            Err(e) => {
                                debug!(error = %e, "Ignoring malformed client message");
                                send_msg(&mut socket_tx, ServerMessage::Error {
                                    message: "Malformed message".to_string(),
                                }).await?;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                    None => break,
                }
            },
            // Speech updates carry the full transcript-so-far; the client
            // replaces its draft rather than appending.
            Some(text) = speech.next_update(), if speech.is_listening() => {
                send_msg(&mut socket_tx, ServerMessage::TranscriptionUpdate {
                    text,
                    is_final: false,
                }).await?;
            },
        }
    }

    // The connection owns the session; end it on disconnect.
    orchestrator.end_session().await;
    info!("WebSocket connection closed and practice session terminated.");
    Ok(())
}

async fn handle_client_message(
    msg: ClientMessage,
    orchestrator: &mut PracticeOrchestrator,
    speech: &mut SpeechController,
    socket_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<()> {
    match msg {
        ClientMessage::ChooseScenario { id } => {
            match orchestrator.scenario_by_id(&id) {
                Some(record) => {
                    orchestrator.choose_scenario(record);
                }
                None => warn!(scenario = %id, "Client chose a scenario not present in the catalog"),
            }
            send_selection(orchestrator, socket_tx).await
        }
        ClientMessage::ChooseDifficulty { difficulty } => {
            orchestrator.choose_difficulty(difficulty);
            send_selection(orchestrator, socket_tx).await
        }
        ClientMessage::StartSession => {
            if orchestrator.start_session().await {
                if let Some(session) = orchestrator.session() {
                    send_msg(
                        socket_tx,
                        ServerMessage::SessionStarted {
                            session_id: session.id.to_string(),
                            local: session.id.is_local(),
                            history: orchestrator.history().to_vec(),
                        },
                    )
                    .await?;
                }
            } else {
                debug!("Ignoring start request; selection incomplete or start in flight");
            }
            Ok(())
        }
        ClientMessage::UserMessage { text } => {
            if let Some(turn) = orchestrator.send_message(&text).await {
                send_msg(
                    socket_tx,
                    ServerMessage::AssistantReply {
                        text: turn.message.content,
                        feedback: turn.feedback,
                        metrics: turn.metrics,
                        degraded: turn.degraded,
                    },
                )
                .await?;
            }
            Ok(())
        }
        ClientMessage::SetVoiceEnabled { enabled } => {
            if !speech.is_available() {
                debug!("Ignoring voice toggle; no speech facility on this platform");
                return Ok(());
            }
            if enabled != speech.is_listening() {
                let listening = speech.toggle();
                if !listening {
                    let final_text = speech.take_transcript();
                    if !final_text.is_empty() {
                        send_msg(
                            socket_tx,
                            ServerMessage::TranscriptionUpdate {
                                text: final_text,
                                is_final: true,
                            },
                        )
                        .await?;
                    }
                }
            }
            send_msg(
                socket_tx,
                ServerMessage::ListeningState {
                    listening: speech.is_listening(),
                },
            )
            .await
        }
        ClientMessage::EndSession => {
            orchestrator.end_session().await;
            send_msg(socket_tx, ServerMessage::SessionEnded).await
        }
    }
}

async fn send_selection(
    orchestrator: &PracticeOrchestrator,
    socket_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<()> {
    send_msg(
        socket_tx,
        ServerMessage::SelectionUpdate {
            scenario_id: orchestrator.selected_scenario().map(|s| s.id.clone()),
            difficulty_id: orchestrator.selected_difficulty().map(|d| d.id.clone()),
            can_start: orchestrator.can_start(),
        },
    )
    .await
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
