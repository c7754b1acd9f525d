//! Defines the WebSocket message protocol between the client and the gateway.

use crate::models::{DifficultyDto, ScenarioDto};
use salescoach_core::{DifficultyLevel, Message};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Select a scenario from the catalog by id.
    ChooseScenario { id: String },
    /// Select a difficulty. Accepts a bare tag (`"beginner"`) or a full
    /// level record.
    ChooseDifficulty { difficulty: DifficultyLevel },
    /// Start a session for the current selection.
    StartSession,
    /// A text utterance from the user to the simulated counterpart.
    UserMessage { text: String },
    /// Toggles push-to-talk voice input.
    SetVoiceEnabled { enabled: bool },
    /// End the active session and return to selection.
    EndSession,
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The scenario directory and difficulty levels, sent once on connect.
    Catalog {
        scenarios: BTreeMap<String, Vec<ScenarioDto>>,
        difficulties: Vec<DifficultyDto>,
        /// Whether voice controls should be offered at all.
        voice_available: bool,
    },
    /// Acknowledges the current selection and whether a start is possible.
    SelectionUpdate {
        scenario_id: Option<String>,
        difficulty_id: Option<String>,
        can_start: bool,
    },
    /// A session is active; history holds the welcome message.
    SessionStarted {
        session_id: String,
        /// True when the session is a local fallback rather than a
        /// backend-acknowledged one.
        local: bool,
        history: Vec<Message>,
    },
    /// One assistant reply, with any coaching annotations.
    AssistantReply {
        text: String,
        feedback: Option<String>,
        metrics: Option<BTreeMap<String, f64>>,
        degraded: bool,
    },
    /// An update on the user's speech-to-text transcription.
    TranscriptionUpdate { text: String, is_final: bool },
    /// The current push-to-talk state.
    ListeningState { listening: bool },
    /// The session was ended; the client is back in selection.
    SessionEnded,
    /// Reports an error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parses_scenario_choice() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"choose_scenario","id":"cold-1"}"#).unwrap();
        match msg {
            ClientMessage::ChooseScenario { id } => assert_eq!(id, "cold-1"),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_message_accepts_difficulty_tag_or_record() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"choose_difficulty","difficulty":"beginner"}"#)
                .unwrap();
        match msg {
            ClientMessage::ChooseDifficulty { difficulty } => assert_eq!(difficulty.id, "beginner"),
            other => panic!("Unexpected message: {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"choose_difficulty","difficulty":{"id":"advanced","name":"Advanced"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::ChooseDifficulty { difficulty } => assert_eq!(difficulty.id, "advanced"),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_message_parses_bare_variants() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"start_session"}"#).unwrap(),
            ClientMessage::StartSession
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"end_session"}"#).unwrap(),
            ClientMessage::EndSession
        ));
    }

    #[test]
    fn test_server_message_tags_are_snake_case() {
        let json = serde_json::to_string(&ServerMessage::SessionEnded).unwrap();
        assert_eq!(json, r#"{"type":"session_ended"}"#);

        let json = serde_json::to_string(&ServerMessage::TranscriptionUpdate {
            text: "hello".to_string(),
            is_final: false,
        })
        .unwrap();
        assert!(json.contains(r#""type":"transcription_update""#));
        assert!(json.contains(r#""is_final":false"#));
    }

    #[test]
    fn test_session_started_serializes_history() {
        let msg = ServerMessage::SessionStarted {
            session_id: "local-1".to_string(),
            local: true,
            history: vec![Message::assistant("Welcome!")],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""session_id":"local-1""#));
        assert!(json.contains(r#""role":"assistant""#));
    }
}
