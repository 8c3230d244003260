use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::engine::QuizEvent;
use crate::player::PlaybackState;

/// Messages sent from the browser client to the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "messageType", content = "payload")]
pub enum ClientToServerMessage {
    /// Sent immediately after the WebSocket connects to associate with a
    /// quiz session.
    ConnectToSession { session_id: Uuid },
    /// Start (or restart) the quiz: triggers the question bank fetch.
    StartQuiz,
    /// The user picked an option on the current question.
    SelectOption { index: usize },
    /// Advance past the current question's feedback.
    NextQuestion,
    /// Return to the start screen, discarding the run.
    BackToStart,
    /// Periodic raw status relay from the embedded video player. Feeds the
    /// ad-detection sampler; never answered directly.
    PlayerStatus {
        state: PlaybackState,
        position_seconds: f64,
    },
    /// Explicitly leave the session and close the connection.
    LeaveSession,
}

/// Messages sent from the server to the browser client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "messageType", content = "payload")]
pub enum ServerToClientMessage {
    /// A render-intent event from the quiz session.
    SessionEvent { event: QuizEvent },
    /// A general error not tied to quiz logic (bad message format, unknown
    /// session, ...).
    SystemError { message: String },
}

impl ServerToClientMessage {
    pub fn from_event(event: QuizEvent) -> Self {
        ServerToClientMessage::SessionEvent { event }
    }

    pub fn to_ws_text(&self) -> Result<axum::extract::ws::Message, serde_json::Error> {
        serde_json::to_string(self)
            .map(|json_string| axum::extract::ws::Message::Text(json_string.into()))
    }
}

pub fn client_message_from_ws_text(text: &str) -> Result<ClientToServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
