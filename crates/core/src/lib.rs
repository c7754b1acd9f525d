pub mod backend;
pub mod catalog;
pub mod orchestrator;
pub mod session;
pub mod speech;

pub use backend::{CounterpartReply, PracticeBackend, SessionGreeting};
pub use catalog::{CategorizedCatalog, DifficultyLevel, ScenarioRecord};
pub use orchestrator::{AssistantTurn, PracticeOrchestrator};
pub use session::{Message, MessageRole, Session, SessionId, SessionStatus};
pub use speech::{SpeechCapture, SpeechController, SpeechEvent};
