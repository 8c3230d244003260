pub mod ad_watch;
pub mod engine;
pub mod messages;
pub mod options;
pub mod share;

pub use engine::{QuizEngine, QuizEvent};
pub use messages::{ClientToServerMessage, ServerToClientMessage};
