//! Live team-duel match engine: two teams race through a shared question
//! sequence, each player on an independent countdown, against a shared
//! real-time document store.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod questions;
pub mod service;
pub mod store;

pub use client::{ClientController, IdentityProvider, StaticIdentity};
pub use config::EngineConfig;
pub use error::ServiceError;
pub use model::{AnswerLetter, Identity, Match, Player, Question, Team, TeamSide, Winner};
pub use questions::{QuestionProvider, QuestionSource};
pub use service::MatchService;
pub use store::{MatchStore, MemoryStore};
