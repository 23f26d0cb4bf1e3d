//! Domain model for the foundry engine: role enumerations, artifact types,
//! and the engine error taxonomy.

pub mod draft;
pub mod errors;
pub mod types;

pub use draft::{
    Critique, CritiqueScores, DraftVersion, Message, MessageAuthor, NotePriority, ReviewMetadata,
    ScoreKind, ScratchpadEntry,
};
pub use errors::EngineError;
pub use types::{Intent, Role, RoleId, SessionId, SessionKey, TimestampUtc};
