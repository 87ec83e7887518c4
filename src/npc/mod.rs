//! # NPC Response Generator
//!
//! Replies from the BBS operators (glyphis, rain, jaxkando, uncle-am) to mail
//! the player sends them.
//!
//! - [`profile`]: static character profiles and the [`Roster`]
//! - [`classifier`]: ordered trigger detection over the outgoing text
//! - [`responder`]: trait-weighted, seedable reply composition

pub mod classifier;
pub mod profile;
pub mod responder;

pub use classifier::{classify, Area, TriggerKind};
pub use profile::{CharacterProfile, Roster, Trait};
pub use responder::{NpcResponder, Outgoing, Reply};
