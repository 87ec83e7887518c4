//! # glyphbbs - Token-Gated Mail Progression for the GLYPHIS_IO BBS
//!
//! glyphbbs drives the narrative of a retro bulletin board: the player earns
//! progression tokens, tokens unlock board modules and release scripted mail,
//! and the board's operators answer mail the player sends them.
//!
//! ## Features
//!
//! - **Token Store**: Normalized, append-only progression tokens persisted as JSON.
//! - **Email Database**: Inbox definitions and outbox templates loaded from JSON source documents, with a per-player delivered-ID record.
//! - **Trigger Evaluator**: Periodic and event-driven scans that deliver each eligible message exactly once, in source order.
//! - **NPC Replies**: Trait-weighted, seedable reply composition for glyphis, rain, jaxkando and uncle-am.
//! - **Board Gating**: Main-menu modules locked behind single tokens.
//! - **Crash-Safe State**: Locked, fsynced, rename-based JSON writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glyphbbs::config::Config;
//! use glyphbbs::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut session = Session::load(config)?;
//!
//!     // First pass of a session delivers on-start mail
//!     for email in session.evaluate()? {
//!         println!("New mail from {}: {}", email.sender, email.subject);
//!     }
//!     session.grant_token("PSEM", Some("mini-game cleared"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - Session controller routing player actions
//! - [`tokens`] - Token normalization, store and catalogue
//! - [`email`] - Email records, source loading, database and mailbox
//! - [`trigger`] - Delivery scheduling
//! - [`npc`] - Character profiles, trigger classification and replies
//! - [`gating`] - Board module lock rules
//! - [`context`] - Per-player progression context
//! - [`storage`] - State directory and atomic JSON persistence
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Handle and compose-field validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Session      │ ← Player actions, routing
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌────────────┐
//! │Trigger │ │    NPC     │ ← Delivery scans / replies
//! │Evaluatr│ │ Responder  │
//! └────────┘ └────────────┘
//!     │         │
//! ┌─────────────────┐
//! │ Progression     │ ← Tokens, delivered IDs, mailbox, player
//! │ Context         │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Storage       │ ← Atomic JSON files
//! └─────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod email;
pub mod errors;
pub mod gating;
pub mod logutil;
pub mod npc;
pub mod session;
pub mod storage;
pub mod tokens;
pub mod trigger;
pub mod validation;
