//! # Session Controller
//!
//! Owns the [`ProgressionContext`] for one play session and routes player
//! actions through the components that need it:
//!
//! ```text
//! player action ──► TokenStore ──► TriggerEvaluator ──► Mailbox (inbox)
//!      │                                   ▲
//!      └── send_email ──► NpcResponder ────┘ (replies bypass the pending queue)
//! ```
//!
//! Every token grant, from any source, is followed by an immediate evaluation
//! pass. Failures inside one send (an NPC address with no profile) are
//! contained to that send and surface as a bounce in the inbox.

use crate::config::Config;
use crate::context::ProgressionContext;
use crate::email::{narrative_stamp, Email, EmailDatabase, InboxEntry, Substitutions};
use crate::errors::{ProgressionError, Result};
use crate::gating::{self, BoardModule};
use crate::logutil::{escape_log, escape_log_capped};
use crate::npc::{NpcResponder, Outgoing, Roster};
use crate::storage::StateDir;
use crate::tokens::{catalogue, Token, TokenSnapshot};
use crate::trigger::TriggerEvaluator;
use crate::validation::{sanitize_compose, MAX_BODY_CHARS, MAX_SUBJECT_CHARS};
use chrono::Utc;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;
use uuid::Uuid;

static USERNAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)username:\s*(\S+)").ok());

/// Sender used for undeliverable-mail notices.
pub const MAILER_DAEMON: &str = "MAILER-DAEMON";

/// Where an outgoing message ended up.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// An NPC answered; the reply is already in the inbox.
    Replied(Email),
    /// Registration mail to the sysop; no reply is generated.
    Onboarded,
    /// Recipient outside the NPC network; held in the outbox.
    Queued(Email),
    /// NPC-domain address with no character; a bounce is in the inbox.
    Bounced(Email),
    /// The mail gate token is not held; nothing was sent.
    Locked,
}

/// Result of a send, including mail delivered by tokens it granted.
#[derive(Debug, Clone)]
pub struct SendReport {
    pub outcome: SendOutcome,
    pub delivered: Vec<Email>,
}

/// Result of opening an inbox message.
#[derive(Debug, Clone)]
pub struct ReadReport {
    pub email: Email,
    /// Tokens newly acquired by this read (empty after the first read).
    pub granted: Vec<Token>,
    pub delivered: Vec<Email>,
}

/// One player's session over a loaded email database.
pub struct Session {
    config: Config,
    db: EmailDatabase,
    ctx: ProgressionContext,
    evaluator: TriggerEvaluator,
    responder: NpcResponder,
    gate: Option<Token>,
}

impl Session {
    /// Load the source documents named in `config` and reopen persisted state.
    ///
    /// Malformed source data fails here, before any state is touched.
    pub fn load(config: Config) -> Result<Self> {
        let db = EmailDatabase::load_files(config.inbox_path(), config.outbox_path(), Utc::now())?;
        Self::open(config, db)
    }

    /// Open a session over `db` with state persisted under `config.storage.data_dir`.
    pub fn open(config: Config, db: EmailDatabase) -> Result<Self> {
        let dir = StateDir::open(config.data_dir())?;
        let ctx = ProgressionContext::open(&dir, &config.bbs.default_handle)?;
        Self::with_context(config, db, ctx)
    }

    /// A session that never touches disk.
    pub fn ephemeral(config: Config, db: EmailDatabase) -> Result<Self> {
        let ctx = ProgressionContext::in_memory_with_handle(&config.bbs.default_handle);
        Self::with_context(config, db, ctx)
    }

    fn with_context(config: Config, db: EmailDatabase, ctx: ProgressionContext) -> Result<Self> {
        let gate = config.mail_gate()?;
        let evaluator = TriggerEvaluator::new(config.check_interval()).with_gate(gate.clone());
        let responder = NpcResponder::new(Roster::builtin(), config.npc.seed);
        info!(
            "Session opened for {} ({} tokens, {} delivered)",
            ctx.player().display_handle(),
            ctx.tokens().len(),
            ctx.delivered().len()
        );
        Ok(Self {
            config,
            db,
            ctx,
            evaluator,
            responder,
            gate,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &EmailDatabase {
        &self.db
    }

    pub fn context(&self) -> &ProgressionContext {
        &self.ctx
    }

    pub fn responder(&self) -> &NpcResponder {
        &self.responder
    }

    pub fn handle(&self) -> &str {
        self.ctx.player().display_handle()
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        self.ctx.snapshot()
    }

    /// Live delivered inbox.
    pub fn inbox(&self) -> &[Email] {
        self.ctx.mailbox().inbox()
    }

    /// Inbox definitions not yet delivered.
    pub fn pending_inbox(&self) -> Vec<&InboxEntry> {
        self.db.pending_inbox(self.ctx.delivered())
    }

    /// Board modules with their lock state.
    pub fn modules(&self) -> Vec<(BoardModule, bool)> {
        gating::menu(&self.ctx.snapshot())
    }

    /// Hint for `module`, or `None` if it is open.
    pub fn locked_hint(&self, module: BoardModule) -> Option<String> {
        if module.is_unlocked(&self.ctx.snapshot()) {
            None
        } else {
            Some(gating::lock_hint(module, self.handle()))
        }
    }

    /// Run an evaluation pass now. The first call of a session delivers on-start mail.
    pub fn evaluate(&mut self) -> Result<Vec<Email>> {
        self.evaluator.evaluate(&self.db, &mut self.ctx, Utc::now())
    }

    /// Scheduling tick; evaluates only when the configured interval has elapsed.
    pub fn tick(&mut self) -> Result<Vec<Email>> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, at: Instant) -> Result<Vec<Email>> {
        self.evaluator.tick(&self.db, &mut self.ctx, at, Utc::now())
    }

    /// Grant a token (mini-game completion, narrative milestone) and re-scan.
    pub fn grant_token(&mut self, raw: &str, reason: Option<&str>) -> Result<Vec<Email>> {
        if self.ctx.tokens.add_with_reason(raw, reason)? {
            self.evaluate()
        } else {
            Ok(Vec::new())
        }
    }

    /// Register the player handle and grant `USERNAME_SET`.
    pub fn set_username(&mut self, raw: &str) -> Result<Vec<Email>> {
        let handle = self.ctx.player.set_handle(raw)?;
        info!("Username set to '{}'", handle);
        self.grant_token(catalogue::USERNAME_SET, Some("username registered via email"))
    }

    /// Deliver a manual inbox entry now.
    pub fn deliver_by_id(&mut self, id: &str, extra: &Substitutions) -> Result<Option<Email>> {
        self.db.deliver_by_id(&mut self.ctx, id, extra, Utc::now())
    }

    /// Send a message from the player and route it.
    pub fn send_email(&mut self, to: &str, subject: &str, body: &str) -> Result<SendReport> {
        let to = to.trim();
        let mut delivered = Vec::new();

        if let Some(gate) = &self.gate {
            if !self.ctx.tokens().has(gate.as_str()) {
                debug!("Send to {} refused: mail gate {} not held", to, gate);
                return Ok(SendReport {
                    outcome: SendOutcome::Locked,
                    delivered,
                });
            }
        }

        let subject = sanitize_compose(subject, MAX_SUBJECT_CHARS);
        let body = sanitize_compose(body, MAX_BODY_CHARS);
        let subject = if subject.is_empty() { "(no subject)".to_string() } else { subject };
        let body = if body.is_empty() { "(empty message)".to_string() } else { body };

        let onboarding = match registration_handle(&body) {
            Some(raw) => match self.set_username(&raw) {
                Ok(mut got) => {
                    delivered.append(&mut got);
                    true
                }
                Err(ProgressionError::InvalidHandle(reason)) => {
                    warn!("Ignoring registration '{}': {}", escape_log(&raw), reason);
                    false
                }
                Err(e) => return Err(e),
            },
            None => false,
        };

        let now = Utc::now();
        let sent = Email {
            id: format!("sent-{}", Uuid::new_v4()),
            sender: self.handle().to_string(),
            recipient: to.to_string(),
            subject: subject.clone(),
            body: body.lines().map(str::to_string).collect(),
            timestamp: narrative_stamp(now),
            read: true,
        };

        let is_npc = self.responder.knows(to) || self.config.is_npc_domain(to);
        if !is_npc {
            self.ctx.mailbox.queue_outbox(sent.clone())?;
            info!("Email queued for {} | Subject: '{}'", to, escape_log(&subject));
            return Ok(SendReport {
                outcome: SendOutcome::Queued(sent),
                delivered,
            });
        }

        self.ctx.mailbox.push_sent(sent)?;
        info!("Email sent to {} | Subject: '{}'", to, escape_log(&subject));
        debug!("Body: {}", escape_log_capped(&body, MAX_BODY_CHARS));

        if onboarding && self.config.is_sysop(to) {
            return Ok(SendReport {
                outcome: SendOutcome::Onboarded,
                delivered,
            });
        }

        if let Some(grant) = self.responder.roster().get(to).and_then(|p| p.volunteer.clone()) {
            if grant.matches(&format!("{} {}", subject, body)) {
                let reason = format!("volunteered via mail to {}", to);
                delivered.append(&mut self.grant_token(grant.token, Some(&reason))?);
            }
        }

        let snapshot = self.ctx.snapshot();
        let handle = self.handle().to_string();
        let msg = Outgoing {
            to,
            subject: &subject,
            body: &body,
        };
        match self.responder.respond(&msg, &snapshot, &handle, now) {
            Ok(reply) => {
                self.ctx.mailbox.push_inbox(reply.email.clone())?;
                info!(
                    "Reply from {} ({}) | Subject: '{}'",
                    reply.email.sender,
                    reply.kind,
                    escape_log(&reply.email.subject)
                );
                Ok(SendReport {
                    outcome: SendOutcome::Replied(reply.email),
                    delivered,
                })
            }
            Err(ProgressionError::UnknownCharacter(address)) => {
                warn!("No character profile for {}; bouncing", address);
                let bounce = self.bounce(&address, &subject);
                self.ctx.mailbox.push_inbox(bounce.clone())?;
                Ok(SendReport {
                    outcome: SendOutcome::Bounced(bounce),
                    delivered,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Open an inbox message; the first read grants the tokens its definition lists.
    pub fn read_email(&mut self, id: &str) -> Result<ReadReport> {
        let first_read = self.ctx.mailbox.mark_read(id)?;
        let email = self
            .ctx
            .mailbox()
            .find(id)
            .cloned()
            .ok_or_else(|| ProgressionError::UnknownEmail(id.to_string()))?;

        let mut granted = Vec::new();
        let mut delivered = Vec::new();
        if first_read {
            let rewards: Vec<Token> = self.db.read_rewards(id).to_vec();
            let reason = format!("read {}", id);
            for token in rewards {
                if self.ctx.tokens.add_with_reason(token.as_str(), Some(&reason))? {
                    granted.push(token);
                }
            }
            if !granted.is_empty() {
                delivered = self.evaluate()?;
            }
        }
        Ok(ReadReport {
            email,
            granted,
            delivered,
        })
    }

    fn bounce(&self, address: &str, subject: &str) -> Email {
        let domain = self.config.bbs.npc_domain.trim();
        Email {
            id: format!("bounce-{}", Uuid::new_v4()),
            sender: format!("{}@{}", MAILER_DAEMON, domain),
            recipient: self.handle().to_string(),
            subject: format!("Undeliverable: {}", subject),
            body: vec![
                format!("This is the mail system at {}.", domain),
                String::new(),
                format!("Your message to <{}> could not be delivered:", address),
                "no such operator on this node.".to_string(),
            ],
            timestamp: narrative_stamp(Utc::now()),
            read: false,
        }
    }
}

/// Handle named by a `username: <handle>` line, if any.
pub fn registration_handle(body: &str) -> Option<String> {
    USERNAME_RE
        .as_ref()?
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> EmailDatabase {
        let inbox = json!({ "emails": [
            { "id": "welcome_001", "sender": "glyphis@ciphernet.net", "subject": "Welcome",
              "body1": "Reply with username: <handle>", "send_on_start": true },
            { "id": "glyphis_username_ack_001", "sender": "glyphis@ciphernet.net",
              "subject": "Registered, {username}", "body1": "Your handle is {username}.",
              "auto_send": true, "token_required": "yes", "token_name": "USERNAME_SET",
              "grant_tokens": ["GAMES1"] },
            { "id": "jax_games_001", "sender": "jaxkando@ciphernet.net", "subject": "GAMES",
              "body1": "COME PLAY", "auto_send": true, "token_required": "yes", "token_name": "GAMES1" }
        ]});
        EmailDatabase::load(&inbox.to_string(), r#"{"email_templates": []}"#, Utc::now()).unwrap()
    }

    fn session() -> Session {
        let mut config = Config::default();
        config.npc.seed = Some(1989);
        Session::ephemeral(config, db()).unwrap()
    }

    #[test]
    fn registration_handle_is_extracted() {
        assert_eq!(registration_handle("hi\nUsername:  Neo").as_deref(), Some("neo"));
        assert_eq!(registration_handle("no handle here"), None);
    }

    #[test]
    fn onboarding_to_sysop_sets_handle_without_reply() {
        let mut s = session();
        s.evaluate().unwrap();
        let report = s
            .send_email("glyphis@ciphernet.net", "hello", "username: Neo")
            .unwrap();
        assert!(matches!(report.outcome, SendOutcome::Onboarded));
        assert_eq!(s.handle(), "neo");
        assert!(s.snapshot().has("USERNAME_SET"));
        let ids: Vec<&str> = report.delivered.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["glyphis_username_ack_001"]);
        assert_eq!(report.delivered[0].subject, "Registered, neo");
    }

    #[test]
    fn reading_grants_listed_tokens_once() {
        let mut s = session();
        s.evaluate().unwrap();
        s.send_email("glyphis@ciphernet.net", "", "username: neo").unwrap();

        let first = s.read_email("glyphis_username_ack_001").unwrap();
        assert_eq!(first.granted, vec![Token::parse("GAMES1").unwrap()]);
        assert_eq!(first.delivered[0].id, "jax_games_001");

        let again = s.read_email("glyphis_username_ack_001").unwrap();
        assert!(again.granted.is_empty());
        assert!(again.delivered.is_empty());
    }

    #[test]
    fn volunteering_to_jaxkando_grants_jax1() {
        let mut s = session();
        let report = s
            .send_email("jaxkando@ciphernet.net", "games", "I want to help crack games")
            .unwrap();
        assert!(matches!(report.outcome, SendOutcome::Replied(_)));
        assert!(s.snapshot().has("JAX1"));
    }

    #[test]
    fn unknown_npc_address_bounces() {
        let mut s = session();
        let report = s
            .send_email("ghost@ciphernet.net", "boo", "anyone there?")
            .unwrap();
        match report.outcome {
            SendOutcome::Bounced(email) => {
                assert!(email.sender.starts_with("MAILER-DAEMON@"));
                assert_eq!(s.inbox().last().map(|e| e.id.as_str()), Some(email.id.as_str()));
            }
            other => panic!("expected bounce, got {:?}", other),
        }
    }

    #[test]
    fn outside_addresses_are_queued() {
        let mut s = session();
        let report = s.send_email("friend@example.org", "", "").unwrap();
        match report.outcome {
            SendOutcome::Queued(email) => {
                assert_eq!(email.subject, "(no subject)");
                assert_eq!(email.body, vec!["(empty message)"]);
            }
            other => panic!("expected queue, got {:?}", other),
        }
        assert_eq!(s.context().mailbox().outbox().len(), 1);
        assert!(s.context().mailbox().sent().is_empty());
    }

    #[test]
    fn mail_gate_blocks_sends_until_held() {
        let mut config = Config::default();
        config.scheduler.mail_gate_token = Some("PSEM".into());
        let mut s = Session::ephemeral(config, db()).unwrap();
        let report = s.send_email("rain@ciphernet.net", "hi", "hi").unwrap();
        assert!(matches!(report.outcome, SendOutcome::Locked));

        s.grant_token("psem", Some("test")).unwrap();
        let report = s.send_email("rain@ciphernet.net", "hi", "hi").unwrap();
        assert!(matches!(report.outcome, SendOutcome::Replied(_)));
    }

    #[test]
    fn invalid_gate_token_fails_session_open() {
        let mut config = Config::default();
        config.scheduler.mail_gate_token = Some("no gate".into());
        assert!(matches!(
            Session::ephemeral(config, db()),
            Err(ProgressionError::InvalidToken(_))
        ));
    }

    #[test]
    fn tick_right_after_a_pass_waits_for_the_interval() {
        let mut s = session();
        assert_eq!(s.evaluate().unwrap().len(), 1);
        s.grant_token("PSEM2", None).unwrap();
        assert!(s.tick().unwrap().is_empty());
    }

    #[test]
    fn locked_modules_show_the_hint() {
        let mut s = session();
        assert_eq!(
            s.locked_hint(BoardModule::Games).as_deref(),
            Some("System integrity preserved. operative remains outside.")
        );
        s.grant_token("GAMES1", None).unwrap();
        assert!(s.locked_hint(BoardModule::Games).is_none());
        assert!(s.locked_hint(BoardModule::Logout).is_none());
    }
}
