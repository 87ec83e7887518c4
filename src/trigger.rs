//! Trigger evaluator: decides which pending inbox entries are deliverable and
//! delivers them.
//!
//! Scans run on a cooperative timer (the caller polls [`TriggerEvaluator::tick`]
//! from its main loop; nothing blocks) and immediately after any token grant
//! via [`TriggerEvaluator::evaluate`]. An entry is deliverable when:
//!
//! - it is `send_on_start` and this is the first pass of the session (ungated), or
//! - it is `auto_send`, its precondition holds, and the optional mail gate token is held.
//!
//! Manual entries are never picked up here. Deliveries within one pass keep
//! source order.

use crate::context::ProgressionContext;
use crate::email::database::deliver;
use crate::email::{DeliveryMode, Email, EmailDatabase, InboxEntry, Substitutions};
use crate::errors::Result;
use crate::tokens::{Token, TokenSnapshot};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::time::{Duration, Instant};

/// Default scan interval when the configuration does not set one.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Scan state for one session.
#[derive(Debug)]
pub struct TriggerEvaluator {
    interval: Duration,
    last_scan: Option<Instant>,
    first_pass_done: bool,
    gate: Option<Token>,
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_INTERVAL)
    }
}

impl TriggerEvaluator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_scan: None,
            first_pass_done: false,
            gate: None,
        }
    }

    /// Require `gate` for every `auto_send` delivery.
    pub fn with_gate(mut self, gate: Option<Token>) -> Self {
        self.gate = gate;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn gate(&self) -> Option<&Token> {
        self.gate.as_ref()
    }

    /// Whether the first (on-start) pass has already run this session.
    pub fn started(&self) -> bool {
        self.first_pass_done
    }

    /// True when no scan has run yet or the interval has elapsed since the last.
    pub fn is_due(&self, at: Instant) -> bool {
        match self.last_scan {
            None => true,
            Some(last) => at.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Entries that the next pass would deliver, in source order.
    pub fn deliverable<'a>(&self, db: &'a EmailDatabase, ctx: &ProgressionContext) -> Vec<&'a InboxEntry> {
        let tokens = ctx.snapshot();
        db.pending_inbox(ctx.delivered())
            .into_iter()
            .filter(|entry| self.admits(entry, &tokens))
            .collect()
    }

    fn admits(&self, entry: &InboxEntry, tokens: &TokenSnapshot) -> bool {
        match entry.mode {
            DeliveryMode::OnStart => !self.first_pass_done,
            DeliveryMode::Auto => {
                let gated_open = self.gate.as_ref().map_or(true, |g| tokens.contains(g));
                gated_open && entry.precondition.is_satisfied(tokens)
            }
            DeliveryMode::Manual => false,
        }
    }

    /// Run one evaluation pass now, regardless of the timer. The pass restarts
    /// the tick interval.
    ///
    /// Returns the emails delivered by this pass.
    pub fn evaluate(
        &mut self,
        db: &EmailDatabase,
        ctx: &mut ProgressionContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<Email>> {
        self.scan(db, ctx, Instant::now(), now)
    }

    /// Timer entry point: evaluate only when the interval has elapsed.
    pub fn tick(
        &mut self,
        db: &EmailDatabase,
        ctx: &mut ProgressionContext,
        at: Instant,
        now: DateTime<Utc>,
    ) -> Result<Vec<Email>> {
        if !self.is_due(at) {
            return Ok(Vec::new());
        }
        self.scan(db, ctx, at, now)
    }

    fn scan(
        &mut self,
        db: &EmailDatabase,
        ctx: &mut ProgressionContext,
        at: Instant,
        now: DateTime<Utc>,
    ) -> Result<Vec<Email>> {
        self.last_scan = Some(at);
        let due: Vec<&InboxEntry> = self.deliverable(db, ctx);
        let mut delivered = Vec::with_capacity(due.len());
        let none = Substitutions::new();
        for entry in due {
            if let Some(email) = deliver(ctx, entry, &none, now)? {
                delivered.push(email);
            }
        }
        if !self.first_pass_done {
            self.first_pass_done = true;
            debug!("First evaluation pass complete");
        }
        if !delivered.is_empty() {
            info!("Evaluation pass delivered {} email(s)", delivered.len());
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap()
    }

    fn db() -> EmailDatabase {
        let inbox = json!({ "emails": [
            { "id": "welcome_001", "sender": "glyphis@ciphernet.net", "subject": "Welcome",
              "body1": "Welcome, {username}.", "send_on_start": "yes" },
            { "id": "gated_start", "sender": "glyphis@ciphernet.net", "subject": "Also on start",
              "body1": "x", "send_on_start": true, "token_required": "yes", "token_name": "NEVER_HELD" },
            { "id": "rain_intro_001", "sender": "rain@ciphernet.net", "subject": "Hey",
              "body1": "Hey there", "auto_send": true, "token_required": "yes", "token_name": "PSEM2" },
            { "id": "games_001", "sender": "jaxkando@ciphernet.net", "subject": "GAMES",
              "body1": "PLAY", "auto_send": true, "token_required": "yes", "token_name": "GAMES1" },
            { "id": "manual_001", "sender": "uncle-am@ciphernet.net", "subject": "later",
              "body1": "..." }
        ]});
        EmailDatabase::load(&inbox.to_string(), r#"{"email_templates": []}"#, now()).unwrap()
    }

    fn ids(emails: &[Email]) -> Vec<&str> {
        emails.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn first_pass_delivers_on_start_entries_ungated() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        let mut eval = TriggerEvaluator::default();
        let out = eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert_eq!(ids(&out), vec!["welcome_001", "gated_start"]);
        assert!(eval.evaluate(&db, &mut ctx, now()).unwrap().is_empty());
        assert_eq!(ctx.mailbox().count_id("welcome_001"), 1);
    }

    #[test]
    fn auto_entries_wait_for_their_token() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        let mut eval = TriggerEvaluator::default();
        eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert!(ctx.mailbox().find("rain_intro_001").is_none());

        ctx.tokens.add("psem2").unwrap();
        let out = eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert_eq!(ids(&out), vec!["rain_intro_001"]);
    }

    #[test]
    fn simultaneous_deliveries_keep_source_order() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        ctx.tokens.add("GAMES1").unwrap();
        ctx.tokens.add("PSEM2").unwrap();
        let mut eval = TriggerEvaluator::default();
        let out = eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert_eq!(
            ids(&out),
            vec!["welcome_001", "gated_start", "rain_intro_001", "games_001"]
        );
    }

    #[test]
    fn manual_entries_are_never_scheduled() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        let mut eval = TriggerEvaluator::default();
        eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert!(eval
            .deliverable(&db, &ctx)
            .iter()
            .all(|e| e.id != "manual_001"));
    }

    #[test]
    fn mail_gate_holds_back_auto_entries() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        ctx.tokens.add("PSEM2").unwrap();
        let mut eval = TriggerEvaluator::default().with_gate(Some(Token::parse("PSEM").unwrap()));
        let out = eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert_eq!(ids(&out), vec!["welcome_001", "gated_start"]);

        ctx.tokens.add("PSEM").unwrap();
        let out = eval.evaluate(&db, &mut ctx, now()).unwrap();
        assert_eq!(ids(&out), vec!["rain_intro_001"]);
    }

    #[test]
    fn tick_respects_interval() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        let mut eval = TriggerEvaluator::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert_eq!(eval.tick(&db, &mut ctx, t0, now()).unwrap().len(), 2);

        ctx.tokens.add("PSEM2").unwrap();
        assert!(eval
            .tick(&db, &mut ctx, t0 + Duration::from_secs(3), now())
            .unwrap()
            .is_empty());
        let out = eval
            .tick(&db, &mut ctx, t0 + Duration::from_secs(10), now())
            .unwrap();
        assert_eq!(ids(&out), vec!["rain_intro_001"]);
    }

    #[test]
    fn immediate_pass_restarts_the_interval() {
        let db = db();
        let mut ctx = ProgressionContext::in_memory();
        let mut eval = TriggerEvaluator::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert_eq!(eval.evaluate(&db, &mut ctx, now()).unwrap().len(), 2);
        assert!(!eval.is_due(t0));

        ctx.tokens.add("PSEM2").unwrap();
        assert!(eval.tick(&db, &mut ctx, Instant::now(), now()).unwrap().is_empty());
        let out = eval
            .tick(&db, &mut ctx, Instant::now() + Duration::from_secs(20), now())
            .unwrap();
        assert_eq!(ids(&out), vec!["rain_intro_001"]);
    }

    #[test]
    fn new_session_does_not_repeat_on_start_mail() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = crate::storage::StateDir::open(tmp.path()).unwrap();
        let db = db();
        {
            let mut ctx = ProgressionContext::open(&dir, "operative").unwrap();
            TriggerEvaluator::default().evaluate(&db, &mut ctx, now()).unwrap();
        }
        let mut ctx = ProgressionContext::open(&dir, "operative").unwrap();
        let out = TriggerEvaluator::default().evaluate(&db, &mut ctx, now()).unwrap();
        assert!(out.is_empty());
        assert_eq!(ctx.mailbox().count_id("welcome_001"), 1);
    }
}
