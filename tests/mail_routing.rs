mod common;

use glyphbbs::gating::BoardModule;
use glyphbbs::session::{SendOutcome, Session};

fn session(tmp: &tempfile::TempDir) -> Session {
    let mut session = Session::load(common::config_for(tmp.path())).unwrap();
    session.evaluate().unwrap();
    session
}

#[test]
fn onboarding_unlocks_the_games_vault() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    assert!(s.locked_hint(BoardModule::Games).is_some());

    let report = s
        .send_email("glyphis@ciphernet.net", "registration", "username: Neo")
        .unwrap();
    assert!(matches!(report.outcome, SendOutcome::Onboarded));
    assert_eq!(report.delivered.len(), 1);
    let ack = &report.delivered[0];
    assert_eq!(ack.subject, "Registered: neo");
    assert_eq!(ack.recipient, "neo");

    // GAMES1 comes from reading the acknowledgement, not from receiving it
    assert!(!s.snapshot().has("GAMES1"));
    let read = s.read_email("glyphis_username_ack_001").unwrap();
    assert_eq!(read.granted.len(), 1);
    assert_eq!(read.granted[0].as_str(), "GAMES1");
    assert!(s.locked_hint(BoardModule::Games).is_none());
    assert_eq!(read.delivered.len(), 1);
    assert_eq!(read.delivered[0].id, "jaxkando_games_001");
}

#[test]
fn rejected_handles_are_ignored() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    let report = s
        .send_email("glyphis@ciphernet.net", "hi", "username: guest")
        .unwrap();
    // not onboarding, so glyphis answers like any other mail
    assert!(matches!(report.outcome, SendOutcome::Replied(_)));
    assert_eq!(s.handle(), "operative");
    assert!(!s.snapshot().has("USERNAME_SET"));
}

#[test]
fn volunteering_grants_jax1_before_the_reply() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    let report = s
        .send_email("JaxKando@ciphernet.net", "re: fresh warez", "count me in, I volunteer")
        .unwrap();
    let SendOutcome::Replied(reply) = report.outcome else {
        panic!("expected a reply");
    };
    assert!(s.snapshot().has("JAX1"));
    assert_eq!(reply.subject, "RE: re: fresh warez");
    assert_eq!(s.inbox().last().map(|e| e.id.as_str()), Some(reply.id.as_str()));
}

#[test]
fn uncle_am_briefing_opens_urgent_ops() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    assert!(s.locked_hint(BoardModule::UrgentOps).is_some());

    let delivered = s.grant_token("UNCLEAM1", Some("story milestone")).unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, "uncle_am_audio_ops_001");

    let read = s.read_email("uncle_am_audio_ops_001").unwrap();
    let granted: Vec<&str> = read.granted.iter().map(|t| t.as_str()).collect();
    assert_eq!(granted, vec!["AUDIO1", "LAPC1"]);
    assert!(s.locked_hint(BoardModule::UrgentOps).is_none());
}

#[test]
fn unknown_operator_bounces_and_session_continues() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    let before = s.inbox().len();

    let report = s.send_email("sysadmin@ciphernet.net", "root", "let me in").unwrap();
    let SendOutcome::Bounced(bounce) = report.outcome else {
        panic!("expected a bounce");
    };
    assert_eq!(bounce.subject, "Undeliverable: root");
    assert_eq!(s.inbox().len(), before + 1);

    // the next send is unaffected
    let report = s.send_email("rain@ciphernet.net", "hey", "how are you").unwrap();
    assert!(matches!(report.outcome, SendOutcome::Replied(_)));
}

#[test]
fn outside_mail_waits_in_the_outbox() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    let report = s.send_email("pen.pal@prodigy.com", "hi", "line one\nline two").unwrap();
    let SendOutcome::Queued(queued) = report.outcome else {
        panic!("expected the message to be queued");
    };
    assert_eq!(queued.body, vec!["line one", "line two"]);
    assert_eq!(s.context().mailbox().outbox().len(), 1);
    assert!(s.context().mailbox().sent().is_empty());
}

#[test]
fn outbox_templates_follow_tokens() {
    let tmp = common::writable_fixture();
    let mut s = session(&tmp);
    let ids = |s: &Session| -> Vec<String> {
        s.database()
            .pending_outbox_templates(&s.snapshot())
            .iter()
            .map(|t| t.id.clone())
            .collect()
    };
    assert_eq!(ids(&s), vec!["reply_glyphis_register"]);
    s.grant_token("GAMES1", None).unwrap();
    assert_eq!(ids(&s), vec!["reply_glyphis_register", "reply_jaxkando_volunteer"]);
}
