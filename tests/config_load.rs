mod common;

use glyphbbs::config::Config;
use glyphbbs::session::Session;
use std::time::Duration;

#[tokio::test]
async fn default_config_writes_and_loads() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    let path = path.to_str().unwrap();

    Config::create_default(path).await.unwrap();
    let config = Config::load(path).await.unwrap();
    assert_eq!(config.bbs.sysop_address, "glyphis@ciphernet.net");
    assert_eq!(config.check_interval(), Duration::from_millis(5000));
    assert!(config.scheduler.mail_gate_token.is_none());
}

#[tokio::test]
async fn invalid_gate_token_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[bbs]
name = "GLYPHIS_IO BBS"
sysop_address = "glyphis@ciphernet.net"

[storage]
data_dir = "state"
inbox_file = "emails_inbox.json"
outbox_file = "emails_outbox.json"

[scheduler]
mail_gate_token = "psem 2"
"#,
    )
    .unwrap();

    let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("mail_gate_token"), "{}", err);
}

#[tokio::test]
async fn missing_config_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("absent.toml");
    assert!(Config::load(path.to_str().unwrap()).await.is_err());
}

#[tokio::test]
async fn gated_config_holds_auto_mail_until_the_gate_opens() {
    let tmp = common::writable_fixture();
    let mut config = common::config_for(tmp.path());
    config.scheduler.mail_gate_token = Some("PSEM".into());
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let config = Config::load(path.to_str().unwrap()).await.unwrap();
    let mut session = Session::load(config).unwrap();
    let first: Vec<String> = session.evaluate().unwrap().into_iter().map(|e| e.id).collect();
    // on-start mail ignores the gate
    assert_eq!(first, vec!["welcome_001"]);

    assert!(session.grant_token("PSEM2", None).unwrap().is_empty());
    let opened: Vec<String> = session
        .grant_token("PSEM", None)
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(opened, vec!["rain_intro_001"]);
}
