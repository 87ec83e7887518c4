//! Test utilities & fixtures.
//! Provides access to integration test data under `tests/test-data-int`.

use glyphbbs::config::Config;
use std::path::{Path, PathBuf};

/// Return the path to the static integration test fixture directory.
/// Kept small & deterministic. Tests should copy to a temp dir if they mutate.
pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test-data-int")
}

/// Return a writable copy (temp dir) of the two email source documents.
#[allow(dead_code)]
pub fn writable_fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().expect("tempdir");
    let src = fixture_root();
    for doc in ["emails_inbox.json", "emails_outbox.json"] {
        std::fs::copy(src.join(doc), tmp.path().join(doc)).unwrap();
    }
    tmp
}

/// Config pointing at a fixture copy, with state under `<root>/state` and a pinned reply seed.
#[allow(dead_code)]
pub fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = root.join("state").display().to_string();
    config.storage.inbox_file = root.join("emails_inbox.json").display().to_string();
    config.storage.outbox_file = root.join("emails_outbox.json").display().to_string();
    config.npc.seed = Some(1989);
    config.logging.level = "error".into();
    config.logging.file = None;
    config
}
