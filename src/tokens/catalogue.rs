//! Canonical token codes and their display metadata.

use super::Token;

pub const PSEM: &str = "PSEM";
pub const USERNAME_SET: &str = "USERNAME_SET";
pub const PIN_SET: &str = "PIN_SET";
pub const GAMES1: &str = "GAMES1";
pub const AUDIO1: &str = "AUDIO1";
pub const LAPC1: &str = "LAPC1";
pub const LAPC1A: &str = "LAPC1A";
pub const JAX1: &str = "JAX1";
pub const AUDIO_ON: &str = "AUDIO_ON";
pub const OPS_ACCESS: &str = "OPS_ACCESS";
pub const TEAM_ACCESS: &str = "TEAM_ACCESS";
pub const RADIO_ACCESS: &str = "RADIO_ACCESS";
pub const PSEM2: &str = "PSEM2";
pub const UNCLEAM1: &str = "UNCLEAM1";

/// Display metadata for a known token code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMeta {
    pub code: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

const fn meta(code: &'static str, description: &'static str) -> TokenMeta {
    TokenMeta {
        code,
        label: code,
        description,
    }
}

/// Known tokens, in no particular order.
pub const CATALOGUE: &[TokenMeta] = &[
    meta(PSEM, "Primary System Enablement Module - unlocks core communications"),
    meta(USERNAME_SET, "Player handle registered with Glyphis"),
    meta(PIN_SET, "Secure login PIN configured"),
    meta(GAMES1, "Primary games vault access"),
    meta(AUDIO1, "Granted access to urgent operations briefing channel"),
    meta(LAPC1, "Unlocked LAPC-1 driver challenge brief from Uncle-am"),
    meta(LAPC1A, "Activated LAPC-1 power rail (Node 1 complete)"),
    meta("LAPC1_NODE1", "LAPC-1 Node 1 power LED lit"),
    meta("LAPC1_NODE2", "LAPC-1 Node 2 left channel LED lit"),
    meta("LAPC1_NODE3", "LAPC-1 Node 3 right channel LED lit"),
    meta("LAPC1_NODE4", "LAPC-1 Node 4 both channels at default volume"),
    meta("LAPC1_NODE5", "LAPC-1 Node 5 stream entry reached"),
    meta("LAPC1_NODE6", "LAPC-1 Node 6 data check loop reached"),
    meta("LAPC1_NODE7", "LAPC-1 Node 7 output sample loop reached"),
    meta(JAX1, "Volunteered to help Jaxkando crack games"),
    meta(AUDIO_ON, "Completed full LAPC-1 driver initialization (all nodes operational)"),
    meta(OPS_ACCESS, "Granted access to urgent operations module"),
    meta(TEAM_ACCESS, "Unlocked internal team dossier"),
    meta(RADIO_ACCESS, "Approved for pirate radio transmissions"),
    meta("SUSPICION", "Story arc: suspicion"),
    meta("PARANOIA", "Story arc: paranoia"),
    meta("REVELATION", "Story arc: revelation"),
    meta(PSEM2, "Second-stage communications clearance"),
    meta(UNCLEAM1, "Earned Uncle-am's trust via SIMULACRA core progress"),
];

/// Metadata for `code`, if it is a known token.
pub fn lookup(code: &str) -> Option<&'static TokenMeta> {
    CATALOGUE.iter().find(|m| m.code == code)
}

pub fn is_known(token: &Token) -> bool {
    lookup(token.as_str()).is_some()
}

/// Friendly label for a token; unknown codes are shown as-is.
pub fn describe(token: &Token) -> &str {
    match lookup(token.as_str()) {
        Some(m) => m.label,
        None => token.as_str(),
    }
}

/// Sort key: known tokens first, then alphabetical within each group.
pub fn sort_key(token: &Token) -> (u8, &str) {
    (if is_known(token) { 0 } else { 1 }, token.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_codes_are_valid_tokens() {
        for m in CATALOGUE {
            let t = Token::parse(m.code).expect("catalogue code parses");
            assert_eq!(t.as_str(), m.code);
        }
    }

    #[test]
    fn describe_falls_back_to_code() {
        let known = Token::parse("games1").unwrap();
        assert_eq!(describe(&known), "GAMES1");
        let custom = Token::parse("side_quest_7").unwrap();
        assert_eq!(describe(&custom), "SIDE_QUEST_7");
    }
}
