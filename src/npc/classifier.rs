//! Trigger classification for outgoing player mail.
//!
//! [`classify`] runs an ordered table of detectors over the lower-cased
//! subject and body; the first detector that fires decides the class. It is a
//! pure function of the text and the token snapshot.

use crate::tokens::{catalogue, TokenSnapshot};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Board areas a player can mention once unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Games,
    UrgentOps,
    TeamInfo,
    PirateRadio,
    Email,
}

impl Area {
    /// Order used when matching mentions.
    pub const MENTION_ORDER: [Area; 5] = [
        Area::Games,
        Area::UrgentOps,
        Area::TeamInfo,
        Area::PirateRadio,
        Area::Email,
    ];

    /// Order used to find the most recently unlocked area.
    pub const RECENCY_ORDER: [Area; 5] = [
        Area::PirateRadio,
        Area::TeamInfo,
        Area::UrgentOps,
        Area::Games,
        Area::Email,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Area::Games => "games",
            Area::UrgentOps => "urgent ops",
            Area::TeamInfo => "team info",
            Area::PirateRadio => "pirate radio",
            Area::Email => "email",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Area::Games => &["games", "game", "play", "gaming", "simulacra", "jaxkando"],
            Area::UrgentOps => &["ops", "operations", "tasks", "missions", "lapc", "cracker", "rain"],
            Area::TeamInfo => &[
                "team", "members", "operators", "glyphis", "rain", "jaxkando", "uncle-am", "dossier",
            ],
            Area::PirateRadio => &["radio", "broadcast", "frequency", "transmission", "uncle-am"],
            Area::Email => &["email", "message", "mail", "correspondence"],
        }
    }

    /// Holding any one of these unlocks the area.
    pub fn required_tokens(&self) -> &'static [&'static str] {
        match self {
            Area::Games => &[catalogue::GAMES1],
            Area::UrgentOps => &[
                catalogue::AUDIO1,
                catalogue::LAPC1,
                catalogue::LAPC1A,
                catalogue::OPS_ACCESS,
            ],
            Area::TeamInfo => &[catalogue::TEAM_ACCESS],
            Area::PirateRadio => &[catalogue::RADIO_ACCESS],
            Area::Email => &[catalogue::PSEM],
        }
    }

    /// Character that runs this area, if any.
    pub fn host(&self) -> Option<&'static str> {
        match self {
            Area::Games => Some("jaxkando"),
            Area::UrgentOps => Some("rain"),
            Area::PirateRadio => Some("uncle-am"),
            Area::TeamInfo | Area::Email => None,
        }
    }

    pub fn is_unlocked(&self, tokens: &TokenSnapshot) -> bool {
        tokens.has_any(self.required_tokens())
    }

    fn is_mentioned(&self, text: &str) -> bool {
        self.keywords().iter().any(|k| contains_word(text, k))
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detected intent of a player message, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    HelpRequest,
    IdentityRequest,
    WellBeing,
    UnlockedArea(Area),
    Greeting,
    Thanks,
    Question,
    /// Nothing matched; the reply is a generic acknowledgment.
    Fallback,
}

impl TriggerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerKind::HelpRequest => "help-request",
            TriggerKind::IdentityRequest => "identity-request",
            TriggerKind::WellBeing => "well-being",
            TriggerKind::UnlockedArea(_) => "unlocked-area",
            TriggerKind::Greeting => "greeting",
            TriggerKind::Thanks => "thanks",
            TriggerKind::Question => "question",
            TriggerKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::UnlockedArea(area) => write!(f, "unlocked-area({})", area),
            other => f.write_str(other.name()),
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

const HELP_PATTERNS: &[&str] = &[
    r"\bhelp\b",
    r"\bassist\b",
    r"\bsupport\b",
    r"\bneed\b",
    r"\bhow do i\b",
    r"\bhow to\b",
    r"\bwhat should i\b",
    r"\bcan you\b",
    r"\bcould you\b",
    r"\bwould you\b",
];
const IDENTITY_PATTERNS: &[&str] = &[
    r"\basl\b",
    r"\bage.*sex.*location\b",
    r"\bwhere.*from\b",
    r"\bwhere.*live\b",
    r"\bwho.*are.*you\b",
    r"\btell.*about.*yourself\b",
];
const WELL_BEING_PATTERNS: &[&str] = &[
    r"\bhow.*are.*you\b",
    r"\bhow.*doing\b",
    r"\bhow.*going\b",
    r"\bhow.*things\b",
    r"\bwhat.*up\b",
    r"\bhow.*feeling\b",
];
const GREETING_PATTERNS: &[&str] = &[
    r"\bhello\b",
    r"\bhi\b",
    r"\bhey\b",
    r"\bgreetings\b",
    r"\bhowdy\b",
    r"\bgood morning\b",
    r"\bgood evening\b",
];
const THANKS_PATTERNS: &[&str] = &[r"\bthank\b", r"\bthanks\b", r"\bthx\b", r"\bappreciate\b"];
const QUESTION_PATTERNS: &[&str] = &[r"\?", r"\b(what|who|where|when|why|how)\b"];

static HELP: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(HELP_PATTERNS));
static IDENTITY: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(IDENTITY_PATTERNS));
static WELL_BEING: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(WELL_BEING_PATTERNS));
static GREETING: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(GREETING_PATTERNS));
static THANKS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(THANKS_PATTERNS));
static QUESTION: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(QUESTION_PATTERNS));

fn any_match(set: &[Regex], text: &str) -> bool {
    set.iter().any(|re| re.is_match(text))
}

/// Whole-word containment; `word` may itself contain `-` or spaces.
fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
        boundary(before) && boundary(after)
    })
}

type Detector = fn(&str, &TokenSnapshot) -> Option<TriggerKind>;

fn help(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&HELP, text).then_some(TriggerKind::HelpRequest)
}

fn identity(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&IDENTITY, text).then_some(TriggerKind::IdentityRequest)
}

fn well_being(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&WELL_BEING, text).then_some(TriggerKind::WellBeing)
}

fn unlocked_area(text: &str, tokens: &TokenSnapshot) -> Option<TriggerKind> {
    mentioned_area(text, tokens).map(TriggerKind::UnlockedArea)
}

fn greeting(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&GREETING, text).then_some(TriggerKind::Greeting)
}

fn thanks(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&THANKS, text).then_some(TriggerKind::Thanks)
}

fn question(text: &str, _: &TokenSnapshot) -> Option<TriggerKind> {
    any_match(&QUESTION, text).then_some(TriggerKind::Question)
}

/// Evaluated top to bottom; the first hit wins.
const DETECTORS: &[Detector] = &[
    help,
    identity,
    well_being,
    unlocked_area,
    greeting,
    thanks,
    question,
];

/// Lower-case and join subject and body the way the detectors expect.
pub fn normalize_message(subject: &str, body: &str) -> String {
    format!("{} {}", subject, body).to_lowercase()
}

/// Classify already-normalised text.
pub fn classify(text: &str, tokens: &TokenSnapshot) -> TriggerKind {
    DETECTORS
        .iter()
        .find_map(|detect| detect(text, tokens))
        .unwrap_or(TriggerKind::Fallback)
}

/// First area, in mention order, that `text` names and the player has unlocked.
pub fn mentioned_area(text: &str, tokens: &TokenSnapshot) -> Option<Area> {
    Area::MENTION_ORDER
        .into_iter()
        .find(|area| area.is_mentioned(text) && area.is_unlocked(tokens))
}

/// Most recently unlocked area by narrative order.
pub fn latest_unlocked_area(tokens: &TokenSnapshot) -> Option<Area> {
    Area::RECENCY_ORDER
        .into_iter()
        .find(|area| area.is_unlocked(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Token;

    fn tokens(codes: &[&str]) -> TokenSnapshot {
        codes.iter().map(|c| Token::parse(c).unwrap()).collect()
    }

    fn kind(subject: &str, body: &str, held: &[&str]) -> TriggerKind {
        classify(&normalize_message(subject, body), &tokens(held))
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(HELP.len(), HELP_PATTERNS.len());
        assert_eq!(IDENTITY.len(), IDENTITY_PATTERNS.len());
        assert_eq!(WELL_BEING.len(), WELL_BEING_PATTERNS.len());
        assert_eq!(GREETING.len(), GREETING_PATTERNS.len());
        assert_eq!(THANKS.len(), THANKS_PATTERNS.len());
        assert_eq!(QUESTION.len(), QUESTION_PATTERNS.len());
    }

    #[test]
    fn asl_is_an_identity_request() {
        assert_eq!(kind("", "asl?", &[]), TriggerKind::IdentityRequest);
        assert_eq!(kind("hey", "where are you from", &[]), TriggerKind::IdentityRequest);
    }

    #[test]
    fn priority_order_is_fixed() {
        // help outranks everything below it
        assert_eq!(kind("hello", "can you help me?", &[]), TriggerKind::HelpRequest);
        assert_eq!(kind("", "hi, how are you doing?", &[]), TriggerKind::WellBeing);
        assert_eq!(kind("hello", "thanks!", &[]), TriggerKind::Greeting);
        assert_eq!(kind("", "thanks for the invite", &[]), TriggerKind::Thanks);
        assert_eq!(kind("", "is the relay down?", &[]), TriggerKind::Question);
        assert_eq!(kind("status", "packet relay online", &[]), TriggerKind::Fallback);
    }

    #[test]
    fn area_mentions_need_the_unlocking_token() {
        assert_eq!(kind("", "the games are great", &[]), TriggerKind::Fallback);
        assert_eq!(
            kind("", "the games are great", &["GAMES1"]),
            TriggerKind::UnlockedArea(Area::Games)
        );
        assert_eq!(
            kind("", "tuned the radio last night", &["RADIO_ACCESS"]),
            TriggerKind::UnlockedArea(Area::PirateRadio)
        );
    }

    #[test]
    fn keywords_match_whole_words() {
        assert!(!Area::UrgentOps.is_mentioned("training drops"));
        assert!(Area::UrgentOps.is_mentioned("any ops tonight"));
        assert!(Area::TeamInfo.is_mentioned("ask uncle-am about it"));
    }

    #[test]
    fn latest_area_prefers_recent_unlocks() {
        assert_eq!(latest_unlocked_area(&tokens(&[])), None);
        assert_eq!(latest_unlocked_area(&tokens(&["PSEM", "GAMES1"])), Some(Area::Games));
        assert_eq!(
            latest_unlocked_area(&tokens(&["LAPC1", "RADIO_ACCESS"])),
            Some(Area::PirateRadio)
        );
    }
}
