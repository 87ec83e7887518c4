//! Character profiles for the NPC operators on the BBS.

use crate::tokens::catalogue;
use std::collections::BTreeMap;
use std::fmt;

/// Personality traits that bias which phrasing variants a character picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trait {
    Formal,
    Casual,
    Mysterious,
    Friendly,
    Technical,
    Emotional,
    Humorous,
    Paranoid,
    Optimistic,
    Nostalgic,
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trait::Formal => "formal",
            Trait::Casual => "casual",
            Trait::Mysterious => "mysterious",
            Trait::Friendly => "friendly",
            Trait::Technical => "technical",
            Trait::Emotional => "emotional",
            Trait::Humorous => "humorous",
            Trait::Paranoid => "paranoid",
            Trait::Optimistic => "optimistic",
            Trait::Nostalgic => "nostalgic",
        };
        f.write_str(s)
    }
}

/// Phrases that, sent to this character, grant a token before the reply.
#[derive(Debug, Clone, PartialEq)]
pub struct VolunteerGrant {
    pub phrases: Vec<&'static str>,
    pub token: &'static str,
}

impl VolunteerGrant {
    /// True when `text` (any case) contains one of the phrases.
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p))
    }
}

/// Static personality and speech data for one NPC address.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterProfile {
    pub name: &'static str,
    pub address: &'static str,
    /// Trait weights; higher weight biases selection toward that trait's lines.
    pub traits: Vec<(Trait, f32)>,
    pub greeting: &'static str,
    pub closing: &'static str,
    pub emphasis: &'static str,
    pub interests: Vec<&'static str>,
    pub catchphrases: Vec<&'static str>,
    pub volunteer: Option<VolunteerGrant>,
}

impl CharacterProfile {
    /// Weight of `t` for this character, or `None` if it lacks the trait.
    pub fn weight(&self, t: Trait) -> Option<f32> {
        self.traits.iter().find(|(tr, _)| *tr == t).map(|(_, w)| *w)
    }

    pub fn has_trait(&self, t: Trait) -> bool {
        self.weight(t).is_some()
    }

    /// Heaviest trait weight; character-specific lines are weighted with it.
    pub fn max_weight(&self) -> f32 {
        self.traits.iter().map(|(_, w)| *w).fold(1.0, f32::max)
    }
}

/// All known characters keyed by lower-cased address.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    profiles: BTreeMap<String, CharacterProfile>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: CharacterProfile) {
        self.profiles.insert(profile.address.to_lowercase(), profile);
    }

    pub fn get(&self, address: &str) -> Option<&CharacterProfile> {
        self.profiles.get(&address.trim().to_lowercase())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The four operators of GLYPHIS_IO.
    pub fn builtin() -> Self {
        let mut roster = Roster::new();
        roster.insert(CharacterProfile {
            name: "glyphis",
            address: "glyphis@ciphernet.net",
            traits: vec![
                (Trait::Mysterious, 2.0),
                (Trait::Formal, 1.5),
                (Trait::Technical, 1.0),
            ],
            greeting: "Acknowledged.",
            closing: "-glyphis",
            emphasis: "I see all.",
            interests: vec!["surveillance", "network security", "encryption"],
            catchphrases: vec!["I will be watching.", "The network sees all.", "Trust no one."],
            volunteer: None,
        });
        roster.insert(CharacterProfile {
            name: "rain",
            address: "rain@ciphernet.net",
            traits: vec![
                (Trait::Casual, 2.0),
                (Trait::Friendly, 1.8),
                (Trait::Optimistic, 1.2),
            ],
            greeting: "Hey",
            closing: "-rain",
            emphasis: "I've got this.",
            interests: vec!["operations", "coordination", "missions"],
            catchphrases: vec!["Let's do this!", "I've got plenty of tasks.", "Making chaos into order."],
            volunteer: None,
        });
        roster.insert(CharacterProfile {
            name: "jaxkando",
            address: "jaxkando@ciphernet.net",
            traits: vec![
                (Trait::Casual, 2.0),
                (Trait::Humorous, 1.8),
                (Trait::Technical, 1.5),
            ],
            greeting: "JAXKANDO HERE",
            closing: "-jaxkando",
            emphasis: "ALL CAPS BECAUSE I'M EXCITED",
            interests: vec!["games", "cracking", "reverse engineering"],
            catchphrases: vec!["COME PLAY GAMES WITH ME!", "I eat copy protection for breakfast.", "Games are art."],
            volunteer: Some(VolunteerGrant {
                phrases: vec!["help", "crack games", "volunteer"],
                token: catalogue::JAX1,
            }),
        });
        roster.insert(CharacterProfile {
            name: "uncle-am",
            address: "uncle-am@ciphernet.net",
            traits: vec![
                (Trait::Friendly, 2.0),
                (Trait::Nostalgic, 1.8),
                (Trait::Emotional, 1.5),
            ],
            greeting: "uncle-am here",
            closing: "-uncle-am",
            emphasis: "i care",
            interests: vec!["radio", "community", "old tech"],
            catchphrases: vec!["i'm here if you need me", "always looking for help", "pinkys like me"],
            volunteer: None,
        });
        roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_roster_has_four_operators() {
        let roster = Roster::builtin();
        assert_eq!(roster.len(), 4);
        assert!(roster.contains("GLYPHIS@ciphernet.net"));
        assert!(roster.get("nobody@ciphernet.net").is_none());
    }

    #[test]
    fn trait_weights_are_looked_up() {
        let roster = Roster::builtin();
        let glyphis = roster.get("glyphis@ciphernet.net").unwrap();
        assert_eq!(glyphis.weight(Trait::Mysterious), Some(2.0));
        assert!(!glyphis.has_trait(Trait::Friendly));
        assert_eq!(glyphis.max_weight(), 2.0);
    }

    #[test]
    fn volunteer_phrases_match_case_insensitively() {
        let roster = Roster::builtin();
        let jax = roster.get("jaxkando@ciphernet.net").unwrap();
        let grant = jax.volunteer.as_ref().unwrap();
        assert!(grant.matches("Hey, I WANT TO HELP with the games"));
        assert!(grant.matches("I volunteer"));
        assert!(!grant.matches("just saying hi"));
        assert_eq!(grant.token, "JAX1");
    }
}
