//! NPC reply generation.
//!
//! A reply is built in four steps: look up the [`CharacterProfile`], classify
//! the message, pick a line from the class pool weighted by the profile's
//! traits, then wrap it in the profile's greeting and closing. Randomness only
//! picks flavor text; it never influences tokens. The generator is seedable so
//! tests can pin the exact output.

use super::classifier::{classify, latest_unlocked_area, mentioned_area, normalize_message, Area, TriggerKind};
use super::profile::{CharacterProfile, Roster, Trait};
use crate::email::{narrative_stamp, Email, Substitutions};
use crate::errors::{ProgressionError, Result};
use crate::logutil::escape_log;
use crate::tokens::TokenSnapshot;
use chrono::{DateTime, Utc};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Exchanges remembered per NPC address.
pub const HISTORY_LIMIT: usize = 50;

const LAST_RESORT: &str = "Message received.";

#[derive(Debug, Clone, Copy)]
enum Voice {
    Trait(Trait),
    Character(&'static str),
    Anyone,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    voice: Voice,
    text: &'static str,
}

const fn by_trait(t: Trait, text: &'static str) -> Line {
    Line { voice: Voice::Trait(t), text }
}

const fn by_character(name: &'static str, text: &'static str) -> Line {
    Line { voice: Voice::Character(name), text }
}

const fn anyone(text: &'static str) -> Line {
    Line { voice: Voice::Anyone, text }
}

const HELP_LINES: &[Line] = &[
    by_trait(Trait::Friendly, "Hey {username}, happy to help! What do you need?"),
    by_trait(Trait::Friendly, "Sure thing! What's going on?"),
    by_trait(Trait::Friendly, "I'm here for you. What can I do?"),
    by_trait(Trait::Technical, "Technical support protocols initiated. State your precise requirements, {username}."),
    by_trait(Trait::Technical, "I can assist with technical matters. What's the issue?"),
    by_trait(Trait::Technical, "Debugging mode activated. Describe the problem."),
    by_trait(Trait::Casual, "Yeah, what's up?"),
    by_trait(Trait::Casual, "Sure, what do you need help with?"),
    by_trait(Trait::Casual, "Lay it on me - what's the problem?"),
    by_trait(Trait::Mysterious, "I can provide assistance, but you must be more specific, {username}."),
    by_trait(Trait::Mysterious, "Help is available... if you know what to ask for."),
    by_trait(Trait::Mysterious, "State your requirements clearly."),
];

const IDENTITY_LINES: &[Line] = &[
    by_character("glyphis", "I am the sysop. That is all you need to know. I exist in the spaces between packets. Location is irrelevant when you are everywhere."),
    by_character("glyphis", "Age? Time is meaningless in the digital realm.\n\nI am the network. I am everywhere and nowhere."),
    by_character("glyphis", "Personal details are classified. I am glyphis. That should be sufficient."),
    by_character("rain", "Hey {username}, I'm rain. I don't really do the whole personal info thing, but I'm the taskmaster around here. That's what matters, right?"),
    by_character("rain", "I'm rain - I handle ops and missions. That's probably more useful info than my age or where I live, don't you think?"),
    by_character("rain", "Personal details? Nah, let's keep it professional. I'm rain, I coordinate missions. That's what you need to know."),
    by_character("jaxkando", "JAXKANDO HERE! I'm the gamesmaster. Age? Old enough to crack games! Location? Everywhere there's code to break!\n\nThat's all you need to know!"),
    by_character("jaxkando", "I'm jaxkando! I reverse engineer things and crack games. That's way more interesting than where I'm from, right?\n\nCOME PLAY GAMES WITH ME!"),
    by_character("jaxkando", "Personal info? BORING! I'm jaxkando, I break games and systems. That's the interesting stuff!\n\nWant to know more? Play some games with me!"),
    by_character("uncle-am", "uncle-am here, {username}. i'm the radio engineer - pinky, they call us. grew up with ham radio before all this digital stuff.\n\nlocation? somewhere with good antenna reception, that's all that matters!"),
    by_character("uncle-am", "hey {username}, i'm uncle-am. the community guy. age? old enough to remember when radio was king.\n\ni'm here if you need me, always."),
    by_character("uncle-am", "uncle-am here. radio engineer and community moderator. probably the oldest one here, grew up with shortwave and packet radio.\n\ni'm always listening."),
    anyone("I'd rather not share personal details."),
];

const WELL_BEING_LINES: &[Line] = &[
    by_trait(Trait::Friendly, "Hey {username}, I'm doing good! Thanks for asking."),
    by_trait(Trait::Friendly, "Pretty good! How about you?"),
    by_trait(Trait::Friendly, "I'm alright. Things are busy but that's normal around here."),
    by_trait(Trait::Optimistic, "Great! Always excited when new people join the network."),
    by_trait(Trait::Optimistic, "Doing awesome! Lots of cool stuff happening."),
    by_trait(Trait::Optimistic, "Fantastic! The BBS is buzzing with activity."),
    by_trait(Trait::Mysterious, "I am functioning within expected parameters."),
    by_trait(Trait::Mysterious, "Status: operational. All systems nominal."),
    by_trait(Trait::Mysterious, "I exist. That is sufficient."),
    by_trait(Trait::Nostalgic, "Doing okay. Sometimes I miss the old days, but this place keeps me going."),
    by_trait(Trait::Nostalgic, "I'm good. The community here reminds me of the old BBS days."),
    by_trait(Trait::Nostalgic, "Hanging in there. It's nice to have people to talk to."),
    by_trait(Trait::Paranoid, "Cautious. Always cautious. You can never be too careful."),
    by_trait(Trait::Paranoid, "Wary. There's something in the air... can you feel it?"),
    by_character("rain", "Busy as usual! Got a ton of ops to coordinate. But I love it."),
    by_character("rain", "Doing great! Just finished organizing the latest mission. Want to help?"),
    by_character("jaxkando", "EXCELLENT! Just cracked something new! Want to see?"),
    by_character("jaxkando", "AMAZING! Games are flowing, systems are breaking, life is good!"),
    by_character("uncle-am", "i'm doing okay. been tuning the radio setup, picking up some interesting signals."),
    by_character("uncle-am", "pretty good! been helping people around the BBS. that's what i do."),
    anyone("I'm fine, thanks."),
];

const GAMES_LINES: &[Line] = &[
    by_character("jaxkando", "YES! {USERNAME}, YOU UNLOCKED THE GAMES! COME PLAY WITH ME!\n\nI've got SIMULACRA_CORE ready for you. Edit code, outsmart the warden, deliver the packet. Super fun!"),
    by_character("jaxkando", "GAMES MODULE UNLOCKED! AWESOME!\n\nThere's SIMULACRA_CORE waiting for you. It's a hacking puzzle game. Think you can handle it?"),
    anyone("Ah, you've unlocked the games module. Jaxkando's been excited about that."),
    anyone("The games vault is open. Jaxkando handles all that - he's the gamesmaster."),
];

const OPS_LINES: &[Line] = &[
    by_character("rain", "Hey {username}, you've got access to Urgent Ops now! Perfect timing - I've got missions that need doing.\n\nSome are simple, others... well, let's just say they're more interesting."),
    by_character("rain", "Urgent Ops is unlocked! I coordinate all the missions there.\n\nSome jobs are straightforward data recovery, others involve... creative problem solving."),
    anyone("You've unlocked Urgent Ops. Rain handles all the missions there - she's the taskmaster."),
    anyone("Urgent Ops is available now. Rain coordinates everything in that module."),
];

const RADIO_LINES: &[Line] = &[
    by_character("uncle-am", "hey {username}, you've got access to the pirate radio now! i'm the one running it.\n\nit's a looping broadcast - part DJ monologue, part world-building."),
    by_character("uncle-am", "pirate radio unlocked! that's my domain.\n\ni've got my antenna routing signals through the phone lines. wild what you can pick up if you know how to listen."),
    anyone("Pirate Radio is unlocked. Uncle-am runs that - he's the radio engineer."),
    anyone("You can access Pirate Radio now. Uncle-am handles all the broadcasting."),
];

const TEAM_LINES: &[Line] = &[
    anyone("You've unlocked Team Info. That's where you'll find dossiers on all of us."),
    anyone("Team Info is available. Check it out to learn more about the operators."),
];

const EMAIL_LINES: &[Line] = &[
    anyone("Your mail privileges are active. Every message you send passes through this node."),
    anyone("The email system is yours now. Use it carefully."),
];

const GREETING_LINES: &[Line] = &[
    by_trait(Trait::Formal, "Greetings, {username}."),
    by_trait(Trait::Formal, "Hello. Your message has been received."),
    by_trait(Trait::Formal, "Salutations."),
    by_trait(Trait::Casual, "Hey {username}!"),
    by_trait(Trait::Casual, "Hi there!"),
    by_trait(Trait::Casual, "What's up?"),
    by_trait(Trait::Mysterious, "Greetings, {username}. I've been monitoring your transmissions."),
    by_trait(Trait::Mysterious, "Hello. I see you've connected."),
    by_trait(Trait::Friendly, "Hey {username}! Good to hear from you!"),
    by_trait(Trait::Friendly, "Hi! How's it going?"),
    by_trait(Trait::Friendly, "Hello! What's on your mind?"),
];

const THANKS_LINES: &[Line] = &[
    by_trait(Trait::Friendly, "You're welcome, {username}!"),
    by_trait(Trait::Friendly, "Happy to help!"),
    by_trait(Trait::Friendly, "Anytime!"),
    by_trait(Trait::Formal, "Acknowledgment received."),
    by_trait(Trait::Formal, "No thanks necessary."),
    by_trait(Trait::Mysterious, "No gratitude necessary. We serve the same cause."),
    by_trait(Trait::Mysterious, "Your appreciation is noted. Stay vigilant."),
    anyone("You're welcome."),
];

const QUESTION_LINES: &[Line] = &[
    by_trait(Trait::Mysterious, "That is classified information. I can only reveal what you're cleared to know."),
    by_trait(Trait::Mysterious, "Interesting question. The answer may not be what you expect."),
    by_trait(Trait::Mysterious, "Query received. Accessing database... Results are inconclusive."),
    by_trait(Trait::Technical, "Let me analyze that... The technical details are complex."),
    by_trait(Trait::Technical, "That's a technical question. I can help, but it might get complicated."),
    by_trait(Trait::Friendly, "Good question, {username}! Let me think..."),
    by_trait(Trait::Friendly, "Hmm, that's interesting. Let me see if I can help."),
    by_trait(Trait::Friendly, "I'm not entirely sure, but I can try to help you figure it out."),
    anyone("I'm not sure how to answer that."),
];

const FALLBACK_LINES: &[Line] = &[
    by_character("glyphis", "Your message has been logged. Expect further instructions soon."),
    by_character("glyphis", "Interesting perspective. I'll forward this to the higher channels."),
    by_character("glyphis", "I've decrypted your message. The pattern is becoming clearer."),
    by_character("glyphis", "Your theories are... intriguing."),
    by_character("glyphis", "Message received. Trust no one. Question everything."),
    by_character("glyphis", "I see you're beginning to understand. Keep digging deeper."),
    by_character("rain", "Hey {username}, got it. Let me know if you need anything."),
    by_character("rain", "Noted! I'll keep that in mind."),
    by_character("rain", "Thanks for the update. I'm here if you need me."),
    by_character("rain", "Got it. Anything else?"),
    by_character("jaxkando", "COOL! Thanks for letting me know!"),
    by_character("jaxkando", "AWESOME! Keep me posted!"),
    by_character("jaxkando", "GOT IT! Want to play some games?"),
    by_character("jaxkando", "THANKS FOR THE UPDATE!"),
    by_character("uncle-am", "thanks for letting me know, {username}."),
    by_character("uncle-am", "i appreciate you reaching out."),
    by_character("uncle-am", "got it. i'm here if you need anything."),
    by_character("uncle-am", "thanks for keeping me in the loop."),
];

fn area_lines(area: Area) -> &'static [Line] {
    match area {
        Area::Games => GAMES_LINES,
        Area::UrgentOps => OPS_LINES,
        Area::TeamInfo => TEAM_LINES,
        Area::PirateRadio => RADIO_LINES,
        Area::Email => EMAIL_LINES,
    }
}

/// Hint appended to help pools when the player names an unlocked area.
fn area_hint(area: Area) -> Option<&'static str> {
    match area {
        Area::Games => Some("Check out the Games module - there's plenty to explore there."),
        Area::UrgentOps => Some("The Urgent Ops module has missions if you're looking for work."),
        Area::TeamInfo => Some("Team Info has dossiers on all of us if you want to know more."),
        Area::PirateRadio => Some("Pirate Radio is unlocked - tune in to hear what's happening."),
        Area::Email => None,
    }
}

/// The host's nudge toward an area the player holds.
fn host_invite(area: Area) -> Option<&'static str> {
    match area {
        Area::Games => Some("You've got access to the Games module - come play SIMULACRA_CORE with me!"),
        Area::UrgentOps => Some("If you're looking for work, check out Urgent Ops - I've got missions posted there."),
        Area::PirateRadio => Some("pirate radio is unlocked if you want to tune in. i'm always broadcasting."),
        Area::TeamInfo | Area::Email => None,
    }
}

/// An outgoing player message addressed to an NPC.
#[derive(Debug, Clone, Copy)]
pub struct Outgoing<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

/// One remembered exchange with an NPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub subject: String,
    pub body: String,
    pub kind: TriggerKind,
    pub reply_id: String,
}

/// A generated reply and the class that produced it.
#[derive(Debug, Clone)]
pub struct Reply {
    pub email: Email,
    pub kind: TriggerKind,
}

/// Trait-weighted reply generator over a roster of characters.
pub struct NpcResponder {
    roster: Roster,
    rng: StdRng,
    history: HashMap<String, VecDeque<Exchange>>,
}

impl NpcResponder {
    /// `seed` pins the flavor-text draw; `None` seeds from entropy.
    pub fn new(roster: Roster, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            roster,
            rng,
            history: HashMap::new(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn knows(&self, address: &str) -> bool {
        self.roster.contains(address)
    }

    /// Past exchanges with `address`, oldest first.
    pub fn history(&self, address: &str) -> Vec<&Exchange> {
        self.history
            .get(&address.trim().to_lowercase())
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    /// Generate the reply to `msg`.
    ///
    /// Fails with `UnknownCharacter` when `msg.to` has no profile.
    pub fn respond(
        &mut self,
        msg: &Outgoing<'_>,
        tokens: &TokenSnapshot,
        handle: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply> {
        let profile = self
            .roster
            .get(msg.to)
            .cloned()
            .ok_or_else(|| ProgressionError::UnknownCharacter(msg.to.to_string()))?;

        let text = normalize_message(msg.subject, msg.body);
        let kind = classify(&text, tokens);
        let pool = candidates(&profile, kind, &text, tokens);
        let chosen = self.pick(&pool);

        let subs = Substitutions::for_player(handle).with("USERNAME", handle.to_uppercase());
        let body = compose(&profile, &subs.apply(chosen));
        debug!(
            "{} replied to '{}' as {}",
            profile.name,
            escape_log(msg.subject),
            kind
        );

        let subject = if msg.subject.trim().is_empty() {
            "(no subject)"
        } else {
            msg.subject.trim()
        };
        let email = Email {
            id: format!("reply-{}", Uuid::new_v4()),
            sender: profile.address.to_string(),
            recipient: handle.to_string(),
            subject: format!("RE: {}", subject),
            body,
            timestamp: narrative_stamp(now),
            read: false,
        };

        let past = self.history.entry(profile.address.to_lowercase()).or_default();
        if past.len() == HISTORY_LIMIT {
            past.pop_front();
        }
        past.push_back(Exchange {
            subject: msg.subject.to_string(),
            body: msg.body.to_string(),
            kind,
            reply_id: email.id.clone(),
        });

        Ok(Reply { email, kind })
    }

    fn pick<'p>(&mut self, pool: &[(&'p str, f32)]) -> &'p str {
        let weights: Vec<(usize, u32)> = pool
            .iter()
            .enumerate()
            .map(|(idx, (_, w))| (idx, ((w * 100.0).round() as u32).max(1)))
            .collect();
        match choose_weighted(&weights, &mut self.rng) {
            Some(idx) => pool[idx].0,
            None => LAST_RESORT,
        }
    }
}

/// Cumulative roll over integer weights. `None` for an empty pool.
fn choose_weighted<R: Rng>(weights: &[(usize, u32)], rng: &mut R) -> Option<usize> {
    let total: u32 = weights.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total);
    let mut current = 0;
    for (idx, weight) in weights {
        current += *weight;
        if roll < current {
            return Some(*idx);
        }
    }
    weights.first().map(|(idx, _)| *idx)
}

/// Weighted lines a character may use for `kind`, before placeholders.
fn candidates(
    profile: &CharacterProfile,
    kind: TriggerKind,
    text: &str,
    tokens: &TokenSnapshot,
) -> Vec<(&'static str, f32)> {
    let mut pool = match kind {
        TriggerKind::HelpRequest => weighted(profile, HELP_LINES),
        TriggerKind::IdentityRequest => weighted(profile, IDENTITY_LINES),
        TriggerKind::WellBeing => weighted(profile, WELL_BEING_LINES),
        TriggerKind::UnlockedArea(area) => weighted(profile, area_lines(area)),
        TriggerKind::Greeting => weighted(profile, GREETING_LINES),
        TriggerKind::Thanks => weighted(profile, THANKS_LINES),
        TriggerKind::Question => weighted(profile, QUESTION_LINES),
        TriggerKind::Fallback => weighted(profile, FALLBACK_LINES),
    };

    match kind {
        TriggerKind::HelpRequest => {
            if let Some(area) = mentioned_area(text, tokens) {
                pool.extend(area_hint(area).map(|h| (h, 1.0)));
            } else if let Some(area) = latest_unlocked_area(tokens) {
                if area.host() == Some(profile.name) {
                    pool.extend(host_invite(area).map(|h| (h, 1.0)));
                }
            }
        }
        TriggerKind::Fallback => {
            for area in Area::MENTION_ORDER {
                if area.host() == Some(profile.name) && area.is_unlocked(tokens) {
                    pool.extend(host_invite(area).map(|h| (h, 1.0)));
                }
            }
            if pool.is_empty() {
                pool.extend(profile.catchphrases.iter().map(|c| (*c, 1.0)));
            }
        }
        _ => {}
    }
    pool
}

/// Lines voiced by the profile's traits or by the character itself; generic
/// lines only when nothing more specific applies.
fn weighted(profile: &CharacterProfile, lines: &'static [Line]) -> Vec<(&'static str, f32)> {
    let specific: Vec<(&'static str, f32)> = lines
        .iter()
        .filter_map(|line| match line.voice {
            Voice::Trait(t) => profile.weight(t).map(|w| (line.text, w)),
            Voice::Character(name) if name == profile.name => Some((line.text, profile.max_weight())),
            _ => None,
        })
        .collect();
    if !specific.is_empty() {
        return specific;
    }
    lines
        .iter()
        .filter(|line| matches!(line.voice, Voice::Anyone))
        .map(|line| (line.text, 1.0))
        .collect()
}

/// Wrap `chosen` in greeting and closing, split into body lines.
///
/// Paragraphs are separated by one blank line. The greeting is skipped when
/// the text already opens with it and the closing when it already ends with it.
fn compose(profile: &CharacterProfile, chosen: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = chosen
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let opens_with_greeting = paragraphs
        .first()
        .map_or(false, |p| p.to_lowercase().starts_with(&profile.greeting.to_lowercase()));
    if !opens_with_greeting && !profile.greeting.is_empty() {
        paragraphs.insert(0, profile.greeting.to_string());
    }
    let ends_with_closing = paragraphs
        .last()
        .map_or(false, |p| p.trim_end().ends_with(profile.closing));
    if !ends_with_closing && !profile.closing.is_empty() {
        paragraphs.push(profile.closing.to_string());
    }
    if paragraphs.is_empty() {
        paragraphs.push(LAST_RESORT.to_string());
    }

    let mut lines = Vec::new();
    for (i, para) in paragraphs.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(para.lines().map(str::to_string));
    }
    lines
}
