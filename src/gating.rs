//! Board module gating.
//!
//! Each main-menu module is unlocked by a single token. LOGOUT is always
//! available. Locked modules show [`lock_hint`] instead of their content.

use crate::tokens::{catalogue, TokenSnapshot};
use std::fmt;

/// Main-menu modules of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardModule {
    EmailSystem,
    Games,
    UrgentOps,
    TeamInfo,
    PirateRadio,
    Logout,
}

impl BoardModule {
    /// Menu order.
    pub const ALL: [BoardModule; 6] = [
        BoardModule::EmailSystem,
        BoardModule::Games,
        BoardModule::UrgentOps,
        BoardModule::TeamInfo,
        BoardModule::PirateRadio,
        BoardModule::Logout,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            BoardModule::EmailSystem => "EMAIL SYSTEM",
            BoardModule::Games => "GAMES",
            BoardModule::UrgentOps => "URGENT OPS",
            BoardModule::TeamInfo => "TEAM INFO",
            BoardModule::PirateRadio => "PIRATE RADIO",
            BoardModule::Logout => "LOGOUT",
        }
    }

    /// Token that unlocks the module; `None` for modules never locked.
    pub fn required_token(&self) -> Option<&'static str> {
        match self {
            BoardModule::EmailSystem => Some(catalogue::PSEM),
            BoardModule::Games => Some(catalogue::GAMES1),
            BoardModule::UrgentOps => Some(catalogue::AUDIO1),
            BoardModule::TeamInfo => Some(catalogue::TEAM_ACCESS),
            BoardModule::PirateRadio => Some(catalogue::RADIO_ACCESS),
            BoardModule::Logout => None,
        }
    }

    pub fn is_unlocked(&self, tokens: &TokenSnapshot) -> bool {
        self.required_token().map_or(true, |t| tokens.has(t))
    }
}

impl fmt::Display for BoardModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Shorthand for [`BoardModule::is_unlocked`].
pub fn is_unlocked(module: BoardModule, tokens: &TokenSnapshot) -> bool {
    module.is_unlocked(tokens)
}

/// Message shown in place of a locked module.
pub fn lock_hint(_module: BoardModule, handle: &str) -> String {
    format!("System integrity preserved. {} remains outside.", handle)
}

/// `(module, unlocked)` for every module in menu order.
pub fn menu(tokens: &TokenSnapshot) -> Vec<(BoardModule, bool)> {
    BoardModule::ALL
        .iter()
        .map(|m| (*m, m.is_unlocked(tokens)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Token;

    fn tokens(codes: &[&str]) -> TokenSnapshot {
        codes.iter().map(|c| Token::parse(c).unwrap()).collect()
    }

    #[test]
    fn fresh_player_only_has_logout() {
        let open: Vec<BoardModule> = menu(&tokens(&[]))
            .into_iter()
            .filter(|(_, unlocked)| *unlocked)
            .map(|(m, _)| m)
            .collect();
        assert_eq!(open, vec![BoardModule::Logout]);
    }

    #[test]
    fn each_module_opens_with_its_token() {
        assert!(is_unlocked(BoardModule::EmailSystem, &tokens(&["psem"])));
        assert!(is_unlocked(BoardModule::Games, &tokens(&["GAMES1"])));
        assert!(is_unlocked(BoardModule::UrgentOps, &tokens(&["AUDIO1"])));
        assert!(!is_unlocked(BoardModule::UrgentOps, &tokens(&["LAPC1"])));
        assert!(is_unlocked(BoardModule::TeamInfo, &tokens(&["TEAM_ACCESS"])));
        assert!(is_unlocked(BoardModule::PirateRadio, &tokens(&["RADIO_ACCESS"])));
    }

    #[test]
    fn lock_hint_names_the_player() {
        assert_eq!(
            lock_hint(BoardModule::Games, "operative"),
            "System integrity preserved. operative remains outside."
        );
    }
}
