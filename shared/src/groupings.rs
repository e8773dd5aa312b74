//! Player subsets (`all`, `team 1`, `squad 1 2`, `player Phogue`)
//!
//! Decoding falls back to [`GroupingKind::All`] whenever the kind or one of
//! its ids cannot be parsed.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupingKind {
    All,
    Team,
    Squad,
    Player,
}

impl GroupingKind {
    pub fn as_word(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Team => "team",
            Self::Squad => "squad",
            Self::Player => "player",
        }
    }
}

impl FromStr for GroupingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "team" => Ok(Self::Team),
            "squad" => Ok(Self::Squad),
            "player" => Ok(Self::Player),
            other => Err(format!("unknown player subset '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grouping {
    pub kind: GroupingKind,
    pub id: Option<String>,
}

impl Grouping {
    pub fn all() -> Self {
        Self {
            kind: GroupingKind::All,
            id: None,
        }
    }

    pub fn team(team_id: u32) -> Self {
        Self {
            kind: GroupingKind::Team,
            id: Some(team_id.to_string()),
        }
    }

    pub fn squad(squad_id: u32) -> Self {
        Self {
            kind: GroupingKind::Squad,
            id: Some(squad_id.to_string()),
        }
    }

    pub fn player(name: impl Into<String>) -> Self {
        Self {
            kind: GroupingKind::Player,
            id: Some(name.into()),
        }
    }
}

fn parse_id<S: AsRef<str>>(word: Option<&S>) -> Option<u32> {
    word.and_then(|w| w.as_ref().trim().parse::<u32>().ok())
}

/// Decodes a subset selector. A squad selector yields its team grouping
/// followed by the squad grouping.
pub fn decode_groupings<S: AsRef<str>>(words: &[S]) -> Vec<Grouping> {
    let kind = words
        .first()
        .and_then(|w| w.as_ref().parse::<GroupingKind>().ok())
        .unwrap_or(GroupingKind::All);

    let decoded = match kind {
        GroupingKind::All => None,
        GroupingKind::Team => parse_id(words.get(1)).map(|team| vec![Grouping::team(team)]),
        GroupingKind::Squad => parse_id(words.get(1))
            .zip(parse_id(words.get(2)))
            .map(|(team, squad)| vec![Grouping::team(team), Grouping::squad(squad)]),
        GroupingKind::Player => words
            .get(1)
            .map(|name| vec![Grouping::player(name.as_ref())]),
    };

    decoded.unwrap_or_else(|| vec![Grouping::all()])
}

/// Encodes groupings as one subset selector per target. A team grouping
/// directly followed by a squad grouping becomes a single squad selector;
/// a squad without its team cannot be addressed and is skipped. Only an
/// empty slice addresses everyone.
pub fn encode_subsets(groupings: &[Grouping]) -> Vec<Vec<String>> {
    if groupings.is_empty() {
        return vec![vec![GroupingKind::All.as_word().to_string()]];
    }

    let mut subsets = Vec::new();
    let mut iter = groupings.iter().peekable();

    while let Some(grouping) = iter.next() {
        let id = grouping.id.clone().unwrap_or_default();
        match grouping.kind {
            GroupingKind::All => subsets.push(vec![GroupingKind::All.as_word().to_string()]),
            GroupingKind::Team => match iter.peek() {
                Some(next) if next.kind == GroupingKind::Squad => {
                    let squad = next.id.clone().unwrap_or_default();
                    iter.next();
                    subsets.push(vec![GroupingKind::Squad.as_word().to_string(), id, squad]);
                }
                _ => subsets.push(vec![GroupingKind::Team.as_word().to_string(), id]),
            },
            GroupingKind::Squad => {
                log::warn!("Squad grouping {} has no team, skipping", id);
            }
            GroupingKind::Player => {
                subsets.push(vec![GroupingKind::Player.as_word().to_string(), id])
            }
        }
    }
    subsets
}
