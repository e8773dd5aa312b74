//! Per-generation protocol strategies
//!
//! The set of supported game generations is closed and chosen by static
//! configuration. Each variant knows how to turn a [`NetworkAction`] into the
//! packets its servers understand and how its list payloads are laid out.

use rcon_shared::{tokenize, BanLayout, Packet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::action::{ActionKind, NetworkAction};

/// Turns a logical action into 1..N request packets
pub trait ActionTranslator {
    fn translate(&self, action: &NetworkAction) -> Vec<Packet>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Bad Company 2 / Medal of Honor generation
    Frostbite1,
    /// Battlefield 3 / Battlefield 4 generation
    #[default]
    Frostbite2,
}

impl ProtocolVariant {
    pub fn ban_layout(self) -> BanLayout {
        match self {
            Self::Frostbite1 => BanLayout::FiveWord,
            Self::Frostbite2 => BanLayout::SixWord,
        }
    }

    pub fn list_players_request(self) -> Packet {
        Packet::request(["admin.listPlayers", "all"])
    }

    pub fn list_maps_request(self) -> Packet {
        Packet::request(["mapList.list"])
    }

    pub fn list_bans_request(self) -> Packet {
        Packet::request(["banList.list"])
    }

    fn map_change(self, index: Option<u32>) -> Vec<Packet> {
        let (set_next, run_next) = match self {
            Self::Frostbite1 => ("mapList.nextLevelIndex", "admin.runNextLevel"),
            Self::Frostbite2 => ("mapList.setNextMapIndex", "mapList.runNextRound"),
        };

        let mut packets = Vec::with_capacity(2);
        if let Some(index) = index {
            packets.push(Packet::request([set_next.to_string(), index.to_string()]));
        }
        packets.push(Packet::request([run_next]));
        packets
    }
}

impl ActionTranslator for ProtocolVariant {
    fn translate(&self, action: &NetworkAction) -> Vec<Packet> {
        let text = action.text();
        let players = &action.scope.players;

        match &action.kind {
            ActionKind::Kick => players
                .iter()
                .map(|player| {
                    let mut words = vec!["admin.kickPlayer".to_string(), player.clone()];
                    if !text.is_empty() {
                        words.push(text.clone());
                    }
                    Packet::request(words)
                })
                .collect(),
            ActionKind::Ban { duration } => {
                let mut packets: Vec<Packet> = players
                    .iter()
                    .map(|player| {
                        let mut words = vec!["banList.add".to_string(), "name".to_string(), player.clone()];
                        words.extend(duration.to_words());
                        if !text.is_empty() {
                            words.push(text.clone());
                        }
                        Packet::request(words)
                    })
                    .collect();
                if !packets.is_empty() {
                    packets.push(Packet::request(["banList.save"]));
                }
                packets
            }
            ActionKind::Say => rcon_shared::encode_subsets(&action.scope.groups)
                .into_iter()
                .map(|subset| {
                    let mut words = vec!["admin.say".to_string(), text.clone()];
                    words.extend(subset);
                    Packet::request(words)
                })
                .collect(),
            ActionKind::Move {
                team_id,
                squad_id,
                force_kill,
            } => players
                .iter()
                .map(|player| {
                    Packet::request([
                        "admin.movePlayer".to_string(),
                        player.clone(),
                        team_id.to_string(),
                        squad_id.to_string(),
                        force_kill.to_string(),
                    ])
                })
                .collect(),
            ActionKind::MapChange => self.map_change(action.scope.maps.first().copied()),
            ActionKind::Raw => {
                let words = tokenize(&text);
                if words.is_empty() {
                    Vec::new()
                } else {
                    vec![Packet::request(words)]
                }
            }
        }
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frostbite1" | "bfbc2" | "moh" => Ok(Self::Frostbite1),
            "frostbite2" | "bf3" | "bf4" => Ok(Self::Frostbite2),
            other => Err(format!("unknown protocol variant '{}'", other)),
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frostbite1 => write!(f, "frostbite1"),
            Self::Frostbite2 => write!(f, "frostbite2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_shared::{BanDuration, Grouping};

    fn words(packets: &[Packet]) -> Vec<Vec<String>> {
        packets.iter().map(|p| p.words.clone()).collect()
    }

    #[test]
    fn test_kick_translates_per_player() {
        let action = NetworkAction::kick("Phogue", "Team killing").with_player("Zaeed");
        let packets = ProtocolVariant::Frostbite2.translate(&action);
        assert_eq!(
            words(&packets),
            vec![
                vec!["admin.kickPlayer", "Phogue", "Team killing"],
                vec!["admin.kickPlayer", "Zaeed", "Team killing"],
            ]
        );
        assert!(packets.iter().all(|p| p.sequence().is_none()));
    }

    #[test]
    fn test_ban_appends_save() {
        let action = NetworkAction::ban("Phogue", BanDuration::Seconds(600), "");
        let packets = ProtocolVariant::Frostbite2.translate(&action);
        assert_eq!(
            words(&packets),
            vec![
                vec!["banList.add", "name", "Phogue", "seconds", "600"],
                vec!["banList.save"],
            ]
        );
    }

    #[test]
    fn test_say_targets_each_subset() {
        let action = NetworkAction::say(
            "hello",
            vec![Grouping::team(1), Grouping::squad(2), Grouping::player("Phogue")],
        );
        let packets = ProtocolVariant::Frostbite1.translate(&action);
        assert_eq!(
            words(&packets),
            vec![
                vec!["admin.say", "hello", "squad", "1", "2"],
                vec!["admin.say", "hello", "player", "Phogue"],
            ]
        );
    }

    #[test]
    fn test_say_without_groups_goes_to_all() {
        let packets = ProtocolVariant::Frostbite2.translate(&NetworkAction::say("hi", vec![]));
        assert_eq!(words(&packets), vec![vec!["admin.say", "hi", "all"]]);
    }

    #[test]
    fn test_say_to_squad_without_team_is_not_broadcast() {
        let action = NetworkAction::say("secret plan", vec![Grouping::squad(3)]);
        assert!(ProtocolVariant::Frostbite2.translate(&action).is_empty());
        assert!(ProtocolVariant::Frostbite1.translate(&action).is_empty());
    }

    #[test]
    fn test_move_player() {
        let packets = ProtocolVariant::Frostbite2.translate(&NetworkAction::move_player("Phogue", 2, 0, true));
        assert_eq!(words(&packets), vec![vec!["admin.movePlayer", "Phogue", "2", "0", "true"]]);
    }

    #[test]
    fn test_map_change_differs_per_generation() {
        let action = NetworkAction::map_change(Some(4));
        assert_eq!(
            words(&ProtocolVariant::Frostbite2.translate(&action)),
            vec![vec!["mapList.setNextMapIndex", "4"], vec!["mapList.runNextRound"]]
        );
        assert_eq!(
            words(&ProtocolVariant::Frostbite1.translate(&NetworkAction::map_change(None))),
            vec![vec!["admin.runNextLevel"]]
        );
    }

    #[test]
    fn test_raw_is_tokenized() {
        let packets = ProtocolVariant::Frostbite2.translate(&NetworkAction::raw(r#"admin.say "hi all" all"#));
        assert_eq!(words(&packets), vec![vec!["admin.say", "hi all", "all"]]);
        assert!(ProtocolVariant::Frostbite2.translate(&NetworkAction::raw("  ")).is_empty());
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("BF3".parse::<ProtocolVariant>(), Ok(ProtocolVariant::Frostbite2));
        assert_eq!("bfbc2".parse::<ProtocolVariant>(), Ok(ProtocolVariant::Frostbite1));
        assert!("quake".parse::<ProtocolVariant>().is_err());
        assert_eq!(ProtocolVariant::Frostbite1.ban_layout(), BanLayout::FiveWord);
    }
}
