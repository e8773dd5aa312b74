//! Ban list payloads
//!
//! Ban lists are fixed-width records without a header. The width depends on
//! the game generation, see [`BanLayout`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BanDuration {
    Permanent,
    Seconds(u64),
    Rounds(u32),
}

impl BanDuration {
    /// Words used by `banList.add` to describe this duration
    pub fn to_words(self) -> Vec<String> {
        match self {
            Self::Permanent => vec!["perm".to_string()],
            Self::Seconds(seconds) => vec!["seconds".to_string(), seconds.to_string()],
            Self::Rounds(rounds) => vec!["rounds".to_string(), rounds.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    /// `name`, `ip`, `guid` or whatever the server reports
    pub id_type: String,
    pub id: String,
    pub duration: BanDuration,
    pub reason: String,
}

/// Record layout of a ban list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BanLayout {
    /// `idType, id, banType, time, reason`
    FiveWord,
    /// `idType, id, banType, seconds, rounds, reason`
    SixWord,
}

impl BanLayout {
    pub fn width(self) -> usize {
        match self {
            Self::FiveWord => 5,
            Self::SixWord => 6,
        }
    }
}

fn duration_from(ban_type: &str, seconds: &str, rounds: &str) -> BanDuration {
    match ban_type.to_ascii_lowercase().as_str() {
        "seconds" => BanDuration::Seconds(seconds.trim().parse().unwrap_or(0)),
        "rounds" => BanDuration::Rounds(rounds.trim().parse().unwrap_or(0)),
        _ => BanDuration::Permanent,
    }
}

/// Decodes consecutive ban records; a trailing partial record is ignored
pub fn decode_bans<S: AsRef<str>>(words: &[S], layout: BanLayout) -> Vec<Ban> {
    words
        .chunks_exact(layout.width())
        .map(|record| {
            let word = |i: usize| record[i].as_ref();
            let (duration, reason) = match layout {
                BanLayout::FiveWord => (duration_from(word(2), word(3), word(3)), word(4)),
                BanLayout::SixWord => (duration_from(word(2), word(3), word(4)), word(5)),
            };
            Ban {
                id_type: word(0).to_string(),
                id: word(1).to_string(),
                duration,
                reason: reason.to_string(),
            }
        })
        .collect()
}

pub fn encode_bans(bans: &[Ban], layout: BanLayout) -> Vec<String> {
    let mut words = Vec::with_capacity(bans.len() * layout.width());
    for ban in bans {
        words.push(ban.id_type.clone());
        words.push(ban.id.clone());
        let (ban_type, seconds, rounds) = match ban.duration {
            BanDuration::Permanent => ("perm", 0, 0),
            BanDuration::Seconds(seconds) => ("seconds", seconds, 0),
            BanDuration::Rounds(rounds) => ("rounds", 0, u64::from(rounds)),
        };
        words.push(ban_type.to_string());
        match layout {
            BanLayout::FiveWord => words.push(seconds.max(rounds).to_string()),
            BanLayout::SixWord => {
                words.push(seconds.to_string());
                words.push(rounds.to_string());
            }
        }
        words.push(ban.reason.clone());
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_six_word_bans() {
        let bans = decode_bans(
            &[
                "name", "Phogue", "perm", "0", "0", "Cheating",
                "guid", "EA_1", "seconds", "3600", "0", "Spam",
                "ip", "10.0.0.1", "rounds", "0", "2", "",
            ],
            BanLayout::SixWord,
        );

        assert_eq!(bans.len(), 3);
        assert_eq!(bans[0].duration, BanDuration::Permanent);
        assert_eq!(bans[0].reason, "Cheating");
        assert_eq!(bans[1].duration, BanDuration::Seconds(3600));
        assert_eq!(bans[2].duration, BanDuration::Rounds(2));
        assert_eq!(bans[2].id_type, "ip");
    }

    #[test]
    fn test_decode_five_word_bans() {
        let bans = decode_bans(
            &["name", "Phogue", "rounds", "3", "Teamkilling", "name", "trailing"],
            BanLayout::FiveWord,
        );
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].duration, BanDuration::Rounds(3));
    }

    #[test]
    fn test_unknown_ban_type_is_permanent() {
        let bans = decode_bans(&["name", "x", "forever", "oops", "r"], BanLayout::FiveWord);
        assert_eq!(bans[0].duration, BanDuration::Permanent);
    }

    #[test]
    fn test_encode_then_decode_round_trips() {
        let bans = vec![
            Ban {
                id_type: "name".to_string(),
                id: "Phogue".to_string(),
                duration: BanDuration::Seconds(60),
                reason: "Language".to_string(),
            },
            Ban {
                id_type: "guid".to_string(),
                id: "EA_2".to_string(),
                duration: BanDuration::Rounds(1),
                reason: String::new(),
            },
        ];

        for layout in [BanLayout::FiveWord, BanLayout::SixWord] {
            assert_eq!(decode_bans(&encode_bans(&bans, layout), layout), bans);
        }
    }
}
