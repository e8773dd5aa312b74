//! Map list payloads: `mapsCount, wordsPerMap, (name, gameMode, roundsRaw, ...) x mapsCount`

use serde::{Deserialize, Serialize};

/// Rounds a map plays when the server reports zero
pub const DEFAULT_ROUNDS: u32 = 2;

/// Words every map record carries regardless of what `wordsPerMap` claims
const MAP_RECORD_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub index: usize,
    pub name: String,
    pub game_mode: String,
    pub rounds: u32,
}

impl MapEntry {
    pub fn new(index: usize, name: impl Into<String>, game_mode: impl Into<String>, rounds: u32) -> Self {
        Self {
            index,
            name: name.into(),
            game_mode: game_mode.into(),
            rounds: if rounds == 0 { DEFAULT_ROUNDS } else { rounds },
        }
    }
}

/// Decodes a map list. Records are at least three words wide; wider records
/// (a larger `wordsPerMap`) have their extra words skipped.
pub fn decode_maps<S: AsRef<str>>(words: &[S]) -> Vec<MapEntry> {
    let count = |index: usize| {
        words
            .get(index)
            .and_then(|w| w.as_ref().trim().parse::<usize>().ok())
    };
    let (Some(maps_count), Some(words_per_map)) = (count(0), count(1)) else {
        return Vec::new();
    };

    let stride = words_per_map.max(MAP_RECORD_WIDTH);
    let Some(records) = words.get(2..) else {
        return Vec::new();
    };

    records
        .chunks(stride)
        .take(maps_count)
        .take_while(|record| record.len() >= MAP_RECORD_WIDTH)
        .enumerate()
        .map(|(index, record)| {
            let rounds = record[2].as_ref().trim().parse::<u32>().unwrap_or(0);
            MapEntry::new(index, record[0].as_ref(), record[1].as_ref(), rounds)
        })
        .collect()
}

pub fn encode_maps(maps: &[MapEntry]) -> Vec<String> {
    let mut words = Vec::with_capacity(2 + maps.len() * MAP_RECORD_WIDTH);
    words.push(maps.len().to_string());
    words.push(MAP_RECORD_WIDTH.to_string());
    for map in maps {
        words.push(map.name.clone());
        words.push(map.game_mode.clone());
        words.push(map.rounds.to_string());
    }
    words
}
