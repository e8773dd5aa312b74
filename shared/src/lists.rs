//! Count-prefixed list grammar used by player and grouping style payloads
//!
//! ```text
//! paramCount, name_1 .. name_paramCount, itemCount, (value_1 .. value_paramCount) x itemCount
//! ```
//!
//! Decoding is total: a non-numeric count yields an empty list and a payload
//! shorter than it claims yields the records that were complete.

use serde::{Deserialize, Serialize};

/// One record of a decoded list: values keyed by the parameter names the
/// payload declared, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    fields: Vec<(String, String)>,
}

impl ListRecord {
    pub fn new<N, V>(names: &[N], values: &[V]) -> Self
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            fields: names
                .iter()
                .zip(values)
                .map(|(name, value)| (name.as_ref().to_string(), value.as_ref().to_string()))
                .collect(),
        }
    }

    /// Looks up a field by parameter name, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn parse_count<S: AsRef<str>>(word: Option<&S>) -> Option<usize> {
    word.and_then(|w| w.as_ref().trim().parse::<usize>().ok())
}

/// Decodes a count-prefixed list starting at `words[0]`
pub fn decode_list<S: AsRef<str>>(words: &[S]) -> Vec<ListRecord> {
    let Some(param_count) = parse_count(words.first()) else {
        return Vec::new();
    };
    if param_count == 0 || param_count >= words.len() {
        return Vec::new();
    }

    let Some(names) = words.get(1..1 + param_count) else {
        return Vec::new();
    };
    let Some(item_count) = parse_count(words.get(1 + param_count)) else {
        return Vec::new();
    };

    let values = &words[2 + param_count..];
    values
        .chunks_exact(param_count)
        .take(item_count)
        .map(|chunk| ListRecord::new(names, chunk))
        .collect()
}

/// Encodes records under the given parameter names. Records missing a name
/// contribute an empty word for it.
pub fn encode_list<N: AsRef<str>>(names: &[N], records: &[ListRecord]) -> Vec<String> {
    let mut words = Vec::with_capacity(2 + names.len() * (records.len() + 1));
    words.push(names.len().to_string());
    words.extend(names.iter().map(|name| name.as_ref().to_string()));
    words.push(records.len().to_string());

    for record in records {
        for name in names {
            words.push(record.get(name.as_ref()).unwrap_or_default().to_string());
        }
    }

    words
}

/// Player row of a player list. Unknown or non-numeric columns fall back to
/// defaults so one odd column never discards a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub guid: String,
    pub clan_tag: String,
    pub team_id: u32,
    pub squad_id: u32,
    pub kills: i32,
    pub deaths: i32,
    pub score: i32,
    pub ping: u32,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_record(record: &ListRecord) -> Self {
        fn text(record: &ListRecord, name: &str) -> String {
            record.get(name).unwrap_or_default().to_string()
        }
        fn number<T: std::str::FromStr + Default>(record: &ListRecord, name: &str) -> T {
            record
                .get(name)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default()
        }

        Self {
            name: text(record, "name"),
            guid: text(record, "guid"),
            clan_tag: text(record, "clanTag"),
            team_id: number(record, "teamId"),
            squad_id: number(record, "squadId"),
            kills: number(record, "kills"),
            deaths: number(record, "deaths"),
            score: number(record, "score"),
            ping: number(record, "ping"),
        }
    }

    /// Values for the given column names, in order
    pub fn to_record<N: AsRef<str>>(&self, names: &[N]) -> ListRecord {
        let values: Vec<String> = names
            .iter()
            .map(|name| match name.as_ref().to_ascii_lowercase().as_str() {
                "name" => self.name.clone(),
                "guid" => self.guid.clone(),
                "clantag" => self.clan_tag.clone(),
                "teamid" => self.team_id.to_string(),
                "squadid" => self.squad_id.to_string(),
                "kills" => self.kills.to_string(),
                "deaths" => self.deaths.to_string(),
                "score" => self.score.to_string(),
                "ping" => self.ping.to_string(),
                _ => String::new(),
            })
            .collect();
        ListRecord::new(names, values.as_slice())
    }
}

/// Decodes a player list payload (the words after the status token)
pub fn decode_players<S: AsRef<str>>(words: &[S]) -> Vec<Player> {
    decode_list(words).iter().map(Player::from_record).collect()
}
