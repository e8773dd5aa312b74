//! The scripted game behind the mock server
//!
//! [`MockGame`] answers the administrative commands a real server would,
//! against a small in-memory roster, map rotation and ban list. Commands that
//! change the roster or the level also produce events that the network layer
//! pushes to sessions which enabled them.

use log::{debug, info};
use rcon_shared::{
    decode_groupings, encode_bans, encode_list, encode_maps, Ban, BanDuration, BanLayout, MapEntry,
    Packet, Player, OK,
};

use crate::session::Session;

pub const PLAYER_COLUMNS: [&str; 8] = [
    "name", "guid", "teamId", "squadId", "kills", "deaths", "score", "ping",
];

/// Commands that work without logging in
const PUBLIC_COMMANDS: [&str; 4] = ["login.plainText", "logout", "version", "serverInfo"];

/// What a request produced: the response words and any events to broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub words: Vec<String>,
    pub events: Vec<Vec<String>>,
}

impl Reply {
    fn status(status: &str) -> Self {
        Self {
            words: vec![status.to_string()],
            events: Vec::new(),
        }
    }

    fn ok() -> Self {
        Self::status(OK)
    }

    fn ok_with(payload: Vec<String>) -> Self {
        let mut words = Vec::with_capacity(payload.len() + 1);
        words.push(OK.to_string());
        words.extend(payload);
        Self {
            words,
            events: Vec::new(),
        }
    }

    fn with_event<S: Into<String>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.events.push(words.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockGame {
    pub server_name: String,
    password: String,
    pub max_players: u32,
    pub players: Vec<Player>,
    pub maps: Vec<MapEntry>,
    pub bans: Vec<Ban>,
    pub current_map: usize,
    pub next_map: usize,
    pub round: u32,
    ban_layout: BanLayout,
    saved_bans: usize,
}

impl MockGame {
    /// An empty server
    pub fn new(password: impl Into<String>, ban_layout: BanLayout) -> Self {
        Self {
            server_name: "Mock Frostbite Server".to_string(),
            password: password.into(),
            max_players: 32,
            players: Vec::new(),
            maps: Vec::new(),
            bans: Vec::new(),
            current_map: 0,
            next_map: 0,
            round: 1,
            ban_layout,
            saved_bans: 0,
        }
    }

    /// A server with a few players and a short map rotation
    pub fn populated(password: impl Into<String>, ban_layout: BanLayout) -> Self {
        let mut game = Self::new(password, ban_layout);

        let roster = [("Phogue", 1, 1, 50), ("Zaeed", 1, 2, 20), ("Imisnew2", 2, 1, 10)];
        game.players = roster
            .iter()
            .enumerate()
            .map(|(i, (name, team_id, squad_id, score))| Player {
                guid: format!("EA_{:032X}", i + 1),
                team_id: *team_id,
                squad_id: *squad_id,
                score: *score,
                ping: 40 + i as u32 * 15,
                ..Player::new(*name)
            })
            .collect();

        game.maps = vec![
            MapEntry::new(0, "MP_Subway", "ConquestLarge0", 2),
            MapEntry::new(1, "MP_001", "RushLarge0", 1),
            MapEntry::new(2, "XP1_001", "SquadDeathMatch0", 1),
        ];
        game.next_map = 1;
        game
    }

    pub fn saved_bans(&self) -> usize {
        self.saved_bans
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Answers one client request on behalf of `session`
    pub fn handle(&mut self, session: &mut Session, request: &Packet) -> Reply {
        let Some(command) = request.command() else {
            return Reply::status("UnknownCommand");
        };
        let args = request.arguments();

        if !session.logged_in && !PUBLIC_COMMANDS.contains(&command) {
            return Reply::status("LogInRequired");
        }

        match command {
            "login.plainText" => self.login(session, args),
            "logout" => {
                session.logged_in = false;
                Reply::ok()
            }
            "version" => Reply::ok_with(vec!["BF3".to_string(), "1149".to_string()]),
            "serverInfo" => self.server_info(),
            "admin.eventsEnabled" => match args.first().map(String::as_str) {
                None => Reply::ok_with(vec![session.events_enabled.to_string()]),
                Some("true") => {
                    session.events_enabled = true;
                    Reply::ok()
                }
                Some("false") => {
                    session.events_enabled = false;
                    Reply::ok()
                }
                Some(_) => Reply::status("InvalidArguments"),
            },
            "admin.listPlayers" => self.list_players(),
            "admin.kickPlayer" => self.kick(args),
            "admin.movePlayer" => self.move_player(args),
            "admin.say" => self.say(args),
            "mapList.list" => Reply::ok_with(encode_maps(&self.maps)),
            "mapList.getMapIndices" => {
                Reply::ok_with(vec![self.current_map.to_string(), self.next_map.to_string()])
            }
            "mapList.setNextMapIndex" | "mapList.nextLevelIndex" => self.set_next_map(args),
            "mapList.runNextRound" | "admin.runNextLevel" => self.run_next_round(),
            "mapList.restartRound" | "admin.restartMap" => Reply::ok(),
            "banList.list" => Reply::ok_with(encode_bans(&self.bans, self.ban_layout)),
            "banList.add" => self.add_ban(args),
            "banList.remove" => self.remove_ban(args),
            "banList.clear" => {
                self.bans.clear();
                Reply::ok()
            }
            "banList.save" => {
                self.saved_bans = self.bans.len();
                Reply::ok()
            }
            other => {
                debug!("Unknown command {}", other);
                Reply::status("UnknownCommand")
            }
        }
    }

    fn login(&self, session: &mut Session, args: &[String]) -> Reply {
        match args {
            [password] if *password == self.password => {
                session.logged_in = true;
                info!("Session {} logged in", session.id);
                Reply::ok()
            }
            [_] => Reply::status("InvalidPassword"),
            _ => Reply::status("InvalidArguments"),
        }
    }

    fn server_info(&self) -> Reply {
        let (map, mode, rounds) = self
            .maps
            .get(self.current_map)
            .map(|m| (m.name.clone(), m.game_mode.clone(), m.rounds))
            .unwrap_or_default();

        Reply::ok_with(vec![
            self.server_name.clone(),
            self.players.len().to_string(),
            self.max_players.to_string(),
            mode,
            map,
            self.round.to_string(),
            rounds.to_string(),
        ])
    }

    fn list_players(&self) -> Reply {
        let records: Vec<_> = self
            .players
            .iter()
            .map(|player| player.to_record(&PLAYER_COLUMNS))
            .collect();
        Reply::ok_with(encode_list(&PLAYER_COLUMNS, &records))
    }

    fn remove_player(&mut self, name: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.name != name);
        self.players.len() != before
    }

    fn kick(&mut self, args: &[String]) -> Reply {
        let Some(name) = args.first() else {
            return Reply::status("InvalidArguments");
        };
        if !self.remove_player(name) {
            return Reply::status("PlayerNotFound");
        }

        info!("Kicked {} ({})", name, args.get(1).map(String::as_str).unwrap_or("no reason"));
        Reply::ok().with_event(["player.onLeave", name.as_str()])
    }

    fn move_player(&mut self, args: &[String]) -> Reply {
        let [name, team, squad, force_kill] = args else {
            return Reply::status("InvalidArguments");
        };
        let (Ok(team_id), Ok(squad_id), Ok(_)) = (
            team.parse::<u32>(),
            squad.parse::<u32>(),
            force_kill.parse::<bool>(),
        ) else {
            return Reply::status("InvalidArguments");
        };

        let Some(player) = self.players.iter_mut().find(|p| p.name == *name) else {
            return Reply::status("PlayerNotFound");
        };
        player.team_id = team_id;
        player.squad_id = squad_id;

        Reply::ok().with_event([
            "player.onTeamChange".to_string(),
            name.clone(),
            team_id.to_string(),
            squad_id.to_string(),
        ])
    }

    fn say(&self, args: &[String]) -> Reply {
        let Some((message, subset)) = args.split_first() else {
            return Reply::status("InvalidArguments");
        };
        if subset.is_empty() {
            return Reply::status("InvalidArguments");
        }

        debug!("Say {:?} to {:?}", message, decode_groupings(subset));
        Reply::ok()
    }

    fn set_next_map(&mut self, args: &[String]) -> Reply {
        match args.first().and_then(|index| index.parse::<usize>().ok()) {
            Some(index) if index < self.maps.len() => {
                self.next_map = index;
                Reply::ok()
            }
            Some(_) => Reply::status("InvalidMapIndex"),
            None => Reply::status("InvalidArguments"),
        }
    }

    fn run_next_round(&mut self) -> Reply {
        let Some(map) = self.maps.get(self.next_map).cloned() else {
            return Reply::status("InvalidMapIndex");
        };

        self.current_map = self.next_map;
        self.next_map = (self.next_map + 1) % self.maps.len();
        self.round = 1;
        info!("Loading {} ({})", map.name, map.game_mode);

        Reply::ok().with_event([
            "server.onLevelLoaded".to_string(),
            map.name,
            map.game_mode,
            self.round.to_string(),
            map.rounds.to_string(),
        ])
    }

    fn add_ban(&mut self, args: &[String]) -> Reply {
        let [id_type, id, rest @ ..] = args else {
            return Reply::status("InvalidArguments");
        };
        if !matches!(id_type.as_str(), "name" | "ip" | "guid") {
            return Reply::status("InvalidIdType");
        }

        let (duration, reason) = match rest {
            [perm, reason @ ..] if perm == "perm" => (BanDuration::Permanent, reason),
            [kind, amount, reason @ ..] if kind == "seconds" => match amount.parse() {
                Ok(seconds) => (BanDuration::Seconds(seconds), reason),
                Err(_) => return Reply::status("InvalidArguments"),
            },
            [kind, amount, reason @ ..] if kind == "rounds" => match amount.parse() {
                Ok(rounds) => (BanDuration::Rounds(rounds), reason),
                Err(_) => return Reply::status("InvalidArguments"),
            },
            _ => return Reply::status("InvalidBanType"),
        };

        self.bans.push(Ban {
            id_type: id_type.clone(),
            id: id.clone(),
            duration,
            reason: reason.join(" "),
        });

        if id_type == "name" && self.remove_player(id) {
            Reply::ok().with_event(["player.onLeave", id.as_str()])
        } else {
            Reply::ok()
        }
    }

    fn remove_ban(&mut self, args: &[String]) -> Reply {
        let [id_type, id] = args else {
            return Reply::status("InvalidArguments");
        };
        let before = self.bans.len();
        self.bans.retain(|ban| !(ban.id_type == *id_type && ban.id == *id));
        if self.bans.len() == before {
            Reply::status("NotFound")
        } else {
            Reply::ok()
        }
    }
}
