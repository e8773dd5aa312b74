//! Logical administrative actions
//!
//! A [`NetworkAction`] says what should happen (kick these players, tell this
//! squad something) without saying which words do it. Protocol variants
//! translate actions into packets, see [`crate::variant`].

use rcon_shared::{BanDuration, Grouping};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Kick,
    Ban { duration: BanDuration },
    Say,
    Move { team_id: u32, squad_id: u32, force_kill: bool },
    /// Switches to the first map in scope, or the next map when none is named
    MapChange,
    /// Content is a command line sent as-is
    Raw,
}

/// What an action applies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionScope {
    pub players: Vec<String>,
    /// Map list indexes
    pub maps: Vec<u32>,
    pub groups: Vec<Grouping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAction {
    pub kind: ActionKind,
    pub scope: ActionScope,
    /// Free text: reasons, messages or a raw command line
    pub content: Vec<String>,
}

impl NetworkAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            scope: ActionScope::default(),
            content: Vec::new(),
        }
    }

    pub fn kick(player: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ActionKind::Kick)
            .with_player(player)
            .with_content(reason)
    }

    pub fn ban(player: impl Into<String>, duration: BanDuration, reason: impl Into<String>) -> Self {
        Self::new(ActionKind::Ban { duration })
            .with_player(player)
            .with_content(reason)
    }

    pub fn say(message: impl Into<String>, groups: Vec<Grouping>) -> Self {
        let mut action = Self::new(ActionKind::Say).with_content(message);
        action.scope.groups = groups;
        action
    }

    pub fn move_player(player: impl Into<String>, team_id: u32, squad_id: u32, force_kill: bool) -> Self {
        Self::new(ActionKind::Move {
            team_id,
            squad_id,
            force_kill,
        })
        .with_player(player)
    }

    pub fn map_change(index: Option<u32>) -> Self {
        let mut action = Self::new(ActionKind::MapChange);
        action.scope.maps.extend(index);
        action
    }

    pub fn raw(command_line: impl Into<String>) -> Self {
        Self::new(ActionKind::Raw).with_content(command_line)
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.scope.players.push(player.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.content.push(content);
        }
        self
    }

    /// Content joined into one line
    pub fn text(&self) -> String {
        self.content.join(" ")
    }
}
