//! Session lifecycle status and turn marker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a session.
///
/// Transitions only move forward: `Waiting -> Ongoing -> Finished`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Ongoing,
    Finished,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whose move it is.
///
/// The player always moves first (white); the engine is the only opponent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    Player,
    Opponent,
}

impl Turn {
    /// The other side.
    pub fn flip(self) -> Self {
        match self {
            Turn::Player => Turn::Opponent,
            Turn::Opponent => Turn::Player,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Turn::Player => "player",
            Turn::Opponent => "opponent",
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
