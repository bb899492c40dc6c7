//! Error kinds reported by the Reveri server in `error` messages.
//!
//! The server sends the kind as a plain snake_case string in the `type`
//! field (e.g. `"invalid_turn"`). Kinds this client does not know about are
//! kept verbatim in [`ServerErrorKind::Other`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error kinds returned by the Reveri server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerErrorKind {
    /// The requested move is not legal on the current board.
    InvalidTurn,
    /// A kind this client version does not recognize.
    Other(String),
}

impl ServerErrorKind {
    /// Returns the wire name of this error kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidTurn => "invalid_turn",
            Self::Other(kind) => kind,
        }
    }

    /// Returns a human-readable description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidTurn => {
                "That move is not allowed. Pick an empty cell that captures at least one piece."
            }
            Self::Other(_) => "The server rejected the last request.",
        }
    }
}

impl From<String> for ServerErrorKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "invalid_turn" => Self::InvalidTurn,
            _ => Self::Other(kind),
        }
    }
}

impl From<ServerErrorKind> for String {
    fn from(kind: ServerErrorKind) -> Self {
        match kind {
            ServerErrorKind::InvalidTurn => "invalid_turn".to_string(),
            ServerErrorKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_str())
    }
}
