//! The two board objects that need a fixed wire schema.
//!
//! Field names follow the rule engine's JSON (`searchRadius` is camelCase there).
//! Unknown fields are refused so a decoded object always re-encodes to the
//! exact same document.

use serde::{Deserialize, Serialize};

/// Discriminant value of a [`Sonobuoy`] on the wire.
pub const SONOBUOY_TAG: &str = "SONOBUOY";

/// Discriminant value of a [`Torpedo`] on the wire.
pub const TORPEDO_TAG: &str = "TORPEDO";

/// Passive sensor dropped on the board by the pelican.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sonobuoy {
    pub col: Option<i64>,
    pub row: Option<i64>,
    pub range: i64,
    pub state: String,
    pub size: i64,
}

impl Sonobuoy {
    pub fn new(range: i64) -> Self {
        Self {
            col: None,
            row: None,
            range,
            state: "COLD".to_string(),
            size: 1,
        }
    }
}

/// Mobile weapon launched by the pelican.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Torpedo {
    pub id: Option<String>,
    pub col: Option<i64>,
    pub row: Option<i64>,
    pub turn: i64,
    pub size: i64,
    /// Hexes travelled per turn, one entry per remaining turn.
    pub speed: Option<Vec<i64>>,
    #[serde(rename = "searchRadius")]
    pub search_radius: Option<i64>,
}
