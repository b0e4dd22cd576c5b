//! Game configuration artifact (JSON stored in the config bucket).
//!
//! Only the per-role move limits matter to the orchestrator; the whole document
//! is kept as `raw` and handed to the rule engine untouched.

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Config used when nothing more specific is scheduled.
pub const DEFAULT_GAME_CONFIG: &str = "10x10_balanced.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRules {
    /// Maximum number of actions the role may take in one phase.
    pub move_limit: u32,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub pelican: RoleRules,
    pub panther: RoleRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigDocument {
    game_rules: GameRules,
}

/// Parsed configuration for every game of a Match.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub rules: GameRules,
    pub raw: serde_json::Value,
}

impl GameConfig {
    pub fn from_value(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let doc: ConfigDocument = serde_json::from_value(raw.clone())?;
        Ok(Self {
            rules: doc.game_rules,
            raw,
        })
    }

    pub fn move_limit(&self, role: Role) -> u32 {
        match role {
            Role::Pelican => self.rules.pelican.move_limit,
            Role::Panther => self.rules.panther.move_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_move_limits_and_keeps_raw_document() {
        let raw = json!({
            "game_settings": {"maximum_turns": 40, "map_width": 10, "map_height": 10},
            "game_rules": {
                "pelican": {"move_limit": 20, "default_torps": 2},
                "panther": {"move_limit": 1}
            }
        });
        let config = GameConfig::from_value(raw.clone()).unwrap();
        assert_eq!(config.move_limit(Role::Pelican), 20);
        assert_eq!(config.move_limit(Role::Panther), 1);
        assert_eq!(config.rules.pelican.extra["default_torps"], json!(2));
        assert_eq!(config.raw, raw);
    }

    #[test]
    fn missing_rules_is_an_error() {
        assert!(GameConfig::from_value(json!({"game_settings": {}})).is_err());
    }
}
