//! Dice prompts and their results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pending dice prompt from the DM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    pub notation: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollType {
    #[default]
    Standard,
    Advantage,
    Disadvantage,
}

/// Resolution of a roll, including kept and discarded dice for advantage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub rolls: Vec<i64>,
    #[serde(default)]
    pub modifier: i64,
    pub total: i64,
    #[serde(default)]
    pub notation: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub roll_type: RollType,
    #[serde(default)]
    pub natural_20: bool,
    #[serde(default)]
    pub natural_1: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kept: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<Vec<i64>>,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.notation.is_empty() {
            "roll"
        } else {
            self.notation.as_str()
        };
        write!(f, "{} ", label)?;
        match self.roll_type {
            RollType::Standard => {}
            RollType::Advantage => write!(f, "(advantage) ")?,
            RollType::Disadvantage => write!(f, "(disadvantage) ")?,
        }
        write!(f, "{:?}", self.rolls)?;
        if self.modifier > 0 {
            write!(f, " + {}", self.modifier)?;
        } else if self.modifier < 0 {
            write!(f, " - {}", -self.modifier)?;
        }
        write!(f, " = {}", self.total)?;
        if let Some(discarded) = &self.discarded {
            write!(f, " (discarded {:?})", discarded)?;
        }
        if self.natural_20 {
            write!(f, " natural 20!")?;
        } else if self.natural_1 {
            write!(f, " natural 1!")?;
        }
        if !self.reason.is_empty() {
            write!(f, " for {}", self.reason)?;
        }
        Ok(())
    }
}

/// Holds at most one pending request and the latest result.
#[derive(Debug, Clone, Default)]
pub struct RollSlot {
    pending: Option<RollRequest>,
    resolved: Option<RollResult>,
}

impl RollSlot {
    /// A new request replaces any earlier one.
    pub fn request(&mut self, request: RollRequest) {
        self.pending = Some(request);
    }

    /// Resolve the pending request; returns the request it answered.
    pub fn resolve(&mut self, result: RollResult) -> Option<RollRequest> {
        self.resolved = Some(result);
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&RollRequest> {
        self.pending.as_ref()
    }

    pub fn resolved(&self) -> Option<&RollResult> {
        self.resolved.as_ref()
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.resolved = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_defaults_optional_fields() {
        let result: RollResult =
            serde_json::from_str(r#"{"rolls":[17],"modifier":3,"total":20,"natural_20":true}"#)
                .unwrap();
        assert_eq!(result.roll_type, RollType::Standard);
        assert!(result.natural_20);
        assert!(!result.natural_1);
        assert!(result.kept.is_none());
    }

    #[test]
    fn describes_advantage_roll() {
        let result = RollResult {
            rolls: vec![4, 15],
            modifier: -1,
            total: 14,
            notation: "1d20-1".to_string(),
            reason: "Perception".to_string(),
            roll_type: RollType::Advantage,
            natural_20: false,
            natural_1: false,
            kept: Some(vec![15]),
            discarded: Some(vec![4]),
        };
        assert_eq!(
            result.to_string(),
            "1d20-1 (advantage) [4, 15] - 1 = 14 (discarded [4]) for Perception"
        );
    }
}
