//! Character sheet state built from partial server updates.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterState {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: i64,
    pub hp: i64,
    pub max_hp: i64,
    pub xp: i64,
    pub ability_scores: BTreeMap<String, i64>,
    pub inventory: Vec<String>,
    pub gold: i64,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            race: String::new(),
            class: String::new(),
            level: 1,
            hp: 0,
            max_hp: 0,
            xp: 0,
            ability_scores: BTreeMap::new(),
            inventory: Vec::new(),
            gold: 0,
        }
    }
}

impl CharacterState {
    /// Build the sheet from the first update of a session.
    ///
    /// Missing fields take their defaults (level 1, everything else empty).
    pub fn from_payload(updates: &Map<String, Value>) -> Self {
        let mut state = Self::default();
        state.merge(updates);
        state
    }

    /// Shallow merge: each known key present in `updates` replaces that field.
    ///
    /// Accepts both the server's nested shape (`hp: {current, max}`, `stats`,
    /// `equipment`) and the flat sheet shape. Unknown keys and values of the
    /// wrong type are ignored.
    pub fn merge(&mut self, updates: &Map<String, Value>) {
        for (key, value) in updates {
            let applied = match key.as_str() {
                "name" => set_string(&mut self.name, value),
                "race" => set_string(&mut self.race, value),
                "class" => set_string(&mut self.class, value),
                "level" => set_int(&mut self.level, value),
                "xp" => set_int(&mut self.xp, value),
                "gold" => set_int(&mut self.gold, value),
                "hp" => self.set_hp(value),
                "maxHp" | "max_hp" => set_int(&mut self.max_hp, value),
                "abilityScores" | "ability_scores" | "stats" => self.set_scores(value),
                "inventory" | "equipment" => self.set_inventory(value),
                _ => false,
            };
            if !applied {
                debug!("ignoring character update {}={}", key, value);
            }
        }
    }

    fn set_hp(&mut self, value: &Value) -> bool {
        if let Some(obj) = value.as_object() {
            let current = obj.get("current").map(|v| set_int(&mut self.hp, v));
            let max = obj.get("max").map(|v| set_int(&mut self.max_hp, v));
            return current.unwrap_or(false) || max.unwrap_or(false);
        }
        set_int(&mut self.hp, value)
    }

    fn set_scores(&mut self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        self.ability_scores = obj
            .iter()
            .filter_map(|(name, score)| as_int(score).map(|score| (name.clone(), score)))
            .collect();
        true
    }

    fn set_inventory(&mut self, value: &Value) -> bool {
        let Some(items) = value.as_array() else {
            return false;
        };
        self.inventory = items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.clone()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect();
        true
    }
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

fn set_int(field: &mut i64, value: &Value) -> bool {
    match as_int(value) {
        Some(v) => {
            *field = v;
            true
        }
        None => false,
    }
}

fn set_string(field: &mut String, value: &Value) -> bool {
    match value.as_str() {
        Some(v) => {
            *field = v.to_string();
            true
        }
        None => false,
    }
}

impl fmt::Display for CharacterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}, level {} {} {}", self.name, self.level, self.race, self.class)?;
        writeln!(f, "HP {}/{}  XP {}  Gold {}", self.hp, self.max_hp, self.xp, self.gold)?;
        if !self.ability_scores.is_empty() {
            let scores: Vec<String> = self
                .ability_scores
                .iter()
                .map(|(name, score)| format!("{} {}", name, score))
                .collect();
            writeln!(f, "{}", scores.join("  "))?;
        }
        if self.inventory.is_empty() {
            write!(f, "Inventory: (empty)")
        } else {
            write!(f, "Inventory: {}", self.inventory.join(", "))
        }
    }
}
