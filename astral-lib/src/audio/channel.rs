//! Mixing channels and the audio mode that gates them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four independently-gained mixing channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Narrator,
    Npc,
    Ambient,
    Sfx,
}

impl Channel {
    /// All channels in gain-slot order.
    pub const ALL: [Channel; 4] = [Channel::Narrator, Channel::Npc, Channel::Ambient, Channel::Sfx];

    /// Pick the speech channel for a voice clip.
    ///
    /// The narrator (or an unnamed speaker) goes to `Narrator`; everyone else
    /// is an NPC.
    pub fn for_speaker(speaker: Option<&str>) -> Self {
        match speaker {
            None => Channel::Narrator,
            Some(name) if name.is_empty() || name.eq_ignore_ascii_case("narrator") => {
                Channel::Narrator
            }
            Some(_) => Channel::Npc,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Narrator => 0,
            Channel::Npc => 1,
            Channel::Ambient => 2,
            Channel::Sfx => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Narrator => "narrator",
            Channel::Npc => "npc",
            Channel::Ambient => "ambient",
            Channel::Sfx => "sfx",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "narrator" => Ok(Channel::Narrator),
            "npc" => Ok(Channel::Npc),
            "ambient" => Ok(Channel::Ambient),
            "sfx" => Ok(Channel::Sfx),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

/// Which categories of server audio the player wants to hear.
///
/// | mode       | narrator | npc | ambient | sfx |
/// |------------|----------|-----|---------|-----|
/// | `full`     | yes      | yes | yes     | yes |
/// | `dialogue` | no       | yes | yes     | yes |
/// | `ambient`  | no       | no  | yes     | yes |
/// | `off`      | no       | no  | no      | no  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    #[default]
    Full,
    Dialogue,
    Ambient,
    Off,
}

impl AudioMode {
    /// Whether cues for `channel` should be played under this mode.
    pub fn is_audible(self, channel: Channel) -> bool {
        match self {
            AudioMode::Full => true,
            AudioMode::Dialogue => channel != Channel::Narrator,
            AudioMode::Ambient => matches!(channel, Channel::Ambient | Channel::Sfx),
            AudioMode::Off => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioMode::Full => "full",
            AudioMode::Dialogue => "dialogue",
            AudioMode::Ambient => "ambient",
            AudioMode::Off => "off",
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(AudioMode::Full),
            "dialogue" => Ok(AudioMode::Dialogue),
            "ambient" => Ok(AudioMode::Ambient),
            "off" => Ok(AudioMode::Off),
            other => Err(format!(
                "unknown audio mode '{}' (expected full, dialogue, ambient, or off)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_routing() {
        assert_eq!(Channel::for_speaker(None), Channel::Narrator);
        assert_eq!(Channel::for_speaker(Some("Narrator")), Channel::Narrator);
        assert_eq!(Channel::for_speaker(Some("")), Channel::Narrator);
        assert_eq!(Channel::for_speaker(Some("Grimble")), Channel::Npc);
    }

    #[test]
    fn mode_audibility_table() {
        use Channel::*;
        assert!(Channel::ALL.iter().all(|c| AudioMode::Full.is_audible(*c)));
        assert!(Channel::ALL.iter().all(|c| !AudioMode::Off.is_audible(*c)));
        assert!(!AudioMode::Dialogue.is_audible(Narrator));
        assert!(AudioMode::Dialogue.is_audible(Npc));
        assert!(AudioMode::Dialogue.is_audible(Sfx));
        assert!(!AudioMode::Ambient.is_audible(Npc));
        assert!(AudioMode::Ambient.is_audible(Ambient));
        assert!(AudioMode::Ambient.is_audible(Sfx));
    }

    #[test]
    fn mode_parses_and_serializes_lowercase() {
        assert_eq!("Dialogue".parse::<AudioMode>().unwrap(), AudioMode::Dialogue);
        assert!("loud".parse::<AudioMode>().is_err());
        assert_eq!(serde_json::to_string(&AudioMode::Off).unwrap(), "\"off\"");
    }

    #[test]
    fn channel_slots_are_distinct() {
        let mut seen = [false; 4];
        for channel in Channel::ALL {
            assert!(!seen[channel.index()]);
            seen[channel.index()] = true;
        }
    }
}
