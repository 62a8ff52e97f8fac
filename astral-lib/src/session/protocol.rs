//! Wire format of the session WebSocket.
//!
//! Inbound frames decode once into [`ServerEvent`]; outbound frames are built
//! from [`ClientMessage`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audio::AudioMode;
use crate::playback::AudioCue;

use super::error::SessionError;
use super::roll::{RollRequest, RollResult};

/// Every event the session server can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A complete DM message.
    Text { content: String },
    /// Incremental text of a message still being generated.
    TextDelta { content: String },
    /// End of a streamed message.
    TextEnd {
        #[serde(default)]
        content: String,
    },
    /// Partial character sheet.
    State { updates: Map<String, Value> },
    Audio(AudioPayload),
    RollRequest(RollRequest),
    RollResult(RollResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTag {
    Voice,
    Ambient,
    Sfx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub channel: AudioTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Base64-encoded clip bytes.
    pub data: String,
}

impl AudioPayload {
    /// Decode the payload bytes into a cue for the audio engine.
    pub fn into_cue(self) -> Result<AudioCue, SessionError> {
        let bytes = STANDARD.decode(self.data.trim())?;
        Ok(match self.channel {
            AudioTag::Voice => AudioCue::Voice {
                data: bytes,
                speaker: self.speaker,
            },
            AudioTag::Ambient => AudioCue::Ambient(bytes),
            AudioTag::Sfx => AudioCue::Effect(bytes),
        })
    }
}

/// Decode one text frame.
pub fn decode_frame(frame: &str) -> Result<ServerEvent, SessionError> {
    Ok(serde_json::from_str(frame)?)
}

/// Everything the client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// A free-text player action.
    Action { message: String },
    /// A control message; never shown in the transcript.
    Control(ControlMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    SetAudioMode {
        mode: AudioMode,
    },
    /// Acknowledges a roll prompt so the server rolls the dice.
    Roll {
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action {
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_event_kind() {
        let frames = [
            r#"{"type":"text","content":"You wake."}"#,
            r#"{"type":"text_delta","content":"You"}"#,
            r#"{"type":"text_end","content":"You wake."}"#,
            r#"{"type":"state","updates":{"hp":7}}"#,
            r#"{"type":"audio","channel":"voice","speaker":"narrator","data":"AAEC"}"#,
            r#"{"type":"roll_request","tool_use_id":"t1","notation":"1d20+3","reason":"Stealth check"}"#,
            r#"{"type":"roll_result","rolls":[17],"modifier":3,"total":20,"notation":"1d20+3","reason":"Stealth check","roll_type":"standard","natural_20":true}"#,
        ];
        let events: Vec<ServerEvent> = frames.iter().map(|f| decode_frame(f).unwrap()).collect();
        assert!(matches!(events[0], ServerEvent::Text { .. }));
        assert!(matches!(events[1], ServerEvent::TextDelta { .. }));
        assert!(matches!(events[2], ServerEvent::TextEnd { .. }));
        assert!(matches!(events[3], ServerEvent::State { .. }));
        assert!(matches!(events[4], ServerEvent::Audio(_)));
        assert!(matches!(events[5], ServerEvent::RollRequest(_)));
        assert!(matches!(events[6], ServerEvent::RollResult(_)));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(decode_frame(r#"{"type":"confetti"}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn audio_payload_decodes_base64() {
        let event = decode_frame(r#"{"type":"audio","channel":"voice","speaker":"Grimble","data":"AAEC"}"#)
            .unwrap();
        let ServerEvent::Audio(payload) = event else {
            panic!("expected audio");
        };
        assert_eq!(
            payload.into_cue().unwrap(),
            AudioCue::Voice {
                data: vec![0, 1, 2],
                speaker: Some("Grimble".to_string()),
            }
        );
    }

    #[test]
    fn outbound_frames() {
        assert_eq!(
            ClientMessage::action("I open the door").to_frame().unwrap(),
            r#"{"message":"I open the door"}"#
        );
        let mode = ClientMessage::Control(ControlMessage::SetAudioMode {
            mode: AudioMode::Dialogue,
        });
        assert_eq!(
            mode.to_frame().unwrap(),
            r#"{"type":"set_audio_mode","mode":"dialogue"}"#
        );
        let roll = ClientMessage::Control(ControlMessage::Roll {
            tool_use_id: Some("t1".to_string()),
        });
        assert_eq!(roll.to_frame().unwrap(), r#"{"type":"roll","tool_use_id":"t1"}"#);
    }
}
