//! Merges the cached opening with the live session stream.
//!
//! The reconciler does no I/O: the event loop feeds it decoded frames and
//! connection changes, and forwards the [`Routed`] values it returns to the
//! audio engine and the console.

use std::fmt;

use log::{debug, info, warn};

use crate::playback::AudioCue;

use super::cache::{KeyValueStore, OpeningCache};
use super::character::CharacterState;
use super::error::SessionError;
use super::protocol::{decode_frame, ClientMessage, ControlMessage, ServerEvent};
use super::roll::{RollRequest, RollResult, RollSlot};
use super::transcript::{ChatMessage, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Progress through the server's replay of an opening we already showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hydration {
    /// Every event is new.
    Live,
    /// Discarding replayed text until `target` messages were skipped.
    Skipping { target: usize, skipped: usize },
    /// All replayed text skipped; audio stays muted until new text streams in.
    Trailing,
}

/// Output of one inbound event, in the order it should be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Message(ChatMessage),
    Streaming { content: String, done: bool },
    Character(CharacterState),
    Audio(AudioCue),
    RollRequested(RollRequest),
    RollResolved(RollResult),
}

pub struct Reconciler {
    cache: OpeningCache,
    campaign_id: Option<String>,
    connection: ConnectionState,
    transcript: Vec<ChatMessage>,
    character: Option<CharacterState>,
    roll: RollSlot,
    hydration: Hydration,
    player_sent: bool,
    waiting: bool,
    loading: bool,
}

impl Reconciler {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            cache: OpeningCache::new(store),
            campaign_id: None,
            connection: ConnectionState::Disconnected,
            transcript: Vec::new(),
            character: None,
            roll: RollSlot::default(),
            hydration: Hydration::Live,
            player_sent: false,
            waiting: false,
            loading: false,
        }
    }

    /// Switch to `campaign_id` and hydrate from the opening cache.
    ///
    /// All per-session state is reset first. Returns the hydrated transcript,
    /// empty on a cache miss. The caller opens the connection either way.
    pub fn select_campaign(&mut self, campaign_id: &str) -> &[ChatMessage] {
        self.reset();
        self.campaign_id = Some(campaign_id.to_string());
        self.connection = ConnectionState::Connecting;

        match self.cache.load(campaign_id) {
            Some(cached) => {
                info!(
                    "hydrated {} opening messages for {}",
                    cached.len(),
                    campaign_id
                );
                self.hydration = Hydration::Skipping {
                    target: cached.len(),
                    skipped: 0,
                };
                self.transcript = cached;
                self.loading = false;
            }
            None => {
                self.loading = true;
            }
        }
        &self.transcript
    }

    /// Abandon the current session.
    pub fn leave(&mut self) {
        self.reset();
        self.campaign_id = None;
    }

    fn reset(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.transcript.clear();
        self.character = None;
        self.roll.clear();
        self.hydration = Hydration::Live;
        self.player_sent = false;
        self.waiting = false;
        self.loading = false;
    }

    pub fn on_connected(&mut self) {
        if self.campaign_id.is_some() {
            self.connection = ConnectionState::Connected;
        }
    }

    pub fn on_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }

    /// Decode and apply one inbound frame. Malformed frames are dropped.
    pub fn handle_frame(&mut self, frame: &str) -> Vec<Routed> {
        match decode_frame(frame) {
            Ok(event) => self.handle_event(event),
            Err(err) => {
                warn!("ignoring inbound frame: {}", err);
                Vec::new()
            }
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent) -> Vec<Routed> {
        match event {
            ServerEvent::Text { content } => self.on_text(content),
            ServerEvent::TextDelta { content } => self.on_streaming(content, false),
            ServerEvent::TextEnd { content } => self.on_streaming(content, true),
            ServerEvent::State { updates } => {
                let state = match self.character.as_mut() {
                    Some(state) => {
                        state.merge(&updates);
                        state.clone()
                    }
                    None => {
                        let state = CharacterState::from_payload(&updates);
                        self.character = Some(state.clone());
                        state
                    }
                };
                vec![Routed::Character(state)]
            }
            ServerEvent::Audio(payload) => {
                if self.hydration != Hydration::Live {
                    debug!("skipping replayed {:?} audio", payload.channel);
                    return Vec::new();
                }
                match payload.into_cue() {
                    Ok(cue) => vec![Routed::Audio(cue)],
                    Err(err) => {
                        warn!("dropping audio event: {}", err);
                        Vec::new()
                    }
                }
            }
            ServerEvent::RollRequest(request) => {
                self.roll.request(request.clone());
                vec![Routed::RollRequested(request)]
            }
            ServerEvent::RollResult(result) => {
                self.roll.resolve(result.clone());
                vec![Routed::RollResolved(result)]
            }
        }
    }

    fn on_text(&mut self, content: String) -> Vec<Routed> {
        match self.hydration {
            Hydration::Skipping { target, skipped } => {
                let skipped = skipped + 1;
                self.hydration = if skipped >= target {
                    debug!("opening replay skipped ({} messages)", skipped);
                    Hydration::Trailing
                } else {
                    Hydration::Skipping { target, skipped }
                };
                return Vec::new();
            }
            Hydration::Trailing => self.hydration = Hydration::Live,
            Hydration::Live => {}
        }

        self.loading = false;
        self.waiting = false;
        let message = ChatMessage::dm(content);
        self.transcript.push(message.clone());

        if !self.player_sent {
            if let Some(campaign_id) = self.campaign_id.as_deref() {
                let opening: Vec<ChatMessage> = self
                    .transcript
                    .iter()
                    .filter(|m| m.role == Role::Dm)
                    .cloned()
                    .collect();
                self.cache.save(campaign_id, &opening);
            }
        }
        vec![Routed::Message(message)]
    }

    fn on_streaming(&mut self, content: String, done: bool) -> Vec<Routed> {
        match self.hydration {
            Hydration::Skipping { .. } => return Vec::new(),
            // A new message is streaming; its audio may arrive before its text.
            Hydration::Trailing => self.hydration = Hydration::Live,
            Hydration::Live => {}
        }
        vec![Routed::Streaming { content, done }]
    }

    /// Record a player action and build its outbound frame.
    ///
    /// Nothing changes when there is no open connection.
    pub fn send_action(&mut self, text: &str) -> Result<String, SessionError> {
        if self.connection != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let frame = ClientMessage::action(text).to_frame()?;
        self.player_sent = true;
        self.hydration = Hydration::Live;
        self.waiting = true;
        self.transcript.push(ChatMessage::player(text));
        Ok(frame)
    }

    /// Build a control frame; the transcript is not touched.
    pub fn compose_control(&self, control: ControlMessage) -> Result<String, SessionError> {
        if self.connection != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        ClientMessage::Control(control).to_frame()
    }

    /// Acknowledge the pending roll prompt.
    pub fn acknowledge_roll(&self) -> Result<String, SessionError> {
        let request = self.roll.pending().ok_or(SessionError::NoPendingRoll)?;
        self.compose_control(ControlMessage::Roll {
            tool_use_id: request.tool_use_id.clone(),
        })
    }

    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id.as_deref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn character(&self) -> Option<&CharacterState> {
        self.character.as_ref()
    }

    pub fn pending_roll(&self) -> Option<&RollRequest> {
        self.roll.pending()
    }

    pub fn last_roll(&self) -> Option<&RollResult> {
        self.roll.resolved()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether replayed opening events are still being discarded.
    pub fn is_hydrating(&self) -> bool {
        matches!(self.hydration, Hydration::Skipping { .. })
    }

    /// The opening cache stops updating once the player has acted.
    pub fn is_cache_frozen(&self) -> bool {
        self.player_sent
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::constants::OPENING_CACHE_KEY;
    use crate::session::cache::{MemoryStore, OpeningSnapshot};

    /// Store whose contents stay readable after it is boxed.
    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<MemoryStore>>);

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
            self.0.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
            self.0.borrow_mut().set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), SessionError> {
            self.0.borrow_mut().remove(key)
        }
    }

    impl SharedStore {
        fn snapshot(&self) -> Option<OpeningSnapshot> {
            let raw = self.0.borrow().get(OPENING_CACHE_KEY).unwrap()?;
            serde_json::from_str(&raw).ok()
        }
    }

    fn text(content: &str) -> String {
        json!({"type": "text", "content": content}).to_string()
    }

    fn audio() -> String {
        json!({"type": "audio", "channel": "voice", "speaker": "narrator", "data": "AAEC"}).to_string()
    }

    fn connect(reconciler: &mut Reconciler, campaign: &str) {
        reconciler.select_campaign(campaign);
        reconciler.on_connected();
    }

    fn contents(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    fn count_audio(routed: &[Routed]) -> usize {
        routed
            .iter()
            .filter(|r| matches!(r, Routed::Audio(_)))
            .count()
    }

    fn first_visit(store: &SharedStore, campaign: &str, openings: &[&str]) {
        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, campaign);
        for line in openings {
            reconciler.handle_frame(&text(line));
            reconciler.handle_frame(&audio());
        }
    }

    #[test]
    fn cache_tracks_every_dm_message_before_first_send() {
        let store = SharedStore::default();
        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, "c1");
        assert!(reconciler.is_loading());

        for (i, line) in ["One", "Two", "Three"].iter().enumerate() {
            reconciler.handle_frame(&text(line));
            let snapshot = store.snapshot().unwrap();
            assert_eq!(snapshot.campaign_id, "c1");
            assert_eq!(snapshot.messages.len(), i + 1);
            assert_eq!(snapshot.messages, reconciler.transcript());
        }
        assert!(!reconciler.is_loading());

        reconciler.send_action("I look around").unwrap();
        assert!(reconciler.is_cache_frozen());
        assert!(reconciler.is_waiting());
        reconciler.handle_frame(&text("Four"));
        assert!(!reconciler.is_waiting());
        assert_eq!(contents(&store.snapshot().unwrap().messages), vec!["One", "Two", "Three"]);
    }

    #[test]
    fn reconnect_skips_replayed_opening_text_and_audio() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One", "Two"]);

        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        let hydrated = contents(reconciler.select_campaign("c1")).len();
        assert_eq!(hydrated, 2);
        assert!(reconciler.is_hydrating());
        assert!(!reconciler.is_loading());
        reconciler.on_connected();

        let mut routed = Vec::new();
        for line in ["One", "Two", "Three", "Four", "Five"] {
            routed.extend(reconciler.handle_frame(&text(line)));
            routed.extend(reconciler.handle_frame(&audio()));
        }

        assert_eq!(
            contents(reconciler.transcript()),
            vec!["One", "Two", "Three", "Four", "Five"]
        );
        assert_eq!(count_audio(&routed), 3);
        assert!(!reconciler.is_hydrating());
        assert_eq!(store.snapshot().unwrap().messages.len(), 5);
    }

    #[test]
    fn first_send_ends_hydration_early() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One", "Two", "Three"]);

        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, "c1");
        reconciler.handle_frame(&text("One"));
        reconciler.send_action("Hello").unwrap();
        assert!(!reconciler.is_hydrating());

        let routed = reconciler.handle_frame(&text("Reply"));
        assert_eq!(routed.len(), 1);
        assert_eq!(count_audio(&reconciler.handle_frame(&audio())), 1);
        assert_eq!(
            contents(reconciler.transcript()),
            vec!["One", "Two", "Three", "Hello", "Reply"]
        );
        assert_eq!(store.snapshot().unwrap().messages.len(), 3);
    }

    #[test]
    fn other_campaign_in_cache_is_a_miss() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One"]);

        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        assert!(reconciler.select_campaign("c2").is_empty());
        reconciler.on_connected();
        assert!(!reconciler.is_hydrating());
        assert_eq!(count_audio(&reconciler.handle_frame(&audio())), 1);

        reconciler.handle_frame(&text("Elsewhere"));
        assert_eq!(store.snapshot().unwrap().campaign_id, "c2");
    }

    #[test]
    fn switching_campaign_resets_session_state() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        connect(&mut reconciler, "c1");
        reconciler.handle_frame(&json!({"type": "state", "updates": {"name": "Thorn"}}).to_string());
        reconciler.handle_frame(
            &json!({"type": "roll_request", "notation": "1d20", "reason": "Luck"}).to_string(),
        );
        reconciler.send_action("Go").unwrap();

        reconciler.select_campaign("c2");
        assert_eq!(reconciler.connection(), ConnectionState::Connecting);
        assert!(reconciler.character().is_none());
        assert!(reconciler.pending_roll().is_none());
        assert!(!reconciler.is_waiting());
        assert!(!reconciler.is_cache_frozen());
        assert!(reconciler.transcript().is_empty());
    }

    #[test]
    fn sends_require_a_connection() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        reconciler.select_campaign("c1");
        assert!(matches!(
            reconciler.send_action("Hello"),
            Err(SessionError::NotConnected)
        ));
        assert!(reconciler.transcript().is_empty());
        assert!(!reconciler.is_cache_frozen());

        reconciler.on_connected();
        reconciler.on_disconnected();
        assert!(reconciler.send_action("Hello").is_err());
    }

    #[test]
    fn control_frames_bypass_transcript() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        connect(&mut reconciler, "c1");
        let frame = reconciler
            .compose_control(ControlMessage::SetAudioMode {
                mode: crate::audio::AudioMode::Ambient,
            })
            .unwrap();
        assert_eq!(frame, r#"{"type":"set_audio_mode","mode":"ambient"}"#);
        assert!(reconciler.transcript().is_empty());
        assert!(!reconciler.is_cache_frozen());
    }

    #[test]
    fn state_events_construct_then_patch() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        connect(&mut reconciler, "c1");
        reconciler.handle_frame(
            &json!({"type": "state", "updates": {"name": "Thorn", "hp": {"current": 10, "max": 10}}})
                .to_string(),
        );
        let routed =
            reconciler.handle_frame(&json!({"type": "state", "updates": {"hp": 7}}).to_string());

        let Routed::Character(state) = &routed[0] else {
            panic!("expected character update");
        };
        assert_eq!(state.hp, 7);
        assert_eq!(state.max_hp, 10);
        assert_eq!(state.name, "Thorn");
        assert_eq!(reconciler.character(), Some(state));
    }

    #[test]
    fn roll_request_then_result() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        connect(&mut reconciler, "c1");
        reconciler.handle_frame(
            &json!({"type": "roll_request", "tool_use_id": "t7", "notation": "1d20+3", "reason": "Stealth check"})
                .to_string(),
        );
        assert_eq!(reconciler.pending_roll().unwrap().notation, "1d20+3");
        assert_eq!(
            reconciler.acknowledge_roll().unwrap(),
            r#"{"type":"roll","tool_use_id":"t7"}"#
        );

        reconciler.handle_frame(
            &json!({"type": "roll_result", "rolls": [17], "modifier": 3, "total": 20, "natural_20": true})
                .to_string(),
        );
        assert!(reconciler.pending_roll().is_none());
        let result = reconciler.last_roll().unwrap();
        assert_eq!(result.rolls, vec![17]);
        assert_eq!(result.modifier, 3);
        assert_eq!(result.total, 20);
        assert!(result.natural_20);
        assert!(matches!(
            reconciler.acknowledge_roll(),
            Err(SessionError::NoPendingRoll)
        ));
    }

    #[test]
    fn malformed_frames_are_ignored() {
        let mut reconciler = Reconciler::new(Box::new(MemoryStore::new()));
        connect(&mut reconciler, "c1");
        assert!(reconciler.handle_frame("{oops").is_empty());
        assert!(reconciler.handle_frame(r#"{"type":"fireworks"}"#).is_empty());
        assert_eq!(reconciler.handle_frame(&text("Still here")).len(), 1);
    }

    #[test]
    fn streaming_notices_are_suppressed_during_replay() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One"]);
        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, "c1");

        let delta = json!({"type": "text_delta", "content": "On"}).to_string();
        assert!(reconciler.handle_frame(&delta).is_empty());
        reconciler.handle_frame(&text("One"));
        assert_eq!(
            reconciler.handle_frame(&delta),
            vec![Routed::Streaming {
                content: "On".to_string(),
                done: false
            }]
        );
    }

    #[test]
    fn streamed_message_audio_plays_before_its_final_text() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One"]);
        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, "c1");

        let mut routed = Vec::new();
        routed.extend(reconciler.handle_frame(&text("One")));
        routed.extend(reconciler.handle_frame(
            &json!({"type": "text_delta", "content": "Two"}).to_string(),
        ));
        routed.extend(reconciler.handle_frame(&audio()));
        routed.extend(reconciler.handle_frame(&text("Two")));

        assert_eq!(count_audio(&routed), 1);
        assert_eq!(contents(reconciler.transcript()), vec!["One", "Two"]);
    }

    #[test]
    fn replayed_audio_after_last_text_stays_muted() {
        let store = SharedStore::default();
        first_visit(&store, "c1", &["One"]);
        let mut reconciler = Reconciler::new(Box::new(store.clone()));
        connect(&mut reconciler, "c1");

        reconciler.handle_frame(&text("One"));
        assert_eq!(count_audio(&reconciler.handle_frame(&audio())), 0);
        let text_end = json!({"type": "text_end", "content": "Two"}).to_string();
        assert_eq!(reconciler.handle_frame(&text_end).len(), 1);
        assert_eq!(count_audio(&reconciler.handle_frame(&audio())), 1);
    }
}
