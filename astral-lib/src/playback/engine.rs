//! Facade that owns the mixing graph and the three players.

use log::{debug, warn};

use crate::audio::{AudioError, AudioMode, Channel};

use super::ambient::AmbientLooper;
use super::graph::MixingGraph;
use super::oneshot::OneShotPlayer;
use super::voice::{EventSink, PlaybackEvent, StatusObserver, VoiceClip, VoiceSequencer, VoiceStatus};

/// Decoded-envelope audio ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCue {
    Voice { data: Vec<u8>, speaker: Option<String> },
    Ambient(Vec<u8>),
    Effect(Vec<u8>),
}

impl AudioCue {
    pub fn channel(&self) -> Channel {
        match self {
            AudioCue::Voice { speaker, .. } => Channel::for_speaker(speaker.as_deref()),
            AudioCue::Ambient(_) => Channel::Ambient,
            AudioCue::Effect(_) => Channel::Sfx,
        }
    }
}

/// All playback state of one client: graph, voice, ambient, and effects.
pub struct AudioEngine {
    graph: MixingGraph,
    voice: VoiceSequencer,
    ambient: AmbientLooper,
    oneshot: OneShotPlayer,
}

impl AudioEngine {
    pub fn new(graph: MixingGraph, events: EventSink) -> Self {
        Self {
            graph,
            voice: VoiceSequencer::new(events),
            ambient: AmbientLooper::new(),
            oneshot: OneShotPlayer::new(),
        }
    }

    pub fn graph(&self) -> &MixingGraph {
        &self.graph
    }

    pub fn voice_status(&self) -> VoiceStatus {
        self.voice.status()
    }

    pub fn set_status_observer(&mut self, observer: StatusObserver) {
        self.voice.set_observer(observer);
    }

    pub fn mode(&self) -> AudioMode {
        self.graph.mode()
    }

    /// Dispatch a cue to its player.
    ///
    /// The server filters cues by mode; everything that arrives is played.
    pub fn route(&mut self, cue: AudioCue) {
        debug!("routing {} cue", cue.channel());
        match cue {
            AudioCue::Voice { data, speaker } => {
                self.voice.enqueue(&mut self.graph, VoiceClip::new(data, speaker));
            }
            AudioCue::Ambient(data) => {
                if let Err(err) = self.ambient.play(&mut self.graph, &data) {
                    warn!("ambient bed failed: {}", err);
                }
            }
            AudioCue::Effect(data) => {
                if let Err(err) = self.oneshot.play_effect(&mut self.graph, &data) {
                    warn!("effect failed: {}", err);
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::VoiceEnded(token) => self.voice.on_clip_ended(&mut self.graph, token),
        }
    }

    pub fn pause(&mut self) {
        self.voice.pause(&self.graph);
    }

    pub fn resume(&mut self) {
        self.voice.resume(&self.graph);
    }

    pub fn replay(&mut self) {
        self.voice.replay(&mut self.graph);
    }

    pub fn stop_voice(&mut self) {
        self.voice.stop();
    }

    /// A player action starts a new turn: the previous turn's speech is dropped.
    pub fn begin_turn(&mut self) {
        self.voice.stop();
    }

    /// Only the ambient bed reacts locally: `off` cuts it outright. The
    /// server applies the mode to everything it sends afterwards.
    pub fn set_mode(&mut self, mode: AudioMode) {
        self.graph.set_mode(mode);
        if mode == AudioMode::Off {
            self.ambient.stop();
        }
    }

    pub fn set_volume(&mut self, channel: Channel, value: f32) {
        self.graph.set_volume(channel, value);
    }

    pub fn volume(&self, channel: Channel) -> f32 {
        self.graph.volume(channel)
    }

    pub fn play_dice_clatter(&mut self) -> Result<(), AudioError> {
        self.oneshot.play_dice_clatter(&mut self.graph)
    }

    /// Stop everything and release the output context.
    pub fn close(&mut self) {
        self.voice.stop();
        self.ambient.stop();
        self.graph.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::playback::output::testing::{recording_graph, wav_bytes, RecordingOutput};

    fn engine() -> (AudioEngine, RecordingOutput) {
        let (graph, output) = recording_graph();
        let sink: EventSink = Arc::new(|_: PlaybackEvent| {});
        (AudioEngine::new(graph, sink), output)
    }

    fn voice(speaker: &str) -> AudioCue {
        AudioCue::Voice {
            data: wav_bytes(100, 8_000, 0.5),
            speaker: Some(speaker.to_string()),
        }
    }

    #[test]
    fn mode_does_not_filter_incoming_cues() {
        let (mut engine, output) = engine();
        engine.set_mode(AudioMode::Dialogue);
        engine.route(voice("narrator"));
        assert_eq!(output.len(), 1);
        assert_eq!(engine.voice_status(), VoiceStatus::Playing);

        engine.set_mode(AudioMode::Off);
        engine.route(AudioCue::Effect(wav_bytes(100, 8_000, 0.5)));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn dice_clatter_plays_in_every_mode() {
        let (mut engine, output) = engine();
        engine.set_mode(AudioMode::Off);
        engine.play_dice_clatter().unwrap();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn dialogue_mode_keeps_ambient_bed() {
        let (mut engine, output) = engine();
        engine.route(AudioCue::Ambient(wav_bytes(400, 8_000, 0.5)));
        engine.set_mode(AudioMode::Dialogue);
        assert!(!output.pull(0, 10).is_empty());
    }

    #[test]
    fn mode_off_cuts_ambient_only() {
        let (mut engine, output) = engine();
        engine.route(AudioCue::Ambient(wav_bytes(400, 8_000, 0.5)));
        engine.route(voice("narrator"));
        engine.set_mode(AudioMode::Off);

        assert_eq!(output.finish(0), 0);
        assert!(!output.pull(1, 10).is_empty());
    }

    #[test]
    fn close_stops_everything() {
        let (mut engine, output) = engine();
        engine.route(AudioCue::Ambient(wav_bytes(400, 8_000, 0.5)));
        engine.route(voice("narrator"));
        engine.route(AudioCue::Effect(wav_bytes(400, 8_000, 0.5)));
        engine.close();

        assert!(!engine.graph().is_open());
        for index in 0..3 {
            assert_eq!(output.finish(index), 0);
        }
        assert_eq!(engine.voice_status(), VoiceStatus::Idle);
    }

    #[test]
    fn volumes_persist_across_close() {
        let (mut engine, _output) = engine();
        engine.set_volume(Channel::Npc, 0.4);
        engine.close();
        assert_eq!(engine.volume(Channel::Npc), 0.4);
    }
}
