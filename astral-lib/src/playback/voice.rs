//! Sequenced speech playback with pause, replay, and stale-completion guards.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::audio::{decode_clip, Channel, ClipSource, DecodedClip};

use super::graph::{MixingGraph, PlaybackHandle};
use super::route::EndCallback;
use super::turn::TurnBuffer;

/// Raw speech payload as received from the session.
#[derive(Debug, Clone)]
pub struct VoiceClip {
    pub data: Vec<u8>,
    pub speaker: Option<String>,
}

impl VoiceClip {
    pub fn new(data: Vec<u8>, speaker: Option<String>) -> Self {
        Self { data, speaker }
    }

    pub fn channel(&self) -> Channel {
        Channel::for_speaker(self.speaker.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStatus {
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for VoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoiceStatus::Idle => "idle",
            VoiceStatus::Playing => "playing",
            VoiceStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Identity of one playback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackToken(u64);

/// Completion notices raised on the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    VoiceEnded(PlaybackToken),
}

/// Where completion notices are posted.
pub type EventSink = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Called with every status transition.
pub type StatusObserver = Box<dyn FnMut(VoiceStatus)>;

struct ActiveClip {
    token: PlaybackToken,
    handle: PlaybackHandle,
}

/// FIFO speech queue that plays strictly one clip at a time.
pub struct VoiceSequencer {
    queue: VecDeque<VoiceClip>,
    turn: TurnBuffer,
    active: Option<ActiveClip>,
    replay_cursor: Option<usize>,
    next_token: u64,
    status: VoiceStatus,
    events: EventSink,
    observer: Option<StatusObserver>,
}

impl VoiceSequencer {
    pub fn new(events: EventSink) -> Self {
        Self {
            queue: VecDeque::new(),
            turn: TurnBuffer::default(),
            active: None,
            replay_cursor: None,
            next_token: 0,
            status: VoiceStatus::Idle,
            events,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: StatusObserver) {
        self.observer = Some(observer);
    }

    pub fn status(&self) -> VoiceStatus {
        self.status
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn turn(&self) -> &TurnBuffer {
        &self.turn
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Queue a clip; playback starts at once when nothing is sounding.
    pub fn enqueue(&mut self, graph: &mut MixingGraph, clip: VoiceClip) {
        self.queue.push_back(clip);
        self.drain(graph);
    }

    /// Start the next clip unless one is already sounding.
    ///
    /// Replayed turn clips go first, then the queue. Clips that fail to
    /// decode are dropped.
    pub fn drain(&mut self, graph: &mut MixingGraph) {
        if self.active.is_some() {
            return;
        }

        while let Some(cursor) = self.replay_cursor {
            self.replay_cursor = Some(cursor + 1);
            let Some((clip, channel)) = self.turn.get(cursor) else {
                self.replay_cursor = None;
                break;
            };
            if self.start(graph, clip, channel) {
                return;
            }
        }

        while let Some(next) = self.queue.pop_front() {
            let channel = next.channel();
            let clip = match decode_clip(&next.data) {
                Ok(clip) => Arc::new(clip),
                Err(err) => {
                    warn!("dropping voice clip for {}: {}", channel, err);
                    continue;
                }
            };
            self.turn.push(clip.clone(), channel);
            if self.start(graph, clip, channel) {
                return;
            }
        }

        self.refresh_status(graph);
    }

    fn start(&mut self, graph: &mut MixingGraph, clip: Arc<DecodedClip>, channel: Channel) -> bool {
        self.next_token += 1;
        let token = PlaybackToken(self.next_token);
        let events = self.events.clone();
        let on_end: EndCallback = Box::new(move || events(PlaybackEvent::VoiceEnded(token)));

        match graph.connect(channel, ClipSource::once(clip), Some(on_end)) {
            Ok(handle) => {
                debug!("voice clip {:?} started on {}", token, channel);
                self.active = Some(ActiveClip { token, handle });
                self.refresh_status(graph);
                true
            }
            Err(err) => {
                warn!("could not play voice clip on {}: {}", channel, err);
                false
            }
        }
    }

    /// Completion of the clip identified by `token`.
    ///
    /// Ignored unless `token` is the clip currently in flight.
    pub fn on_clip_ended(&mut self, graph: &mut MixingGraph, token: PlaybackToken) {
        match &self.active {
            Some(active) if active.token == token => {
                self.active = None;
                self.drain(graph);
            }
            _ => debug!("ignoring stale completion {:?}", token),
        }
    }

    /// Play the current turn again from its first clip.
    pub fn replay(&mut self, graph: &mut MixingGraph) {
        self.halt_active();
        self.queue.clear();
        if self.turn.is_empty() {
            self.replay_cursor = None;
            self.refresh_status(graph);
            return;
        }
        self.replay_cursor = Some(0);
        self.drain(graph);
    }

    /// Drop everything: queue, clip in flight, and the turn buffer.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.replay_cursor = None;
        self.halt_active();
        self.turn.clear();
        self.set_status(VoiceStatus::Idle);
    }

    /// Suspend the whole output context.
    pub fn pause(&mut self, graph: &MixingGraph) {
        if !graph.is_open() || graph.is_suspended() {
            return;
        }
        graph.suspend();
        self.refresh_status(graph);
    }

    pub fn resume(&mut self, graph: &MixingGraph) {
        if !graph.is_suspended() {
            return;
        }
        graph.resume();
        self.refresh_status(graph);
    }

    fn halt_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.stop();
        }
    }

    fn refresh_status(&mut self, graph: &MixingGraph) {
        let status = if graph.is_suspended() {
            VoiceStatus::Paused
        } else if self.active.is_some() {
            VoiceStatus::Playing
        } else {
            VoiceStatus::Idle
        };
        self.set_status(status);
    }

    fn set_status(&mut self, status: VoiceStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        if let Some(observer) = self.observer.as_mut() {
            observer(status);
        }
    }
}
