//! Playback: the mixing graph and the voice, ambient, and one-shot players.

pub mod ambient;
pub mod engine;
pub mod graph;
pub mod oneshot;
pub mod output;
pub(crate) mod route;
pub mod turn;
pub mod voice;

pub use ambient::AmbientLooper;
pub use engine::{AudioCue, AudioEngine};
pub use graph::{MixingGraph, PlaybackHandle};
pub use oneshot::OneShotPlayer;
pub use output::{OutputBackend, RodioOutput, SilentOutput};
pub use turn::TurnBuffer;
pub use voice::{EventSink, PlaybackEvent, PlaybackToken, VoiceClip, VoiceSequencer, VoiceStatus};
