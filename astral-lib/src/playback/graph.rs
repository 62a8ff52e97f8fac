//! The shared output context and its four channel gains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use rodio::Source;

use crate::audio::{AudioError, AudioMode, Channel};
use crate::dsp::gain::{sanitize_gain, SharedGain};

use super::output::{OutputBackend, RodioOutput};
use super::route::{ContextState, EndCallback, RouteStage};

type Opener = Box<dyn FnMut() -> Result<Box<dyn OutputBackend>, AudioError>>;

/// Stop switch for one routed source.
///
/// Stopping is idempotent; stopping a source that already ended is a no-op.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    stop: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Owns the output context, the per-channel gains and the audio mode.
///
/// The context is created lazily on first use and torn down by
/// [`MixingGraph::close`]. Channel volumes survive a close and are applied
/// to the gains of the next context.
pub struct MixingGraph {
    opener: Opener,
    output: Option<Box<dyn OutputBackend>>,
    context: Arc<ContextState>,
    gains: [Option<SharedGain>; 4],
    volumes: [f32; 4],
    mode: AudioMode,
}

impl MixingGraph {
    pub fn new<F>(opener: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn OutputBackend>, AudioError> + 'static,
    {
        Self {
            opener: Box::new(opener),
            output: None,
            context: Arc::new(ContextState::default()),
            gains: [None, None, None, None],
            volumes: [1.0; 4],
            mode: AudioMode::Full,
        }
    }

    /// Graph backed by the default rodio device.
    pub fn with_default_output() -> Self {
        Self::new(|| RodioOutput::open().map(|out| Box::new(out) as Box<dyn OutputBackend>))
    }

    /// Open the output context if there is none yet.
    pub fn ensure_output_ready(&mut self) -> Result<(), AudioError> {
        if self.output.is_some() {
            return Ok(());
        }
        let output = (self.opener)()?;
        if self.context.closed.load(Ordering::Relaxed) {
            self.context = Arc::new(ContextState::default());
        }
        self.output = Some(output);
        debug!("output context ready");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }

    /// Persistent gain for `channel`, created on first use.
    ///
    /// Every call returns a handle to the same gain until the graph is closed.
    pub fn channel_gain(&mut self, channel: Channel) -> SharedGain {
        let volume = self.volumes[channel.index()];
        self.gains[channel.index()]
            .get_or_insert_with(|| SharedGain::new(volume))
            .clone()
    }

    /// Set the volume of `channel`; applies to sources already playing on it.
    pub fn set_volume(&mut self, channel: Channel, value: f32) {
        let value = sanitize_gain(value);
        self.volumes[channel.index()] = value;
        self.channel_gain(channel).set(value);
    }

    pub fn volume(&self, channel: Channel) -> f32 {
        self.volumes[channel.index()]
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
    }

    /// Suspend every source in the context.
    pub fn suspend(&self) {
        self.context.suspended.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.context.suspended.store(false, Ordering::Relaxed);
    }

    pub fn is_suspended(&self) -> bool {
        self.context.suspended.load(Ordering::Relaxed)
    }

    /// Route `source` through the gain of `channel` into the output.
    ///
    /// `on_end` runs once, on the audio thread, when the source ends or is
    /// stopped.
    pub(crate) fn connect<S>(
        &mut self,
        channel: Channel,
        source: S,
        on_end: Option<EndCallback>,
    ) -> Result<PlaybackHandle, AudioError>
    where
        S: Source + Send + 'static,
    {
        self.ensure_output_ready()?;
        let gain = self.channel_gain(channel);
        let stop = Arc::new(AtomicBool::new(false));
        let stage = RouteStage::new(source, gain, self.context.clone(), stop.clone(), on_end);
        if let Some(output) = self.output.as_mut() {
            output.add(Box::new(stage));
        }
        Ok(PlaybackHandle { stop })
    }

    /// Tear down the context: every source ends and the gains are dropped.
    pub fn close(&mut self) {
        if self.output.is_none() {
            return;
        }
        self.context.closed.store(true, Ordering::Relaxed);
        self.output = None;
        self.gains = [None, None, None, None];
        info!("output context closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ClipSource, DecodedClip};
    use crate::playback::output::testing::recording_graph;

    fn ones(frames: usize) -> ClipSource {
        ClipSource::once(Arc::new(DecodedClip::new(vec![1.0; frames], 1, 8_000)))
    }

    #[test]
    fn channel_gain_is_persistent() {
        let (mut graph, _output) = recording_graph();
        let first = graph.channel_gain(Channel::Npc);
        let second = graph.channel_gain(Channel::Npc);
        assert!(first.same_as(&second));
        assert!(!first.same_as(&graph.channel_gain(Channel::Narrator)));
    }

    #[test]
    fn volume_change_reaches_playing_source() {
        let (mut graph, output) = recording_graph();
        graph.connect(Channel::Sfx, ones(100), None).unwrap();
        assert_eq!(output.pull(0, 1), vec![1.0]);

        graph.set_volume(Channel::Sfx, 0.5);
        assert_eq!(output.pull(0, 1), vec![0.5]);
        assert_eq!(graph.volume(Channel::Sfx), 0.5);
    }

    #[test]
    fn suspend_holds_position() {
        let (mut graph, output) = recording_graph();
        graph.connect(Channel::Narrator, ones(10), None).unwrap();
        let _ = output.pull(0, 4);

        graph.suspend();
        assert!(output.pull(0, 50).iter().all(|s| *s == 0.0));
        graph.resume();
        assert_eq!(output.finish(0), 6);
    }

    #[test]
    fn stop_ends_source_and_fires_callback_once() {
        let (mut graph, output) = recording_graph();
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = fired.clone();
        let on_end: EndCallback = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let handle = graph.connect(Channel::Npc, ones(100), Some(on_end)).unwrap();
        handle.stop();
        handle.stop();
        assert_eq!(output.finish(0), 0);
        assert_eq!(output.finish(0), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_ends_sources_and_keeps_volumes() {
        let (mut graph, output) = recording_graph();
        graph.set_volume(Channel::Ambient, 0.3);
        let before = graph.channel_gain(Channel::Ambient);
        graph.connect(Channel::Ambient, ones(100), None).unwrap();

        graph.close();
        assert!(!graph.is_open());
        assert_eq!(output.finish(0), 0);

        graph.ensure_output_ready().unwrap();
        let after = graph.channel_gain(Channel::Ambient);
        assert!(!before.same_as(&after));
        assert_eq!(after.get(), 0.3);
    }
}
