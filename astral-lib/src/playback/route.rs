//! Final per-source stage: channel gain, context suspension, and stop handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

use crate::dsp::gain::SharedGain;

/// Shared on/off state of one output context.
#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub(crate) suspended: AtomicBool,
    pub(crate) closed: AtomicBool,
}

pub(crate) type EndCallback = Box<dyn FnOnce() + Send>;

pub(crate) struct RouteStage<S> {
    inner: S,
    gain: SharedGain,
    context: Arc<ContextState>,
    stop: Arc<AtomicBool>,
    channels: u16,
    sample_rate: u32,
    channel_pos: u16,
    silence_left: u16,
    on_end: Option<EndCallback>,
}

impl<S: Source> RouteStage<S> {
    pub(crate) fn new(
        inner: S,
        gain: SharedGain,
        context: Arc<ContextState>,
        stop: Arc<AtomicBool>,
        on_end: Option<EndCallback>,
    ) -> Self {
        let channels = inner.channels().max(1);
        let sample_rate = inner.sample_rate().max(1);
        Self {
            inner,
            gain,
            context,
            stop,
            channels,
            sample_rate,
            channel_pos: 0,
            silence_left: 0,
            on_end,
        }
    }

    fn end(&mut self) -> Option<f32> {
        if let Some(on_end) = self.on_end.take() {
            on_end();
        }
        None
    }
}

impl<S: Source> Iterator for RouteStage<S> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.silence_left > 0 {
            self.silence_left -= 1;
            return Some(0.0);
        }

        if self.channel_pos == 0 {
            if self.stop.load(Ordering::Relaxed) || self.context.closed.load(Ordering::Relaxed) {
                return self.end();
            }
            // Hold position while suspended; emit a whole frame of silence.
            if self.context.suspended.load(Ordering::Relaxed) {
                self.silence_left = self.channels - 1;
                return Some(0.0);
            }
        }

        let sample = match self.inner.next() {
            Some(sample) => sample,
            None => return self.end(),
        };
        self.channel_pos = (self.channel_pos + 1) % self.channels;
        Some(sample * self.gain.get())
    }
}

impl<S: Source> Source for RouteStage<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }

    fn try_seek(&mut self, _pos: Duration) -> Result<(), SeekError> {
        Err(SeekError::NotSupported {
            underlying_source: "RouteStage",
        })
    }
}

impl<S> Drop for RouteStage<S> {
    fn drop(&mut self) {
        // A source dropped by its backend before ending still counts as ended.
        if let Some(on_end) = self.on_end.take() {
            on_end();
        }
    }
}
