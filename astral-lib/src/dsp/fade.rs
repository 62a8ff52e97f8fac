//! Sample-accurate gain ramps driven from the control thread.
//!
//! A [`FadeControl`] is held by whoever schedules the fade; the matching
//! [`FadeStage`] wraps a source inside the mixer and applies the ramp one
//! frame at a time. Commands are handed over through a pending flag so the
//! audio thread only touches the mutex when something changed.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

#[derive(Debug, Clone, Copy)]
struct FadeCommand {
    target: f32,
    duration: Duration,
    stop_after: Option<Duration>,
}

#[derive(Debug)]
struct FadeShared {
    command: Mutex<Option<FadeCommand>>,
    pending: AtomicBool,
    current: AtomicU32,
    finished: AtomicBool,
}

/// Control-side handle for a fade envelope.
#[derive(Debug, Clone)]
pub struct FadeControl {
    shared: Arc<FadeShared>,
}

impl FadeControl {
    pub fn new(initial: f32) -> Self {
        Self {
            shared: Arc::new(FadeShared {
                command: Mutex::new(None),
                pending: AtomicBool::new(false),
                current: AtomicU32::new(initial.to_bits()),
                finished: AtomicBool::new(false),
            }),
        }
    }

    /// Ramp linearly from the current gain to `target` over `duration`.
    pub fn ramp_to(&self, target: f32, duration: Duration) {
        self.schedule(FadeCommand {
            target,
            duration,
            stop_after: None,
        });
    }

    /// Ramp to `target`, then end the wrapped source `stop_after` from now.
    pub fn ramp_then_stop(&self, target: f32, duration: Duration, stop_after: Duration) {
        self.schedule(FadeCommand {
            target,
            duration,
            stop_after: Some(stop_after),
        });
    }

    /// Gain most recently applied by the stage.
    pub fn current(&self) -> f32 {
        f32::from_bits(self.shared.current.load(Ordering::Relaxed))
    }

    /// Whether the stage has ended its source.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    fn schedule(&self, command: FadeCommand) {
        *self.shared.command.lock().unwrap() = Some(command);
        self.shared.pending.store(true, Ordering::Release);
    }
}

/// Applies a [`FadeControl`] envelope to a source.
pub struct FadeStage<S> {
    inner: S,
    shared: Arc<FadeShared>,
    channels: u16,
    sample_rate: u32,
    channel_pos: u16,
    frames: u64,
    gain: f32,
    ramp_from: f32,
    ramp_to: f32,
    ramp_start: u64,
    ramp_frames: u64,
    stop_at: Option<u64>,
}

impl<S: Source> FadeStage<S> {
    pub fn new(inner: S, control: &FadeControl) -> Self {
        let gain = control.current();
        let channels = inner.channels().max(1);
        let sample_rate = inner.sample_rate().max(1);
        Self {
            inner,
            shared: control.shared.clone(),
            channels,
            sample_rate,
            channel_pos: 0,
            frames: 0,
            gain,
            ramp_from: gain,
            ramp_to: gain,
            ramp_start: 0,
            ramp_frames: 0,
            stop_at: None,
        }
    }

    fn frames_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    fn apply_pending(&mut self) {
        if !self.shared.pending.swap(false, Ordering::Acquire) {
            return;
        }
        let command = match self.shared.command.lock().unwrap().take() {
            Some(command) => command,
            None => return,
        };
        self.ramp_from = self.gain;
        self.ramp_to = command.target;
        self.ramp_start = self.frames;
        self.ramp_frames = self.frames_for(command.duration);
        self.stop_at = command
            .stop_after
            .map(|after| self.frames + self.frames_for(after));
    }

    fn advance_frame(&mut self) {
        let elapsed = self.frames.saturating_sub(self.ramp_start);
        self.gain = if elapsed >= self.ramp_frames {
            self.ramp_to
        } else {
            let t = elapsed as f32 / self.ramp_frames as f32;
            self.ramp_from + (self.ramp_to - self.ramp_from) * t
        };
        self.shared
            .current
            .store(self.gain.to_bits(), Ordering::Relaxed);
    }

    fn finish(&mut self) -> Option<f32> {
        self.shared.finished.store(true, Ordering::Release);
        None
    }
}

impl<S: Source> Iterator for FadeStage<S> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.channel_pos == 0 {
            self.apply_pending();
            if self.stop_at.is_some_and(|stop| self.frames >= stop) {
                return self.finish();
            }
            self.advance_frame();
        }

        let sample = match self.inner.next() {
            Some(sample) => sample,
            None => return self.finish(),
        };

        self.channel_pos += 1;
        if self.channel_pos >= self.channels {
            self.channel_pos = 0;
            self.frames += 1;
        }
        Some(sample * self.gain)
    }
}

impl<S: Source> Source for FadeStage<S> {
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
            underlying_source: "FadeStage",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ClipSource, DecodedClip};

    fn constant(rate: u32) -> ClipSource {
        ClipSource::looping(Arc::new(DecodedClip::new(vec![1.0; 100], 1, rate)))
    }

    #[test]
    fn ramps_linearly_to_target() {
        let control = FadeControl::new(0.0);
        control.ramp_to(1.0, Duration::from_secs(1));
        let mut stage = FadeStage::new(constant(1_000), &control);

        let first = stage.next().unwrap();
        assert_eq!(first, 0.0);
        let halfway: Vec<f32> = stage.by_ref().take(499).collect();
        assert!((halfway[498] - 0.499).abs() < 0.002);
        let rest: Vec<f32> = stage.by_ref().take(600).collect();
        assert_eq!(*rest.last().unwrap(), 1.0);
        assert_eq!(control.current(), 1.0);
    }

    #[test]
    fn stops_after_scheduled_time() {
        let control = FadeControl::new(1.0);
        control.ramp_then_stop(0.0, Duration::from_millis(200), Duration::from_millis(210));
        let stage = FadeStage::new(constant(1_000), &control);

        let samples: Vec<f32> = stage.collect();
        assert_eq!(samples.len(), 210);
        assert!(samples[199] < 0.01);
        assert!(samples[200..].iter().all(|s| *s == 0.0));
        assert!(control.is_finished());
    }

    #[test]
    fn new_command_starts_from_current_gain() {
        let control = FadeControl::new(0.0);
        control.ramp_to(1.0, Duration::from_millis(100));
        let mut stage = FadeStage::new(constant(1_000), &control);
        let _ = stage.by_ref().take(50).count();
        let mid = control.current();
        assert!(mid > 0.4 && mid < 0.6);

        control.ramp_to(0.0, Duration::from_millis(100));
        let next = stage.next().unwrap();
        assert!((next - mid).abs() < 0.02);
    }
}
