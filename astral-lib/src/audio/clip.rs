//! Decoded clips and the rodio source that plays them.

use std::sync::Arc;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

/// Fully decoded interleaved PCM, shared between the turn buffer and playback.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Arc<[f32]>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedClip {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Peak absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

/// Plays a [`DecodedClip`] once or on repeat without copying its samples.
#[derive(Debug, Clone)]
pub struct ClipSource {
    clip: Arc<DecodedClip>,
    position: usize,
    looping: bool,
}

impl ClipSource {
    pub fn once(clip: Arc<DecodedClip>) -> Self {
        Self {
            clip,
            position: 0,
            looping: false,
        }
    }

    pub fn looping(clip: Arc<DecodedClip>) -> Self {
        Self {
            clip,
            position: 0,
            looping: true,
        }
    }
}

impl Iterator for ClipSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let samples = &self.clip.samples;
        if self.position >= samples.len() {
            if !self.looping || samples.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let sample = samples[self.position];
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.looping {
            return (usize::MAX, None);
        }
        let remaining = self.clip.samples.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl Source for ClipSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.clip.channels
    }

    fn sample_rate(&self) -> u32 {
        self.clip.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        if self.looping {
            None
        } else {
            Some(self.clip.duration())
        }
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        let frame = (pos.as_secs_f64() * self.clip.sample_rate as f64) as usize;
        let target = frame * self.clip.channels as usize;
        self.position = if self.looping && !self.clip.samples.is_empty() {
            target % self.clip.samples.len()
        } else {
            target.min(self.clip.samples.len())
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> Arc<DecodedClip> {
        Arc::new(DecodedClip::new(vec![0.1, 0.2, 0.3, 0.4], 2, 8_000))
    }

    #[test]
    fn once_ends_after_all_samples() {
        let collected: Vec<f32> = ClipSource::once(clip()).collect();
        assert_eq!(collected, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn looping_wraps_around() {
        let collected: Vec<f32> = ClipSource::looping(clip()).take(6).collect();
        assert_eq!(collected, vec![0.1, 0.2, 0.3, 0.4, 0.1, 0.2]);
    }

    #[test]
    fn duration_counts_frames() {
        let clip = DecodedClip::new(vec![0.0; 16_000], 2, 8_000);
        assert_eq!(clip.frames(), 8_000);
        assert_eq!(clip.duration(), Duration::from_secs(1));
    }
}
