//! Fire-and-forget effects, including the synthesized dice clatter.

use std::sync::Arc;

use rand::Rng;

use crate::audio::{decode_clip, AudioError, Channel, ClipSource, DecodedClip};
use crate::constants::{DICE_CLATTER, DICE_CLATTER_FREQ_HZ, DICE_CLATTER_Q, SAMPLE_RATE};
use crate::dsp::biquad::BiquadState;

use super::graph::MixingGraph;

/// Plays clips once on the sfx channel and forgets about them.
#[derive(Debug, Default)]
pub struct OneShotPlayer;

impl OneShotPlayer {
    pub fn new() -> Self {
        Self
    }

    pub fn play_effect(&self, graph: &mut MixingGraph, data: &[u8]) -> Result<(), AudioError> {
        let clip = decode_clip(data)?;
        self.play_clip(graph, clip)
    }

    /// Short filtered noise burst used as feedback for a roll.
    pub fn play_dice_clatter(&self, graph: &mut MixingGraph) -> Result<(), AudioError> {
        let samples = dice_clatter_samples(SAMPLE_RATE);
        self.play_clip(graph, DecodedClip::new(samples, 1, SAMPLE_RATE))
    }

    fn play_clip(&self, graph: &mut MixingGraph, clip: DecodedClip) -> Result<(), AudioError> {
        graph.connect(Channel::Sfx, ClipSource::once(Arc::new(clip)), None)?;
        Ok(())
    }
}

/// Mono dice clatter: exponentially decaying noise through a band-pass.
pub fn dice_clatter_samples(sample_rate: u32) -> Vec<f32> {
    let len = (sample_rate as u128 * DICE_CLATTER.as_millis() / 1_000) as usize;
    let decay = len as f32 * 0.15;
    let mut rng = rand::thread_rng();
    let noise: Vec<f32> = (0..len)
        .map(|i| rng.gen_range(-1.0_f32..1.0) * (-(i as f32) / decay).exp())
        .collect();

    let mut filter =
        BiquadState::band_pass(sample_rate, 1, DICE_CLATTER_FREQ_HZ, DICE_CLATTER_Q);
    filter.process(&noise)
}
