//! Band-pass biquad used to shape synthesized effects.

use std::f32::consts::PI;

#[derive(Clone, Copy, Debug)]
struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// Per-channel direct form I biquad over interleaved samples.
#[derive(Clone, Debug)]
pub struct BiquadState {
    channels: usize,
    coeffs: BiquadCoefficients,
    x_n1: Vec<f32>,
    x_n2: Vec<f32>,
    y_n1: Vec<f32>,
    y_n2: Vec<f32>,
}

impl BiquadState {
    /// Constant 0 dB peak gain band-pass centred on `freq`.
    pub fn band_pass(sample_rate: u32, channels: usize, freq: u32, q: f32) -> Self {
        let freq = sanitize_freq(freq, sample_rate);
        let q = sanitize_q(q);
        let channels = channels.max(1);
        Self {
            channels,
            coeffs: band_pass_coefficients(sample_rate, freq, q),
            x_n1: vec![0.0; channels],
            x_n2: vec![0.0; channels],
            y_n1: vec![0.0; channels],
            y_n2: vec![0.0; channels],
        }
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples.len());
        let channels = self.channels;
        for (idx, &sample) in samples.iter().enumerate() {
            let ch = idx % channels;
            let result = self.coeffs.b0 * sample
                + self.coeffs.b1 * self.x_n1[ch]
                + self.coeffs.b2 * self.x_n2[ch]
                - self.coeffs.a1 * self.y_n1[ch]
                - self.coeffs.a2 * self.y_n2[ch];

            self.x_n2[ch] = self.x_n1[ch];
            self.x_n1[ch] = sample;
            self.y_n2[ch] = self.y_n1[ch];
            self.y_n1[ch] = result;

            out.push(result);
        }

        out
    }
}

fn sanitize_freq(freq: u32, sample_rate: u32) -> u32 {
    let nyquist = sample_rate / 2;
    if nyquist <= 1 {
        return 1;
    }
    freq.clamp(1, nyquist.saturating_sub(1).max(1))
}

fn sanitize_q(q: f32) -> f32 {
    if !q.is_finite() {
        return 0.5;
    }
    q.clamp(0.1, 10.0)
}

fn band_pass_coefficients(sample_rate: u32, freq: u32, q: f32) -> BiquadCoefficients {
    let w0 = 2.0 * PI * freq as f32 / sample_rate.max(1) as f32;
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;

    BiquadCoefficients {
        b0: alpha / a0,
        b1: 0.0,
        b2: -alpha / a0,
        a1: -2.0 * w0.cos() / a0,
        a2: (1.0 - alpha) / a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn band_pass_keeps_centre_and_cuts_lows() {
        let rate = 44_100;
        let mut centre = BiquadState::band_pass(rate, 1, 3_000, 1.5);
        let mut low = BiquadState::band_pass(rate, 1, 3_000, 1.5);
        let passed = centre.process(&sine(3_000.0, rate, 8_820));
        let cut = low.process(&sine(100.0, rate, 8_820));
        // skip the transient
        assert!(rms(&passed[4_410..]) > 0.6);
        assert!(rms(&cut[4_410..]) < 0.1);
    }

    #[test]
    fn band_pass_blocks_dc_per_channel() {
        let mut filter = BiquadState::band_pass(48_000, 2, 1_000, 0.707);
        let out = filter.process(&vec![1.0; 4_000]);
        assert!(out[3_998].abs() < 0.01);
        assert!(out[3_999].abs() < 0.01);
    }
}
