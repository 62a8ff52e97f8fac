//! DSP building blocks: biquad filtering, shared gains, and fade envelopes.

pub mod biquad;
pub mod fade;
pub mod gain;
