//! Shared constants for playback and session defaults.

use std::time::Duration;

/// Sample rate used for synthesized clips (Hz).
///
/// Decoded clips keep their own rate; the output mixer resamples as needed.
pub const SAMPLE_RATE: u32 = 44_100;

/// Crossfade window between ambient beds.
pub const AMBIENT_FADE: Duration = Duration::from_secs(2);

/// Extra time an outgoing ambient bed keeps running after its fade reaches zero.
pub const AMBIENT_STOP_MARGIN: Duration = Duration::from_millis(100);

/// Length of the synthesized dice clatter.
pub const DICE_CLATTER: Duration = Duration::from_millis(300);

/// Centre frequency of the dice clatter band-pass (Hz).
pub const DICE_CLATTER_FREQ_HZ: u32 = 3_000;

/// Resonance of the dice clatter band-pass.
pub const DICE_CLATTER_Q: f32 = 1.5;

/// Storage key of the single opening-cache slot.
pub const OPENING_CACHE_KEY: &str = "astral-opening";

/// Default session server when none is configured.
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

pub(crate) const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
pub(crate) const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
