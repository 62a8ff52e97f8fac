//! Lock-free gain controls shared between the control thread and audio sources.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Clamp a user-provided gain into the `0.0..=1.0` range.
///
/// Non-finite values fall back to unity.
pub fn sanitize_gain(gain: f32) -> f32 {
    if !gain.is_finite() {
        return 1.0;
    }
    gain.clamp(0.0, 1.0)
}

/// A gain value readable from the audio thread without locking.
///
/// Clones share the same underlying value, so a `set` is immediately visible
/// to every source holding a clone.
#[derive(Clone, Debug)]
pub struct SharedGain(Arc<AtomicU32>);

impl SharedGain {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(sanitize_gain(gain).to_bits())))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(sanitize_gain(gain).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Whether both handles control the same gain.
    pub fn same_as(&self, other: &SharedGain) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for SharedGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}
