//! Looping ambient beds with crossfades.

use std::sync::Arc;

use log::debug;

use crate::audio::{decode_clip, AudioError, Channel, ClipSource};
use crate::constants::{AMBIENT_FADE, AMBIENT_STOP_MARGIN};
use crate::dsp::fade::{FadeControl, FadeStage};

use super::graph::{MixingGraph, PlaybackHandle};

struct Bed {
    fade: FadeControl,
    handle: PlaybackHandle,
}

/// Keeps at most one current bed and one outgoing bed.
#[derive(Default)]
pub struct AmbientLooper {
    current: Option<Bed>,
    outgoing: Option<Bed>,
}

impl AmbientLooper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crossfade from the current bed (if any) to `data`, looped forever.
    ///
    /// The bed signal passes through its own fade gain and then the ambient
    /// channel gain.
    pub fn play(&mut self, graph: &mut MixingGraph, data: &[u8]) -> Result<(), AudioError> {
        let clip = Arc::new(decode_clip(data)?);

        if let Some(previous) = self.outgoing.take() {
            previous.handle.stop();
        }
        if let Some(current) = self.current.take() {
            current
                .fade
                .ramp_then_stop(0.0, AMBIENT_FADE, AMBIENT_FADE + AMBIENT_STOP_MARGIN);
            self.outgoing = Some(current);
        }

        let fade = FadeControl::new(0.0);
        fade.ramp_to(1.0, AMBIENT_FADE);
        let source = FadeStage::new(ClipSource::looping(clip), &fade);
        let handle = graph.connect(Channel::Ambient, source, None)?;
        debug!("ambient bed started");
        self.current = Some(Bed { fade, handle });
        Ok(())
    }

    /// Hard-stop every bed without fading.
    pub fn stop(&mut self) {
        for bed in [self.current.take(), self.outgoing.take()].into_iter().flatten() {
            bed.handle.stop();
        }
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Whether a bed is still fading out.
    pub fn has_outgoing(&self) -> bool {
        self.outgoing
            .as_ref()
            .is_some_and(|bed| !bed.fade.is_finished())
    }

    pub fn current_gain(&self) -> Option<f32> {
        self.current.as_ref().map(|bed| bed.fade.current())
    }

    pub fn outgoing_gain(&self) -> Option<f32> {
        self.outgoing.as_ref().map(|bed| bed.fade.current())
    }
}
