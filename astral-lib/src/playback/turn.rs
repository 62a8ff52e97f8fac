//! Decoded speech of the current narrative turn, kept for replay.

use std::sync::Arc;

use crate::audio::{Channel, DecodedClip};

#[derive(Debug, Default)]
pub struct TurnBuffer {
    clips: Vec<(Arc<DecodedClip>, Channel)>,
}

impl TurnBuffer {
    pub fn push(&mut self, clip: Arc<DecodedClip>, channel: Channel) {
        self.clips.push((clip, channel));
    }

    pub fn get(&self, index: usize) -> Option<(Arc<DecodedClip>, Channel)> {
        self.clips
            .get(index)
            .map(|(clip, channel)| (clip.clone(), *channel))
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }
}
