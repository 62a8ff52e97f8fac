//! Audio primitives: channels, modes, decoded clips, and decoding.

pub mod channel;
pub mod clip;
pub mod decode;
pub mod error;

pub use channel::{AudioMode, Channel};
pub use clip::{ClipSource, DecodedClip};
pub use decode::decode_clip;
pub use error::AudioError;
