//! Session plumbing: wire protocol, reconciler, opening cache, and transport.

pub mod cache;
pub mod campaigns;
pub mod character;
pub mod error;
pub mod protocol;
pub mod reconciler;
pub mod roll;
pub mod transcript;
pub mod transport;

pub use cache::{FileStore, KeyValueStore, MemoryStore, OpeningCache};
pub use campaigns::{CampaignDirectory, CampaignSummary, ImportAccepted};
pub use character::CharacterState;
pub use error::SessionError;
pub use protocol::{ClientMessage, ControlMessage, ServerEvent};
pub use reconciler::{ConnectionState, Reconciler, Routed};
pub use roll::{RollRequest, RollResult, RollType};
pub use transcript::{ChatMessage, Role};
pub use transport::{session_url, SessionTransport, TransportEvent};
