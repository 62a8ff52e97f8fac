//! # Astral Session Library
//!
//! This library provides the playback engine and session plumbing for the Astral
//! tabletop client. It includes the four-channel mixing graph, sequenced speech
//! with turn replay, crossfaded ambient beds, one-shot effects, and the session
//! stream reconciler that merges a cached opening with the live connection.

pub mod audio;
pub mod constants;
pub mod dsp;
pub mod playback;
pub mod session;
