//! Novel Player — a branching visual-novel runtime with procedural ambience.
//!
//! Plays RON-authored stories line by line with a typewriter reveal,
//! keeps a rewindable dialogue history with save/resume, and synthesizes
//! an ambient soundscape from scene tags using a small oscillator and
//! noise signal graph.

pub mod audio;
pub mod core;
pub mod schema;

pub use crate::core::player::{NovelPlayer, Phase, PlayerError};
