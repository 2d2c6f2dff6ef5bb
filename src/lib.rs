//! Multilingual speech narration for plant diagnosis results.
//!
//! Components:
//! - `preparer`: diagnosis result → translated narration text
//! - `segmenter`: narration text → bounded, ordered segments
//! - `voices`: catalog resolution with per-session voice binding
//! - `broadcast`: session manager + playback state machine
//! - `engine`: narration engine contract (event-driven collaborator)
//! - `translator`: translation backend contract + HTTP adapter
//! - `api`: HTTP control surface for the surrounding dashboard

pub mod api;
pub mod broadcast;
pub mod config;
pub mod diagnosis;
pub mod engine;
pub mod history;
pub mod lexicon;
pub mod preparer;
pub mod segmenter;
pub mod translator;
pub mod voices;
