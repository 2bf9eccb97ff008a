//! Text-to-speech client for segment narration.
//!
//! [`SpeechApi`] is the narration boundary the pipeline depends on;
//! [`OpenAiSpeech`] implements it against an OpenAI-compatible
//! `/audio/speech` endpoint.

pub mod api;
pub mod config;

pub use api::{OpenAiSpeech, SpeechApi, SpeechError, SpeechRequest};
pub use config::SpeechConfig;
