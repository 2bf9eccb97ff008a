//! Asynchronous image-generation client.
//!
//! Image generation is submit-then-poll: [`api::PredictionApi`] wraps the
//! three HTTP calls (submit, poll, download), [`job::GenerationJob`] tracks
//! the job through its status transitions, and
//! [`generator::ImageGenerator`] drives the poll loop to a terminal state
//! under a bounded retry budget.

pub mod api;
pub mod config;
pub mod generator;
pub mod job;

pub use api::{ImageGenError, Prediction, PredictionApi, PredictionRequest, ReplicateApi};
pub use config::{GenerationOptions, ImageGenConfig, PollPolicy};
pub use generator::{GeneratedImage, ImageGenerator};
pub use job::{GenerationJob, JobStatus};
