//! Shared domain types and media-tool plumbing for the story video pipeline.
//!
//! This crate has no network dependencies. It defines the story/segment
//! model, segment markup parsing, the external-tool runner used for every
//! `ffmpeg`/`ffprobe` invocation, and the ffmpeg argument builders.

pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod segmentation;
pub mod subprocess;
pub mod types;
