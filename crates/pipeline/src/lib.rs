//! Story → narrated video pipeline.
//!
//! A run validates the segments, allocates a [`Workspace`], then for every
//! segment synthesizes narration and an image concurrently and encodes the
//! pair into a clip ([`controller::run_segments`]). Clips are concatenated
//! in segment order, the result is published, and the workspace is removed
//! whatever the outcome.
//!
//! External services are injected as trait objects through
//! [`PipelineDeps`], so the whole run can be driven by mocks.

pub mod concat;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod image;
pub mod narration;
pub mod publish;
pub mod run;
pub mod workspace;

pub use concat::Concatenator;
pub use config::PipelineConfig;
pub use controller::{run_segments, SegmentStages};
pub use encoder::{SegmentClip, SegmentEncoder};
pub use error::{PipelineError, SegmentError, SegmentErrorKind, SegmentFailures};
pub use image::ImageSynthesizer;
pub use narration::{Narration, NarrationSynthesizer};
pub use publish::{object_key, ArtifactPublisher, PublishTarget, PublishedVideo};
pub use run::{Pipeline, PipelineDeps, RunReport};
pub use workspace::{Workspace, WorkspaceLayout};
