//! Object storage for published videos.
//!
//! [`ObjectStore`] is the upload boundary; [`S3ObjectStore`] implements it
//! against any S3-compatible endpoint (Cloudflare R2, MinIO, AWS).

pub mod config;
pub mod s3;
pub mod store;

pub use config::StorageConfig;
pub use s3::S3ObjectStore;
pub use store::{ObjectStore, StorageError};
