//! Generation job lifecycle.
//!
//! ```text
//! submitted ──(output present)──────────────► succeeded
//!     │
//!     └──► processing ──(output present)────► succeeded
//!               │  ▲ │
//!               └──┘ └──(error reported)────► failed
//!               │
//!               └──(poll budget exhausted)──► timed_out
//! ```
//!
//! Transitions only happen through [`GenerationJob::from_submission`],
//! [`GenerationJob::apply_poll`] and [`GenerationJob::time_out`]. Once a
//! job is terminal it accepts no further poll responses.

use std::fmt;

use crate::api::{ImageGenError, Prediction};

/// Status of a generation job as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Processing,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    /// Map a service status string.
    ///
    /// Only `succeeded` and `failed` (and `canceled`, which is treated as a
    /// failure) end a job; anything else keeps it processing.
    pub fn from_service(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "failed" | "canceled" => Self::Failed,
            _ => Self::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job on the image service, tracked from submission to a terminal state.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    pub poll_url: Option<String>,
    pub outputs: Vec<String>,
    pub error: Option<String>,
    /// Number of poll responses applied so far.
    pub polls: u32,
}

impl GenerationJob {
    /// Build a job from the submit response.
    ///
    /// Output already present means the job went straight to `succeeded`.
    pub fn from_submission(prediction: Prediction) -> Result<Self, ImageGenError> {
        let mut job = Self {
            id: prediction.id.clone().unwrap_or_else(|| "<unassigned>".to_string()),
            status: JobStatus::Submitted,
            poll_url: prediction.poll_url().map(str::to_string),
            outputs: Vec::new(),
            error: None,
            polls: 0,
        };
        job.absorb(&prediction)?;

        if !job.status.is_terminal() && job.poll_url.is_none() {
            return Err(ImageGenError::MissingPollUrl {
                job_id: job.id,
                status: job.status,
            });
        }
        Ok(job)
    }

    /// Apply one poll response.
    pub fn apply_poll(&mut self, prediction: Prediction) -> Result<(), ImageGenError> {
        if self.status.is_terminal() {
            return Err(ImageGenError::AlreadyTerminal {
                job_id: self.id.clone(),
                status: self.status,
            });
        }
        self.polls += 1;
        if let Some(url) = prediction.poll_url() {
            self.poll_url = Some(url.to_string());
        }
        self.absorb(&prediction)
    }

    /// Mark the job as timed out. No-op on an already-terminal job.
    pub fn time_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::TimedOut;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Convert a terminal job into its first output reference.
    pub fn into_output(self) -> Result<String, ImageGenError> {
        match self.status {
            JobStatus::Succeeded => self
                .outputs
                .into_iter()
                .next()
                .ok_or(ImageGenError::EmptyOutput { job_id: self.id }),
            JobStatus::Failed => Err(ImageGenError::JobFailed {
                job_id: self.id,
                message: self.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
            status => Err(ImageGenError::NotFinished {
                job_id: self.id,
                status,
            }),
        }
    }

    fn absorb(&mut self, prediction: &Prediction) -> Result<(), ImageGenError> {
        let outputs = prediction.outputs();
        let reported = prediction
            .status
            .as_deref()
            .map(JobStatus::from_service)
            .unwrap_or(JobStatus::Processing);
        let error = prediction.error_message();

        self.status = if !outputs.is_empty() && reported != JobStatus::Failed {
            JobStatus::Succeeded
        } else if reported == JobStatus::Failed || error.is_some() {
            JobStatus::Failed
        } else if reported == JobStatus::Succeeded {
            // "succeeded" with an empty output array is a contract violation.
            return Err(ImageGenError::EmptyOutput {
                job_id: self.id.clone(),
            });
        } else {
            JobStatus::Processing
        };

        self.outputs = outputs;
        self.error = error;
        Ok(())
    }
}
