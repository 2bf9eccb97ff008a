//! Fan-out of per-segment work.
//!
//! Every segment runs as its own task: narration and image generation
//! concurrently, then encoding. Network calls share a loose request cap;
//! encoder subprocesses share the hard encoder cap inside
//! [`SegmentEncoder`]. Each task writes its clip into the slot at its
//! segment index, so output order never depends on completion order.
//!
//! A failing segment does not stop its siblings. The controller waits for
//! every task, then reports all failures together. Dropping the controller
//! future aborts every task it spawned.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use storyreel_core::types::{Segment, SegmentNumber};

use crate::encoder::{SegmentClip, SegmentEncoder};
use crate::error::{SegmentError, SegmentFailures};
use crate::image::ImageSynthesizer;
use crate::narration::NarrationSynthesizer;
use crate::workspace::WorkspaceLayout;

/// Everything a segment task needs, shared by all tasks of all runs.
pub struct SegmentStages {
    pub narration: NarrationSynthesizer,
    pub image: ImageSynthesizer,
    pub encoder: SegmentEncoder,
    /// Loose cap on in-flight narration/image calls.
    pub requests: Arc<Semaphore>,
}

impl SegmentStages {
    /// Narration and image in parallel, then encode.
    async fn process(
        &self,
        layout: &WorkspaceLayout,
        segment: &Segment,
    ) -> Result<SegmentClip, SegmentError> {
        let narration = async {
            let _permit = self.request_permit().await?;
            self.narration.synthesize(layout, segment).await
        };
        let image = async {
            let _permit = self.request_permit().await?;
            self.image.synthesize(segment).await
        };
        let (narration, image) = tokio::try_join!(narration, image)?;

        self.encoder
            .encode(layout, segment.number, image, &narration)
            .await
    }

    async fn request_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, SegmentError> {
        self.requests
            .acquire()
            .await
            .map_err(|_| SegmentError::Aborted("request pool closed".to_string()))
    }
}

/// Run every segment to completion and return the clips in segment order.
///
/// `segments` must already be validated (numbers contiguous from 1). A
/// tripped `cancel` fails every unfinished segment with
/// [`SegmentError::Cancelled`]; in-flight subprocesses are killed when
/// their futures are dropped.
pub async fn run_segments(
    stages: Arc<SegmentStages>,
    layout: &WorkspaceLayout,
    segments: Vec<Segment>,
    cancel: &CancellationToken,
) -> Result<Vec<SegmentClip>, SegmentFailures> {
    let slots: Arc<Mutex<Vec<Option<SegmentClip>>>> =
        Arc::new(Mutex::new(vec![None; segments.len()]));
    let failures: Arc<Mutex<Vec<(SegmentNumber, SegmentError)>>> =
        Arc::new(Mutex::new(Vec::new()));

    let numbers: Vec<SegmentNumber> = segments.iter().map(|s| s.number).collect();
    let handles: Vec<_> = segments
        .into_iter()
        .map(|segment| {
            let stages = Arc::clone(&stages);
            let layout = layout.clone();
            let slots = Arc::clone(&slots);
            let failures = Arc::clone(&failures);
            let cancel = cancel.clone();

            AbortOnDropHandle::new(tokio::spawn(async move {
                let number = segment.number;
                tracing::debug!(story_id = layout.story_id(), segment = number, "Segment task started");

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SegmentError::Cancelled),
                    result = stages.process(&layout, &segment) => result,
                };

                match result {
                    Ok(clip) => {
                        let mut slots = slots.lock().await;
                        match slots.get_mut(segment.index()) {
                            Some(slot) => {
                                *slot = Some(clip);
                                tracing::info!(story_id = layout.story_id(), segment = number, "Segment complete");
                            }
                            None => failures.lock().await.push((
                                number,
                                SegmentError::Validation(format!(
                                    "segment number {number} is out of range"
                                )),
                            )),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            story_id = layout.story_id(),
                            segment = number,
                            kind = ?e.kind(),
                            error = %e,
                            "Segment failed",
                        );
                        failures.lock().await.push((number, e));
                    }
                }
            }))
        })
        .collect();

    // A task that panicked never reached its own bookkeeping.
    for (number, joined) in numbers.iter().zip(join_all(handles).await) {
        if let Err(e) = joined {
            tracing::error!(segment = *number, error = %e, "Segment task aborted");
            failures
                .lock()
                .await
                .push((*number, SegmentError::Aborted(e.to_string())));
        }
    }

    let failures = std::mem::take(&mut *failures.lock().await);
    if !failures.is_empty() {
        return Err(SegmentFailures::new(failures));
    }

    let slots = std::mem::take(&mut *slots.lock().await);
    let mut clips = Vec::with_capacity(slots.len());
    let mut missing = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(clip) => clips.push(clip),
            None => missing.push((
                index as SegmentNumber + 1,
                SegmentError::Aborted("segment produced no clip".to_string()),
            )),
        }
    }
    if !missing.is_empty() {
        return Err(SegmentFailures::new(missing));
    }
    Ok(clips)
}
