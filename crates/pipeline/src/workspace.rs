//! Per-run scratch directories.
//!
//! Each run gets `<root>/story_<id>_<uuid>`, so two runs never share a
//! directory even for the same story. Inside it every file name is derived
//! from the story id and segment number, so concurrent segment tasks never
//! write to the same path.

use std::path::{Path, PathBuf};

use storyreel_core::types::{SegmentNumber, StoryId};

/// File naming inside one run directory. Cheap to clone into segment tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    story_id: StoryId,
    dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(story_id: StoryId, dir: impl Into<PathBuf>) -> Self {
        Self {
            story_id,
            dir: dir.into(),
        }
    }

    pub fn story_id(&self) -> StoryId {
        self.story_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn narration_path(&self, segment: SegmentNumber) -> PathBuf {
        self.dir
            .join(format!("story_{}_segment_{segment}.mp3", self.story_id))
    }

    pub fn clip_path(&self, segment: SegmentNumber) -> PathBuf {
        self.dir
            .join(format!("story_{}_segment_{segment}.mp4", self.story_id))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("story_{}_concat.txt", self.story_id))
    }

    pub fn final_video_path(&self) -> PathBuf {
        self.dir.join(format!("story_{}_video.mp4", self.story_id))
    }
}

/// Owns a run directory until [`Workspace::cleanup`] removes it.
///
/// If the workspace is dropped without an explicit cleanup (a cancelled
/// future, a panic), the directory is removed synchronously on drop.
#[derive(Debug)]
pub struct Workspace {
    layout: WorkspaceLayout,
    removed: bool,
}

impl Workspace {
    /// Create a fresh run directory under `root`.
    ///
    /// The returned directory is absolute even when `root` is relative:
    /// the concat demuxer resolves relative manifest entries against the
    /// manifest's own directory, not the process working directory.
    pub async fn create(root: &Path, story_id: StoryId) -> std::io::Result<Self> {
        let dir = root.join(format!("story_{story_id}_{}", uuid::Uuid::now_v7()));
        tokio::fs::create_dir_all(&dir).await?;
        let dir = tokio::fs::canonicalize(&dir).await?;

        tracing::debug!(story_id, dir = %dir.display(), "Workspace created");

        Ok(Self {
            layout: WorkspaceLayout::new(story_id, dir),
            removed: false,
        })
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn dir(&self) -> &Path {
        self.layout.dir()
    }

    /// Remove the run directory and everything in it.
    ///
    /// Best-effort: failures are logged and swallowed.
    pub async fn cleanup(mut self) {
        self.removed = true;
        let dir = self.layout.dir();
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {
                tracing::debug!(story_id = self.layout.story_id(), dir = %dir.display(), "Workspace removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    story_id = self.layout.story_id(),
                    dir = %dir.display(),
                    error = %e,
                    "Failed to remove workspace",
                );
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(self.layout.dir()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    story_id = self.layout.story_id(),
                    dir = %self.layout.dir().display(),
                    error = %e,
                    "Failed to remove workspace on drop",
                );
            }
        }
    }
}
