//! Mock collaborators for pipeline integration tests.
//!
//! The mocks talk to each other through the files they write: narration
//! audio holds `duration=<secs>`, the duration probe reads it back, the
//! encoder writes the `-t` value into each clip, and concat sums the clips.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use storyreel_cloud::{ObjectStore, StorageError};
use storyreel_core::ffmpeg::{parse_manifest, DurationProbe, FfmpegError};
use storyreel_core::subprocess::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use storyreel_core::types::Segment;
use storyreel_imagegen::api::PredictionOutput;
use storyreel_imagegen::{
    GenerationOptions, ImageGenError, ImageGenerator, PollPolicy, Prediction, PredictionApi,
    PredictionRequest,
};
use storyreel_pipeline::{Pipeline, PipelineConfig, PipelineDeps, PublishTarget};
use storyreel_tts::{SpeechApi, SpeechError, SpeechRequest};

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
pub const BUCKET: &str = "halloween";
pub const PUBLIC_BASE: &str = "https://cdn.example.com";

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Voice {
    pub duration_secs: f64,
    pub delay: Duration,
    pub fail_status: Option<u16>,
}

impl Voice {
    pub fn lasting(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            delay: Duration::ZERO,
            fail_status: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }
}

/// Scripted narration keyed by input text. Unknown text gets 1.0s.
#[derive(Default)]
pub struct MockSpeech {
    voices: HashMap<String, Voice>,
    pub calls: AtomicUsize,
}

impl MockSpeech {
    pub fn with(mut self, text: &str, voice: Voice) -> Self {
        self.voices.insert(text.to_string(), voice);
        self
    }
}

#[async_trait::async_trait]
impl SpeechApi for MockSpeech {
    fn request_for(&self, text: &str) -> SpeechRequest {
        SpeechRequest {
            model: "tts-1".into(),
            input: text.to_string(),
            voice: "onyx".into(),
        }
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let voice = self
            .voices
            .get(&request.input)
            .cloned()
            .unwrap_or_else(|| Voice::lasting(1.0));

        if !voice.delay.is_zero() {
            tokio::time::sleep(voice.delay).await;
        }
        if let Some(status) = voice.fail_status {
            return Err(SpeechError::ApiError {
                status,
                body: format!("synthetic failure for '{}'", request.input),
            });
        }
        Ok(format!("duration={}", voice.duration_secs).into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Duration probe
// ---------------------------------------------------------------------------

/// Reads the `duration=<secs>` marker written by the other mocks.
pub struct FileDurationProbe;

#[async_trait::async_trait]
impl DurationProbe for FileDurationProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64, FfmpegError> {
        let content = tokio::fs::read_to_string(path).await?;
        let raw = content
            .trim()
            .strip_prefix("duration=")
            .ok_or_else(|| FfmpegError::ParseError(content.clone()))?;
        storyreel_core::ffmpeg::parse_probe_duration(raw)
    }
}

// ---------------------------------------------------------------------------
// Image service
// ---------------------------------------------------------------------------

/// Answers every submit with output already present.
#[derive(Default)]
pub struct ImmediateImages {
    pub submits: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl PredictionApi for ImmediateImages {
    async fn submit(&self, request: &PredictionRequest) -> Result<Prediction, ImageGenError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts
            .lock()
            .unwrap()
            .push(request.input.prompt.clone());
        Ok(Prediction {
            id: Some(format!("job-{n}")),
            status: Some("succeeded".into()),
            output: Some(PredictionOutput::Many(vec![format!(
                "https://images.example/{n}.png"
            )])),
            ..Default::default()
        })
    }

    async fn poll(&self, poll_url: &str) -> Result<Prediction, ImageGenError> {
        panic!("immediate jobs are never polled ({poll_url})");
    }

    async fn download(&self, _output_url: &str) -> Result<Vec<u8>, ImageGenError> {
        Ok(PNG_MAGIC.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tool runner
// ---------------------------------------------------------------------------

/// Fake ffmpeg: writes the output files the real one would and records
/// what it was asked to do.
pub struct MockFfmpeg {
    pub encode_delay: Duration,
    /// Clip file names whose encode exits non-zero.
    pub failing_clips: Vec<String>,
    pub concat_exit_code: i32,

    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub encodes: AtomicUsize,
    pub concats: AtomicUsize,
    pub manifests: Mutex<Vec<Vec<String>>>,
    pub encode_args: Mutex<Vec<ToolInvocation>>,
    /// Clip paths in the order their encodes finished.
    pub finished: Mutex<Vec<String>>,
}

impl Default for MockFfmpeg {
    fn default() -> Self {
        Self {
            encode_delay: Duration::from_millis(20),
            failing_clips: Vec::new(),
            concat_exit_code: 0,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            encodes: AtomicUsize::new(0),
            concats: AtomicUsize::new(0),
            manifests: Mutex::new(Vec::new()),
            encode_args: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }
}

impl MockFfmpeg {
    async fn encode(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.encode_args.lock().unwrap().push(invocation.clone());

        let started = Instant::now();
        tokio::time::sleep(self.encode_delay).await;

        let output = invocation.last_arg().unwrap_or_default().to_string();
        let duration = invocation.flag_value("-t").unwrap_or("0").to_string();
        let failing = self
            .failing_clips
            .iter()
            .any(|name| output.ends_with(name.as_str()));

        let result = if failing {
            Ok(ToolOutput {
                stderr: "Error while filtering: synthetic".into(),
                exit_code: 1,
                duration_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            })
        } else if invocation.stdin.as_deref().map_or(true, <[u8]>::is_empty) {
            Ok(ToolOutput {
                stderr: "pipe:0: Invalid data found when processing input".into(),
                exit_code: 1,
                ..Default::default()
            })
        } else {
            tokio::fs::write(&output, format!("duration={duration}")).await?;
            self.finished.lock().unwrap().push(output);
            Ok(ToolOutput {
                duration_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            })
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn concat(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.concats.fetch_add(1, Ordering::SeqCst);
        let manifest_path = invocation.flag_value("-i").unwrap_or_default().to_string();
        let manifest = tokio::fs::read_to_string(&manifest_path).await?;
        let clips = parse_manifest(&manifest);
        self.manifests.lock().unwrap().push(clips.clone());

        if self.concat_exit_code != 0 {
            return Ok(ToolOutput {
                stderr: "Impossible to open clip".into(),
                exit_code: self.concat_exit_code,
                ..Default::default()
            });
        }

        let mut total = 0.0;
        for clip in &clips {
            let content = tokio::fs::read_to_string(clip).await?;
            total += content
                .trim()
                .strip_prefix("duration=")
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
        }
        let output = invocation.last_arg().unwrap_or_default().to_string();
        tokio::fs::write(&output, format!("duration={total}")).await?;
        Ok(ToolOutput::default())
    }
}

#[async_trait::async_trait]
impl ToolRunner for MockFfmpeg {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        match invocation.flag_value("-f") {
            Some("concat") => self.concat(invocation).await,
            _ => self.encode(invocation).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingStore {
    pub puts: Mutex<Vec<PutRecord>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl ObjectStore for RecordingStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body_path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = tokio::fs::read_to_string(body_path)
            .await
            .map_err(|e| StorageError::Source {
                path: body_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        if self.fail {
            return Err(StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "503 Slow Down".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub speech: Arc<MockSpeech>,
    pub images: Arc<ImmediateImages>,
    pub ffmpeg: Arc<MockFfmpeg>,
    pub store: Arc<RecordingStore>,
    pub work_dir: tempfile::TempDir,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(speech: MockSpeech, ffmpeg: MockFfmpeg, store: RecordingStore, max_encodes: usize) -> Self {
        let speech = Arc::new(speech);
        let images = Arc::new(ImmediateImages::default());
        let ffmpeg = Arc::new(ffmpeg);
        let store = Arc::new(store);
        let work_dir = tempfile::tempdir().unwrap();

        let generator = ImageGenerator::new(
            images.clone(),
            GenerationOptions::default(),
            PollPolicy::default(),
        );
        let deps = PipelineDeps {
            speech: speech.clone(),
            images: Arc::new(generator),
            store: store.clone(),
            runner: ffmpeg.clone(),
            probe: Arc::new(FileDurationProbe),
        };
        let config = PipelineConfig {
            work_dir: work_dir.path().to_path_buf(),
            max_encodes,
            ..PipelineConfig::default()
        };
        let target = PublishTarget {
            bucket: BUCKET.into(),
            public_base_url: PUBLIC_BASE.into(),
        };

        Self {
            speech,
            images,
            ffmpeg,
            store,
            pipeline: Pipeline::new(deps, config, target),
            work_dir,
        }
    }

    /// Entries left under the work root (should be none after a run).
    pub fn leftovers(&self) -> Vec<String> {
        std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

pub fn segments(texts: &[&str]) -> Vec<Segment> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Segment::new(i as u32 + 1, *t))
        .collect()
}
