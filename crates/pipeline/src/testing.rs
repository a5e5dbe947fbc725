//! Scripted in-process providers and an in-memory status store for tests.
//!
//! Compiled for this crate's unit tests and, through the `test-support`
//! feature, for the worker and API integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lullaby_core::prompts::Prompt;
use lullaby_core::steps::{GenerationStep, PROGRESS_COMPLETED};
use lullaby_core::types::DbId;
use lullaby_db::models::status::JobStatus;

use crate::error::{ProviderError, StoreError};
use crate::providers::{AssetStorage, Providers, SpeechSynthesizer, TextModel, VisionModel};
use crate::store::GenerationStore;

const FAKE: &str = "fake";

fn scripted_failure(body: &str) -> ProviderError {
    ProviderError::Api {
        provider: FAKE,
        status: 500,
        body: body.to_string(),
    }
}

/// One scripted reply of a [`ScriptedTextModel`].
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
    /// Never resolves; for timeout and cancellation tests.
    Hang,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A reply of `n` words.
    pub fn words(n: usize) -> Self {
        Self::Text(vec!["sleepy"; n].join(" "))
    }
}

/// Text model that answers from a script, in order. Once the script runs
/// out every call fails.
#[derive(Default)]
pub struct ScriptedTextModel {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedTextModel {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => Err(scripted_failure("scripted text failure")),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ProviderError::EmptyResponse { provider: FAKE }),
        }
    }

    fn provider_name(&self) -> &'static str {
        FAKE
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Vision model that fails on images whose bytes start with `corrupt`,
/// never answers for `hang`, and describes everything else as a garden
/// scene.
#[derive(Default)]
pub struct FakeVision {
    calls: AtomicUsize,
}

impl FakeVision {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn describe_image(
        &self,
        image: &[u8],
        _content_type: &str,
        _instructions: &str,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.starts_with(b"corrupt") {
            return Err(scripted_failure("unreadable image"));
        }
        if image.starts_with(b"hang") {
            std::future::pending::<()>().await;
        }
        Ok(format!(
            r#"{{"description":"A garden scene ({} bytes)","setting":"garden","mood":"calm"}}"#,
            image.len()
        ))
    }
}

/// Speech synthesizer that returns fixed bytes, or always fails.
#[derive(Default)]
pub struct FakeSpeech {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSpeech {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(scripted_failure("voice unavailable"));
        }
        Ok(b"ID3fake-mp3".to_vec())
    }
}

/// In-memory object store with `memory://` URLs.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|o| o.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl AssetStorage for MemoryStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ProviderError> {
        self.objects
            .lock()
            .map_err(|_| scripted_failure("storage lock poisoned"))?
            .insert(key.to_string(), bytes);
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.objects
            .lock()
            .map_err(|_| scripted_failure("storage lock poisoned"))?
            .get(key)
            .cloned()
            .ok_or_else(|| scripted_failure("no such object"))
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        self.objects
            .lock()
            .map_err(|_| scripted_failure("storage lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

/// Providers wired to the fakes above, with the given text script.
pub fn fake_providers(text: Arc<ScriptedTextModel>, speech: Arc<FakeSpeech>) -> Providers {
    Providers {
        vision: Arc::new(FakeVision::default()),
        text,
        speech,
        storage: Arc::new(MemoryStorage::default()),
    }
}

// ---------------------------------------------------------------------------
// In-memory status store
// ---------------------------------------------------------------------------

/// Snapshot of one job and its content in an [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub status: JobStatus,
    pub attempt: i32,
    pub progress: i16,
    pub step: GenerationStep,
    pub error_message: Option<String>,
    pub title: Option<String>,
    pub text_content: Option<String>,
    pub word_count: Option<usize>,
    pub audio_url: Option<String>,
    /// Every accepted progress write, in order.
    pub history: Vec<(GenerationStep, i16)>,
}

impl JobRecord {
    fn generating(attempt: i32) -> Self {
        Self {
            status: JobStatus::Generating,
            attempt,
            progress: 0,
            step: GenerationStep::StoryGeneration,
            error_message: None,
            title: None,
            text_content: None,
            word_count: None,
            audio_url: None,
            history: Vec::new(),
        }
    }

    fn owned_by(&self, attempt: i32) -> bool {
        self.status == JobStatus::Generating && self.attempt == attempt
    }
}

/// [`GenerationStore`] held in process memory, applying the same write
/// guards as the SQL repositories. Used by tests.
#[derive(Default)]
pub struct InMemoryStore {
    jobs: Mutex<HashMap<DbId, JobRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Register a freshly claimed job.
    pub fn start(&self, story_id: DbId, attempt: i32) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(story_id, JobRecord::generating(attempt));
        }
    }

    pub fn get(&self, story_id: DbId) -> Option<JobRecord> {
        self.jobs.lock().ok()?.get(&story_id).cloned()
    }

    /// Drop a job, as if its story were deleted.
    pub fn remove(&self, story_id: DbId) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.remove(&story_id);
        }
    }

    /// Make every subsequent write fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn with_owned<F>(&self, story_id: DbId, attempt: i32, apply: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut JobRecord) -> bool,
    {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".into()))?;
        match jobs.get_mut(&story_id) {
            Some(job) if job.owned_by(attempt) => Ok(apply(job)),
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl GenerationStore for InMemoryStore {
    async fn record_progress(
        &self,
        story_id: DbId,
        attempt: i32,
        step: GenerationStep,
        progress: i16,
    ) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            if progress < job.progress {
                return false;
            }
            job.progress = progress;
            job.step = step;
            job.history.push((step, progress));
            true
        })
    }

    async fn save_title(
        &self,
        story_id: DbId,
        attempt: i32,
        title: &str,
    ) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            job.title = Some(title.to_string());
            true
        })
    }

    async fn save_text(
        &self,
        story_id: DbId,
        attempt: i32,
        text: &str,
        word_count: usize,
    ) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            job.text_content = Some(text.to_string());
            job.word_count = Some(word_count);
            true
        })
    }

    async fn save_audio_url(
        &self,
        story_id: DbId,
        attempt: i32,
        audio_url: &str,
    ) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            job.audio_url = Some(audio_url.to_string());
            true
        })
    }

    async fn complete(&self, story_id: DbId, attempt: i32) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            job.status = JobStatus::Completed;
            job.step = GenerationStep::Completed;
            job.progress = PROGRESS_COMPLETED;
            job.history.push((GenerationStep::Completed, PROGRESS_COMPLETED));
            true
        })
    }

    async fn fail(
        &self,
        story_id: DbId,
        attempt: i32,
        message: &str,
    ) -> Result<bool, StoreError> {
        self.with_owned(story_id, attempt, |job| {
            job.status = JobStatus::Error;
            job.step = GenerationStep::Error;
            job.error_message = Some(message.to_string());
            true
        })
    }
}
