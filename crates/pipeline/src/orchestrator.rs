//! The generation orchestrator: drives one attempt from a claimed job to a
//! terminal state.
//!
//! Stages run strictly in sequence. Each one runs under its wall-clock
//! budget and races the attempt's cancellation token. Every fatal error is
//! caught in [`Pipeline::run`] and written as the job's error; nothing
//! escapes to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lullaby_core::analysis::{ImageAnalysis, ImageAsset};
use lullaby_core::steps::{
    GenerationStep, PROGRESS_ANALYZING_IMAGES, PROGRESS_AUDIO_GENERATION,
    PROGRESS_AUDIO_SYNTHESIZED, PROGRESS_FINALIZING, PROGRESS_GENERATING_TITLE,
    PROGRESS_SAVING, PROGRESS_STORY_DRAFTED, PROGRESS_STORY_GENERATION,
};
use lullaby_core::story::StoryParameters;
use lullaby_core::templates::fallback_title;
use lullaby_core::types::DbId;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::audio::AudioSynthesizer;
use crate::config::StageTimeouts;
use crate::error::PipelineError;
use crate::image_analyzer::ImageAnalyzer;
use crate::providers::Providers;
use crate::store::GenerationStore;
use crate::text::TextGenerator;
use crate::title::TitleGenerator;

/// A job claimed by a worker, with its inputs decoded.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub story_id: DbId,
    pub attempt: i32,
    pub parameters: StoryParameters,
    pub images: Vec<ImageAsset>,
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The attempt failed; the message was written as the job's error.
    Failed(String),
    /// The job stopped belonging to this attempt; nothing was written.
    Superseded,
}

/// Stage components plus the status store, built once at startup.
pub struct Pipeline {
    analyzer: ImageAnalyzer,
    titles: TitleGenerator,
    texts: TextGenerator,
    audio: AudioSynthesizer,
    store: Arc<dyn GenerationStore>,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(
        providers: &Providers,
        store: Arc<dyn GenerationStore>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            analyzer: ImageAnalyzer::new(providers.vision.clone(), providers.storage.clone()),
            titles: TitleGenerator::new(providers.text.clone()),
            texts: TextGenerator::new(providers.text.clone()),
            audio: AudioSynthesizer::new(providers.speech.clone(), providers.storage.clone()),
            store,
            timeouts,
        }
    }

    /// Run one attempt to a terminal state.
    pub async fn run(&self, job: &ClaimedJob, cancel: &CancellationToken) -> Outcome {
        let span = tracing::info_span!(
            "generation",
            story_id = job.story_id,
            attempt = job.attempt
        );

        async {
            tracing::info!(
                images = job.images.len(),
                duration_tier = %job.parameters.duration_tier,
                language = %job.parameters.language,
                "Generation started",
            );

            match self.execute(job, cancel).await {
                Ok(()) => {
                    tracing::info!("Generation completed");
                    Outcome::Completed
                }
                Err(PipelineError::Superseded) => {
                    tracing::warn!("Job no longer owned by this attempt, stopping");
                    Outcome::Superseded
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(error = %message, "Generation failed");
                    self.record_failure(job.story_id, job.attempt, &message)
                        .await;
                    Outcome::Failed(message)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Write a terminal error for an attempt. Store failures are logged,
    /// since there is nowhere left to report them.
    pub async fn record_failure(&self, story_id: DbId, attempt: i32, message: &str) {
        match self.store.fail(story_id, attempt, message).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(story_id, attempt, "Error not recorded, job no longer owned")
            }
            Err(e) => {
                tracing::error!(story_id, attempt, error = %e, "Failed to record generation error")
            }
        }
    }

    async fn execute(
        &self,
        job: &ClaimedJob,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let params = &job.parameters;
        let budget = self.timeouts;

        // --- Image analysis (skipped without images) ---
        let analyses: Vec<ImageAnalysis> = if job.images.is_empty() {
            Vec::new()
        } else {
            self.advance(job, GenerationStep::AnalyzingImages, PROGRESS_ANALYZING_IMAGES)
                .await?;
            let analyses = match self
                .stage(
                    "Image analysis",
                    budget.image_analysis,
                    cancel,
                    self.analyzer.analyze(&job.images),
                )
                .await
            {
                Err(e @ PipelineError::Timeout { .. }) => {
                    tracing::warn!(error = %e, "Image analysis ran out of time, using placeholders");
                    job.images.iter().map(|_| ImageAnalysis::placeholder()).collect()
                }
                other => other?,
            };
            tracing::info!(
                analyzed = analyses.len(),
                placeholders = analyses.iter().filter(|a| a.placeholder).count(),
                "Images analyzed",
            );
            analyses
        };

        // --- Title ---
        self.advance(job, GenerationStep::GeneratingTitle, PROGRESS_GENERATING_TITLE)
            .await?;
        let title = match self
            .stage(
                "Title generation",
                budget.title,
                cancel,
                self.titles.generate(params, &analyses),
            )
            .await
        {
            Err(e @ PipelineError::Timeout { .. }) => {
                tracing::warn!(error = %e, "Title generation ran out of time, using fallback");
                fallback_title(&params.theme, params.lead_character(), &params.language)
            }
            other => other?,
        };
        owned(self.store.save_title(job.story_id, job.attempt, &title).await?)?;
        tracing::info!(%title, "Title saved");

        // --- Story text ---
        self.advance(job, GenerationStep::StoryGeneration, PROGRESS_STORY_GENERATION)
            .await?;
        let text = self
            .stage(
                "Story generation",
                budget.text,
                cancel,
                self.texts.generate(params, &analyses),
            )
            .await?;
        owned(
            self.store
                .save_text(job.story_id, job.attempt, &text.text, text.word_count)
                .await?,
        )?;
        tracing::info!(
            words = text.word_count,
            min_words = params.duration_tier.min_words(),
            source = text.source.as_str(),
            "Story text saved",
        );
        self.advance(job, GenerationStep::StoryGeneration, PROGRESS_STORY_DRAFTED)
            .await?;

        // --- Audio ---
        self.advance(job, GenerationStep::AudioGeneration, PROGRESS_AUDIO_GENERATION)
            .await?;
        let audio = self
            .stage(
                "Audio generation",
                budget.audio,
                cancel,
                self.audio
                    .synthesize(&text.text, &params.voice, &params.language),
            )
            .await?
            .map_err(PipelineError::Audio)?;
        tracing::info!(bytes = audio.len(), "Audio synthesized");
        self.advance(job, GenerationStep::AudioGeneration, PROGRESS_AUDIO_SYNTHESIZED)
            .await?;

        // --- Finalize: upload narration ---
        self.advance(job, GenerationStep::Finalizing, PROGRESS_FINALIZING)
            .await?;
        let audio_url = self
            .stage(
                "Audio upload",
                budget.save,
                cancel,
                self.audio.store(job.story_id, job.attempt, audio),
            )
            .await?
            .map_err(PipelineError::Audio)?;

        // --- Save ---
        self.advance(job, GenerationStep::Saving, PROGRESS_SAVING)
            .await?;
        let saved = self
            .stage(
                "Saving",
                budget.save,
                cancel,
                self.store
                    .save_audio_url(job.story_id, job.attempt, &audio_url),
            )
            .await??;
        owned(saved)?;

        owned(self.store.complete(job.story_id, job.attempt).await?)
    }

    /// Record a step transition. Fails with `Superseded` when the guard
    /// rejects the write.
    async fn advance(
        &self,
        job: &ClaimedJob,
        step: GenerationStep,
        progress: i16,
    ) -> Result<(), PipelineError> {
        owned(
            self.store
                .record_progress(job.story_id, job.attempt, step, progress)
                .await?,
        )?;
        tracing::debug!(%step, progress, "Progress recorded");
        Ok(())
    }

    /// Run `work` under `limit`, aborting early if `cancel` fires.
    ///
    /// Image analysis and title generation absorb a `Timeout` from here;
    /// every other stage treats it as fatal.
    async fn stage<F>(
        &self,
        name: &'static str,
        limit: Duration,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<F::Output, PipelineError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = tokio::time::timeout(limit, work) => result.map_err(|_| PipelineError::Timeout {
                stage: name,
                secs: whole_seconds(limit),
            }),
        }
    }
}

/// Seconds reported for a budget, rounded up so short budgets never read
/// as zero.
fn whole_seconds(limit: Duration) -> u64 {
    limit.as_secs() + u64::from(limit.subsec_nanos() > 0)
}

fn owned(applied: bool) -> Result<(), PipelineError> {
    if applied {
        Ok(())
    } else {
        Err(PipelineError::Superseded)
    }
}
