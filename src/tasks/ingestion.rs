//! Detached execution of one chapter ingestion job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::db::models::IngestionJob;
use crate::services::chapter_commit::ChapterCommitter;
use crate::services::chapter_pipeline::{ChapterPipeline, ChapterRequest, GeneratedChapter};
use crate::services::documents::DocumentSource;
use crate::services::generation::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed { topic_count: i32, question_count: i32 },
    Failed(String),
    /// Persisting the outcome failed; the job stays `processing` until swept.
    Abandoned(String),
}

impl JobOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed(_) => "failed",
            Self::Abandoned(_) => "abandoned",
        }
    }
}

#[derive(Clone)]
pub(crate) struct JobRunner {
    pipeline: ChapterPipeline,
    committer: ChapterCommitter,
    documents: Arc<dyn DocumentSource>,
    timeout: Duration,
}

impl JobRunner {
    pub(crate) fn new(
        pipeline: ChapterPipeline,
        committer: ChapterCommitter,
        documents: Arc<dyn DocumentSource>,
        timeout: Duration,
    ) -> Self {
        Self { pipeline, committer, documents, timeout }
    }

    pub(crate) fn spawn(&self, job: IngestionJob) -> JoinHandle<JobOutcome> {
        let runner = self.clone();
        let span = tracing::info_span!("ingestion_job", job_id = %job.id);
        tokio::spawn(async move { runner.run(job).await }.instrument(span))
    }

    pub(crate) async fn run(&self, job: IngestionJob) -> JobOutcome {
        let timer = Instant::now();
        tracing::info!(subject = %job.subject, grade = job.grade, "Chapter ingestion started");

        let generated = match tokio::time::timeout(self.timeout, self.generate(&job)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::TimedOut(self.timeout.as_secs())),
        };

        let outcome = match generated {
            Ok(chapter) => match self.committer.commit_success(&job, chapter).await {
                Ok(done) => JobOutcome::Completed {
                    topic_count: done.topic_count,
                    question_count: done.question_count,
                },
                Err(err) => {
                    tracing::error!(error = %err, "Failed to commit generated chapter");
                    JobOutcome::Abandoned(err.to_string())
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "Chapter generation failed");
                match self.committer.commit_failure(&job.id, &err).await {
                    Ok(_) => JobOutcome::Failed(err.to_string()),
                    Err(store_err) => {
                        tracing::error!(error = %store_err, "Failed to record job failure");
                        JobOutcome::Abandoned(store_err.to_string())
                    }
                }
            }
        };

        let elapsed = timer.elapsed().as_secs_f64();
        metrics::counter!("ingestion_jobs_total", "status" => outcome.label()).increment(1);
        metrics::histogram!("ingestion_duration_seconds").record(elapsed);
        tracing::info!(
            status = outcome.label(),
            duration_seconds = elapsed,
            "Chapter ingestion finished"
        );

        outcome
    }

    async fn generate(&self, job: &IngestionJob) -> Result<GeneratedChapter, GenerationError> {
        let text = self
            .documents
            .fetch_text(&job.document_ref)
            .await
            .map_err(|err| GenerationError::Document(err.to_string()))?;

        self.pipeline
            .generate(ChapterRequest {
                source_text: &text,
                subject: &job.subject,
                grade: job.grade,
            })
            .await
    }
}
