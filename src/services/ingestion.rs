//! Lifecycle of chapter ingestion jobs: submission, status reads, publishing
//! and deletion. Generation itself runs detached via `JobRunner`.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use time::Duration as TimeDuration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::IngestionJob;
use crate::db::types::JobStatus;
use crate::services::documents::DocumentSource;
use crate::services::storage::owner_prefix;
use crate::stores::{JobStore, StoreError};
use crate::tasks::ingestion::{JobOutcome, JobRunner};

pub(crate) const MIN_GRADE: i16 = 1;
pub(crate) const MAX_GRADE: i16 = 8;

#[derive(Debug, Clone)]
pub(crate) struct NewChapterJob {
    pub(crate) owner_id: String,
    pub(crate) subject: String,
    pub(crate) grade: i16,
    pub(crate) name: Option<String>,
    pub(crate) document_ref: String,
}

#[derive(Debug, Error)]
pub(crate) enum SubmitError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) struct SubmittedJob {
    pub(crate) job: IngestionJob,
    pub(crate) handle: JoinHandle<JobOutcome>,
}

#[derive(Clone)]
pub(crate) struct IngestionManager {
    jobs: Arc<dyn JobStore>,
    runner: JobRunner,
    documents: Arc<dyn DocumentSource>,
}

impl IngestionManager {
    pub(crate) fn new(
        jobs: Arc<dyn JobStore>,
        runner: JobRunner,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        Self { jobs, runner, documents }
    }

    /// Persists a `processing` job and schedules exactly one run for it.
    /// Returns before generation starts.
    pub(crate) async fn submit(&self, request: NewChapterJob) -> Result<SubmittedJob, SubmitError> {
        let job = build_job(request)?;
        self.jobs.create_job(&job).await?;
        tracing::info!(
            job_id = %job.id,
            owner_id = %job.owner_id,
            "Chapter ingestion job accepted"
        );

        let handle = self.runner.spawn(job.clone());
        Ok(SubmittedJob { job, handle })
    }

    pub(crate) async fn get_status(
        &self,
        job_id: &str,
    ) -> Result<Option<IngestionJob>, StoreError> {
        self.jobs.find_job(job_id).await
    }

    pub(crate) async fn list_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<IngestionJob>, StoreError> {
        self.jobs.list_jobs_for_owner(owner_id).await
    }

    pub(crate) async fn publish(&self, job_id: &str) -> Result<IngestionJob, StoreError> {
        self.jobs.publish_job(job_id, primitive_now_utc()).await
    }

    /// Deletes a terminal job with its content, then its uploaded document
    /// unless another of the owner's jobs still points at it.
    pub(crate) async fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        let job = self.jobs.find_job(job_id).await?.ok_or(StoreError::NotFound("ingestion job"))?;
        self.jobs.delete_job(job_id).await?;

        let shared = |jobs: &[IngestionJob]| {
            jobs.iter().any(|other| other.document_ref == job.document_ref)
        };
        match self.jobs.list_jobs_for_owner(&job.owner_id).await {
            Ok(remaining) if shared(&remaining) => {}
            Ok(_) => {
                if let Err(err) = self.documents.remove(&job.document_ref).await {
                    tracing::warn!(job_id, error = %err, "Failed to remove chapter document");
                }
            }
            Err(err) => {
                tracing::warn!(job_id, error = %err, "Skipped chapter document cleanup");
            }
        }
        Ok(())
    }

    /// Fails jobs that have been `processing` longer than `max_age`.
    pub(crate) async fn fail_stale(&self, max_age: TimeDuration) -> Result<usize, StoreError> {
        let now = primitive_now_utc();
        let stale = self.jobs.list_stale_jobs(now - max_age).await?;
        let mut failed = 0;
        for job_id in stale {
            let message = format!(
                "job did not finish within {} seconds and was abandoned",
                max_age.whole_seconds()
            );
            if self.jobs.fail_job(&job_id, &message, now).await? {
                tracing::warn!(job_id = %job_id, "Failed stale ingestion job");
                failed += 1;
            }
        }
        Ok(failed)
    }
}

fn build_job(request: NewChapterJob) -> Result<IngestionJob, SubmitError> {
    let subject = request.subject.trim().to_string();
    if subject.is_empty() {
        return Err(SubmitError::Validation("subject is required".into()));
    }
    if !(MIN_GRADE..=MAX_GRADE).contains(&request.grade) {
        return Err(SubmitError::Validation(format!(
            "grade must be between {MIN_GRADE} and {MAX_GRADE}"
        )));
    }
    let document_ref = request.document_ref.trim().to_string();
    if document_ref.is_empty() {
        return Err(SubmitError::Validation("document_ref is required".into()));
    }
    let owned = document_ref.starts_with(&owner_prefix(&request.owner_id))
        && !document_ref.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if !owned {
        return Err(SubmitError::Validation(
            "document_ref must point to one of your uploaded documents".into(),
        ));
    }

    let name = request
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_name(&document_ref));

    Ok(IngestionJob {
        id: Uuid::new_v4().to_string(),
        owner_id: request.owner_id,
        subject,
        grade: request.grade,
        name,
        document_ref,
        status: JobStatus::Processing,
        topic_count: 0,
        question_count: 0,
        error_message: None,
        created_at: primitive_now_utc(),
        processed_at: None,
        published_at: None,
    })
}

fn default_name(document_ref: &str) -> String {
    Path::new(document_ref)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("Untitled chapter")
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::chapter_commit::ChapterCommitter;
    use crate::services::chapter_pipeline::ChapterPipeline;
    use crate::stores::memory::MemoryStore;
    use crate::test_support::{ScriptedGenerationClient, StaticDocuments};

    const DOCUMENT_REF: &str = "chapters/teacher-1/plants.txt";

    fn manager(store: Arc<MemoryStore>, client: ScriptedGenerationClient) -> IngestionManager {
        let documents = Arc::new(StaticDocuments::with(DOCUMENT_REF, "Plants need sunlight."));
        manager_with(store, client, documents)
    }

    fn manager_with(
        store: Arc<MemoryStore>,
        client: ScriptedGenerationClient,
        documents: Arc<StaticDocuments>,
    ) -> IngestionManager {
        let runner = JobRunner::new(
            ChapterPipeline::new(Arc::new(client)),
            ChapterCommitter::new(store.clone()),
            documents.clone(),
            Duration::from_secs(5),
        );
        IngestionManager::new(store, runner, documents)
    }

    fn request(grade: i16) -> NewChapterJob {
        NewChapterJob {
            owner_id: "teacher-1".into(),
            subject: "Science".into(),
            grade,
            name: None,
            document_ref: DOCUMENT_REF.into(),
        }
    }

    #[tokio::test]
    async fn submit_returns_processing_job_with_default_name() {
        let store = Arc::new(MemoryStore::new());
        let manager =
            manager(
                store,
                ScriptedGenerationClient::with_topics(&["Roots"])
                    .with_delay(Duration::from_millis(200)),
            );

        let submitted = manager.submit(request(5)).await.expect("submit");

        assert_eq!(submitted.job.status, JobStatus::Processing);
        assert_eq!(submitted.job.name, "plants");
        assert_eq!((submitted.job.topic_count, submitted.job.question_count), (0, 0));
        let current = manager.get_status(&submitted.job.id).await.expect("status").expect("job");
        assert_eq!(current.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_input_without_creating_job() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone(), ScriptedGenerationClient::with_topics(&["Roots"]));

        for grade in [0, 9] {
            let result = manager.submit(request(grade)).await;
            assert!(matches!(result, Err(SubmitError::Validation(_))));
        }
        let mut blank = request(5);
        blank.subject = "   ".into();
        assert!(matches!(manager.submit(blank).await, Err(SubmitError::Validation(_))));
        let mut missing_document = request(5);
        missing_document.document_ref = String::new();
        assert!(matches!(manager.submit(missing_document).await, Err(SubmitError::Validation(_))));

        assert!(manager.list_for_owner("teacher-1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn submit_rejects_documents_outside_owner_uploads() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store, ScriptedGenerationClient::with_topics(&["Roots"]));

        for document_ref in [
            "chapters/teacher-2/secret.txt",
            "chapters/teacher-10/plants.txt",
            "chapters/teacher-1/../teacher-2/secret.txt",
            "chapters/teacher-1/",
            "science/plants.txt",
            "/etc/passwd",
        ] {
            let mut foreign = request(5);
            foreign.document_ref = document_ref.into();
            let result = manager.submit(foreign).await;
            assert!(matches!(result, Err(SubmitError::Validation(_))), "{document_ref}");
        }

        assert!(manager.list_for_owner("teacher-1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn status_polling_never_regresses() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store, ScriptedGenerationClient::with_topics(&["Roots", "Stems"]));

        let submitted = manager.submit(request(5)).await.expect("submit");
        let job_id = submitted.job.id.clone();

        let mut seen_terminal = false;
        for _ in 0..50 {
            let job = manager.get_status(&job_id).await.expect("status").expect("job");
            if seen_terminal {
                assert_eq!(job.status, JobStatus::Completed);
            }
            seen_terminal |= job.status.is_terminal();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        submitted.handle.await.expect("join");
        let job = manager.get_status(&job_id).await.expect("status").expect("job");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!((job.topic_count, job.question_count), (2, 10));
    }

    #[tokio::test]
    async fn publish_and_delete_follow_job_state() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(
            store.clone(),
            ScriptedGenerationClient::with_topics(&["Roots"])
                .with_delay(Duration::from_millis(100)),
        );

        let submitted = manager.submit(request(5)).await.expect("submit");
        let job_id = submitted.job.id.clone();
        assert!(matches!(manager.publish(&job_id).await, Err(StoreError::InvalidState(_))));
        assert!(matches!(manager.delete(&job_id).await, Err(StoreError::InvalidState(_))));

        submitted.handle.await.expect("join");
        let published = manager.publish(&job_id).await.expect("publish");
        assert_eq!(published.status, JobStatus::Published);
        assert!(published.published_at.is_some());

        manager.delete(&job_id).await.expect("delete");
        assert!(manager.get_status(&job_id).await.expect("status").is_none());
        assert_eq!(store.topic_count().await, 0);
    }

    #[tokio::test]
    async fn delete_removes_document_once_no_job_uses_it() {
        let store = Arc::new(MemoryStore::new());
        let documents = Arc::new(StaticDocuments::with(DOCUMENT_REF, "Plants need sunlight."));
        let manager = manager_with(
            store,
            ScriptedGenerationClient::with_topics(&["Roots"]),
            documents.clone(),
        );

        let first = manager.submit(request(5)).await.expect("submit");
        let first_id = first.job.id.clone();
        first.handle.await.expect("join");
        let second = manager.submit(request(5)).await.expect("submit");
        let second_id = second.job.id.clone();
        second.handle.await.expect("join");

        manager.delete(&first_id).await.expect("delete first");
        assert!(documents.contains(DOCUMENT_REF));

        manager.delete(&second_id).await.expect("delete second");
        assert!(!documents.contains(DOCUMENT_REF));
    }

    #[tokio::test]
    async fn stale_processing_jobs_are_failed() {
        let store = Arc::new(MemoryStore::new());
        let mut job = crate::test_support::processing_job("old-job", "teacher-1");
        job.created_at = primitive_now_utc() - TimeDuration::hours(2);
        store.create_job(&job).await.expect("create");
        let job = crate::test_support::processing_job("new-job", "teacher-1");
        store.create_job(&job).await.expect("create");
        let manager = manager(store.clone(), ScriptedGenerationClient::with_topics(&["Roots"]));

        let failed = manager.fail_stale(TimeDuration::minutes(30)).await.expect("sweep");

        assert_eq!(failed, 1);
        let old = store.find_job("old-job").await.expect("find").expect("job");
        assert_eq!(old.status, JobStatus::Failed);
        let fresh = store.find_job("new-job").await.expect("find").expect("job");
        assert_eq!(fresh.status, JobStatus::Processing);
    }
}
