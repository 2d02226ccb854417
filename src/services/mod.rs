pub(crate) mod chapter_commit;
pub(crate) mod chapter_pipeline;
pub(crate) mod documents;
pub(crate) mod generation;
pub(crate) mod ingestion;
pub(crate) mod mastery;
pub(crate) mod rewards;
pub(crate) mod storage;

use std::sync::Arc;
use std::time::Duration;

use crate::services::chapter_commit::ChapterCommitter;
use crate::services::chapter_pipeline::ChapterPipeline;
use crate::services::documents::DocumentSource;
use crate::services::generation::GenerationClient;
use crate::services::ingestion::IngestionManager;
use crate::services::mastery::MasteryEngine;
use crate::services::rewards::RewardService;
use crate::stores::{ContentStore, JobStore, MasteryStore, RewardStore};
use crate::tasks::ingestion::JobRunner;

/// Domain services shared by the HTTP layer and background loops.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) ingestion: IngestionManager,
    pub(crate) content: Arc<dyn ContentStore>,
    pub(crate) mastery: MasteryEngine,
    pub(crate) rewards: RewardService,
}

impl Services {
    pub(crate) fn new<S>(
        store: Arc<S>,
        generation: Arc<dyn GenerationClient>,
        documents: Arc<dyn DocumentSource>,
        job_timeout: Duration,
    ) -> Self
    where
        S: JobStore + ContentStore + MasteryStore + RewardStore + 'static,
    {
        let runner = JobRunner::new(
            ChapterPipeline::new(generation),
            ChapterCommitter::new(store.clone()),
            documents.clone(),
            job_timeout,
        );
        let rewards = RewardService::new(store.clone());

        Self {
            ingestion: IngestionManager::new(store.clone(), runner, documents),
            content: store.clone(),
            mastery: MasteryEngine::new(store),
            rewards,
        }
    }
}
