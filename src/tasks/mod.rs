pub(crate) mod ingestion;
pub(crate) mod scheduler;
