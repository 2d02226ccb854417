pub(crate) mod ingestion_jobs;
pub(crate) mod mastery;
pub(crate) mod mistakes;
pub(crate) mod questions;
pub(crate) mod rewards;
pub(crate) mod students;
pub(crate) mod topics;
