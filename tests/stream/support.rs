//! Test domain: a job reporting progress before its result.

use serde::{Deserialize, Serialize};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobUpdate {
    Progress { step: u32 },
    Result { output: String },
}

impl JobUpdate {
    pub fn is_progress(&self) -> bool {
        matches!(self, JobUpdate::Progress { .. })
    }
}
