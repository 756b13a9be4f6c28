//! Collaborator boundaries the wizard calls into.

use async_trait::async_trait;
use shared::{
    auth::AuthContext,
    domain::{FieldMap, WatchId},
    protocol::{RecordFields, SubmissionReceipt, SubmissionTarget},
};

use crate::error::SubmissionError;

/// Aggregated answers handed to the submission adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    pub target: SubmissionTarget,
    pub values: FieldMap,
    /// Stored paths the API should delete once it accepts the submission.
    pub removed_files: Vec<String>,
}

#[async_trait]
pub trait SubmissionAdapter: Send + Sync {
    async fn submit(
        &self,
        auth: &AuthContext,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

#[async_trait]
pub trait DraftSource: Send + Sync {
    async fn fetch_record(
        &self,
        auth: &AuthContext,
        record_id: WatchId,
    ) -> Result<RecordFields, SubmissionError>;
}
