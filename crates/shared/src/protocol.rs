use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{FieldMap, RemovedFile, WatchId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The intake API wraps successful payloads in `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Raw field values of a stored watch record, as returned for edit flows.
pub type RecordFields = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: WatchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "record_id", rename_all = "snake_case")]
pub enum SubmissionTarget {
    Create,
    Update(WatchId),
}

impl SubmissionTarget {
    pub fn from_record(record_id: Option<WatchId>) -> Self {
        record_id.map_or(Self::Create, Self::Update)
    }

    /// Path relative to the API base URL.
    pub fn path(self) -> String {
        match self {
            Self::Create => "watches".to_string(),
            Self::Update(id) => format!("watches/{id}"),
        }
    }
}

/// Persisted form of an unfinished wizard session. In-memory uploads are
/// never part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub draft_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<WatchId>,
    pub current_step: usize,
    pub values: FieldMap,
    #[serde(default)]
    pub removed_files: Vec<RemovedFile>,
    pub updated_at: DateTime<Utc>,
}
