use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a backup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Pending,
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Pending => "PENDING",
            BackupStatus::Completed => "COMPLETED",
            BackupStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackupStatus::Pending)
    }
}

/// Record of a backup operation (not the backup payload itself)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// User ID this backup belongs to
    pub user_id: String,
    pub status: BackupStatus,
    /// When the backup was requested
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Backup {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            status: BackupStatus::Pending,
            created_at: now,
        }
    }

    /// Move a pending backup to completed. Returns false if already finished.
    pub fn complete(&mut self) -> bool {
        self.transition(BackupStatus::Completed)
    }

    /// Move a pending backup to failed. Returns false if already finished.
    pub fn fail(&mut self) -> bool {
        self.transition(BackupStatus::Failed)
    }

    fn transition(&mut self, next: BackupStatus) -> bool {
        if self.status.is_terminal() {
            tracing::warn!(
                "Ignoring backup transition {} -> {}",
                self.status.as_str(),
                next.as_str()
            );
            return false;
        }
        self.status = next;
        true
    }
}
