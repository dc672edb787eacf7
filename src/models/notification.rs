use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{SYSTEM_USER_ID, WELCOME_MESSAGE, WELCOME_TITLE};

/// Category of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    System,
    Budget,
    Transaction,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::System => "SYSTEM",
            NotificationType::Budget => "BUDGET",
            NotificationType::Transaction => "TRANSACTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "UNREAD",
            NotificationStatus::Read => "READ",
        }
    }
}

/// Notification document stored in the `notifications` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Owning user, or "system" for system notices
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification for a user
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            status: NotificationStatus::Unread,
            created_at: now,
            updated_at: now,
        }
    }

    /// The system welcome notice inserted on first bootstrap
    pub fn welcome(now: DateTime<Utc>) -> Self {
        Self::new(
            SYSTEM_USER_ID,
            NotificationType::System,
            WELCOME_TITLE,
            WELCOME_MESSAGE,
            now,
        )
    }

    /// Mark as read; `updated_at` only moves when the status changes
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if self.status != NotificationStatus::Read {
            self.status = NotificationStatus::Read;
            self.updated_at = now;
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_USER_ID
    }
}
