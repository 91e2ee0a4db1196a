//! Model types for buffered messages.

use chrono::{DateTime, Utc};

/// Identifier assigned by the queue at enqueue time. Defines delivery order.
pub type MessageId = i64;

/// Delivery status of a buffered message.
///
/// Stored as the `sent` integer column: `0` for pending, `1` for sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStatus {
    #[default]
    Pending,
    Sent,
}

impl MessageStatus {
    pub fn as_db(&self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Sent => 1,
        }
    }

    pub fn from_db(value: i64) -> Self {
        if value == 0 {
            Self::Pending
        } else {
            Self::Sent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }
}

/// A message row from the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// Convert stored unix seconds back into a timestamp.
pub(crate) fn from_unix_seconds(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}
