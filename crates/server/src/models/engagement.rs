//! Newsletter and contact-form domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souq_core::{ContactMessageId, ContactStatus, Email, SubscriberId, SubscriberSource, SubscriberStatus};

/// A newsletter subscriber.
///
/// Re-subscribing reactivates the existing record rather than creating
/// a duplicate; the email stays unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub email: Email,
    pub status: SubscriberStatus,
    pub source: SubscriberSource,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// A contact-form message in the admin inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub message: String,
    pub status: ContactStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
