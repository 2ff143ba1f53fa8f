//! Presence projection: who is online and what was said last

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NO_MESSAGES_PLACEHOLDER;
use crate::core::message::{UserId, UserSummary};
use crate::error::Result;
use crate::storage::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// One row of a user's contact list. Never stored, always recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    #[serde(rename = "UserID")]
    pub user_id: UserId,
    pub username: String,
    #[serde(rename = "lastMessage")]
    pub last_message: String,
    /// `None` when the pair never exchanged a message; sent as the zero instant
    #[serde(with = "zero_time")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Username of the last message's author, empty when there is none
    pub sender: String,
    pub status: PresenceStatus,
}

/// Clients format every timestamp, so a missing one goes out as
/// `0001-01-01T00:00:00Z` rather than `null`
mod zero_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    // Seconds from 0001-01-01T00:00:00Z to the Unix epoch
    const ZERO_SECS: i64 = -62_135_596_800;

    pub fn zero() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(ZERO_SECS, 0).unwrap_or_default()
    }

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        value.unwrap_or_else(zero).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let stamp = DateTime::<Utc>::deserialize(deserializer)?;
        Ok((stamp != zero()).then_some(stamp))
    }
}

/// Most recent conversations first, then never-messaged users by username
pub fn presence_order(a: &PresenceRecord, b: &PresenceRecord) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.username.cmp(&b.username),
    }
}

/// Build the contact list seen by `requester`.
///
/// `users` is the directory listing and `online` the set of registered
/// identities, both captured by the caller.
pub async fn build_presence(
    requester: UserId,
    users: &[UserSummary],
    store: &dyn MessageStore,
    online: &HashSet<UserId>,
) -> Result<Vec<PresenceRecord>> {
    if requester == 0 {
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(users.len());
    for user in users.iter().filter(|u| u.id != requester) {
        let last = store.last_between(requester, user.id).await?;
        let (last_message, timestamp, sender) = match last {
            Some(last) => (last.body, Some(last.created_at), last.sender_name),
            None => (NO_MESSAGES_PLACEHOLDER.to_string(), None, String::new()),
        };

        records.push(PresenceRecord {
            user_id: user.id,
            username: user.username.clone(),
            last_message,
            timestamp,
            sender,
            status: if online.contains(&user.id) {
                PresenceStatus::Online
            } else {
                PresenceStatus::Offline
            },
        });
    }

    records.sort_by(presence_order);
    Ok(records)
}
