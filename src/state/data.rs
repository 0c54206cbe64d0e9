/// Shared data structures for the application state
///
/// These structs represent the history records that flow between
/// the external history store and the gallery core. The core only
/// reads and decorates them; it never mutates the store's records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a history entry, as reported by the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// A single captured-image record from the external history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identity within the history store
    pub prompt_id: String,
    /// When the capture was requested
    pub created_at: Option<DateTime<Utc>>,
    /// When the capture finished (None while queued or running)
    pub completed_at: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: EntryStatus,
    /// Opaque image reference resolved by the external image resolver
    pub image_path: Option<String>,
    /// Raw moderation payload as delivered by the scorer (None = never scored)
    pub moderation_raw: Option<serde_json::Value>,
    /// Prompt text associated with the capture, if any
    pub prompt: Option<String>,
    /// Generation seed, if any
    pub seed: Option<i64>,
    /// Source resolution in pixels, if known
    pub resolution: Option<(u32, u32)>,
}

impl HistoryEntry {
    /// The timestamp used for sorting and date grouping:
    /// completion time, falling back to creation time, falling back to
    /// the Unix epoch for records missing both.
    pub fn sort_timestamp(&self) -> i64 {
        self.completed_at
            .or(self.created_at)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            prompt_id: id.to_string(),
            created_at: None,
            completed_at: None,
            status: EntryStatus::Completed,
            image_path: None,
            moderation_raw: None,
            prompt: None,
            seed: None,
            resolution: None,
        }
    }

    #[test]
    fn test_sort_timestamp_fallback_chain() {
        let mut e = entry("a");
        assert_eq!(e.sort_timestamp(), 0);

        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        e.created_at = Some(created);
        assert_eq!(e.sort_timestamp(), created.timestamp_millis());

        let completed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap();
        e.completed_at = Some(completed);
        assert_eq!(e.sort_timestamp(), completed.timestamp_millis());
    }

    #[test]
    fn test_entry_round_trips_through_snapshot_json() {
        let mut e = entry("a");
        e.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        e.completed_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap());
        e.resolution = Some((1920, 1080));

        let json = serde_json::to_string(&e).unwrap();
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
        assert_eq!(back.sort_timestamp(), e.sort_timestamp());
    }
}
