/// External moderation scorer seam
///
/// The scorer itself (the detection model, its caching, timeouts, and
/// retries) lives outside this crate. This module defines the trait the
/// shell calls through, the staleness gate that discards results for
/// entries the user has navigated away from, and the strictly-sequential
/// batch re-scoring loop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors surfaced by a moderation scorer.
#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    #[error("scorer is unavailable")]
    Unavailable,
    #[error("scoring failed: {0}")]
    Failed(String),
}

/// Contract required of the external moderation scorer.
#[async_trait]
pub trait ModerationScorer: Send + Sync {
    /// Fetch the raw moderation payload for one entry.
    ///
    /// `refresh` forces re-scoring even if the scorer holds a cached
    /// result. Timeout semantics belong to the implementation.
    async fn fetch_moderation(&self, entry_id: &str, refresh: bool)
        -> Result<JsonValue, ScoreError>;
}

/// Scorer backed by sidecar payload files.
///
/// The external detection service drops one `<entry_id>.json` file per
/// scored capture into a directory; this scorer reads them back. A
/// missing file means the entry has not been scored yet.
pub struct SidecarScorer {
    dir: PathBuf,
}

impl SidecarScorer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ModerationScorer for SidecarScorer {
    async fn fetch_moderation(
        &self,
        entry_id: &str,
        _refresh: bool,
    ) -> Result<JsonValue, ScoreError> {
        // Every read hits the file, so a refresh needs no special path.
        let path = self.dir.join(format!("{}.json", entry_id));
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| ScoreError::Unavailable)?;
        serde_json::from_str(&content).map_err(|e| ScoreError::Failed(e.to_string()))
    }
}

/// Gate for single-entry scoring fetches.
///
/// Guarantees at most one fetch per entry per view session, and stamps
/// each fetch with a generation so that a response arriving after the
/// user navigated away can be recognized as stale and discarded. This is
/// cooperative cancellation: the fetch itself is not interrupted, its
/// result is just never applied.
#[derive(Debug, Default)]
pub struct FetchGate {
    requested: HashSet<String>,
    generation: u64,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the active entry changes. Outstanding stamps become
    /// stale and the per-session dedup set keeps its history.
    pub fn bump(&mut self) {
        self.generation += 1;
    }

    /// Try to begin a fetch for `entry_id`. Returns the generation stamp
    /// to attach to the fetch, or `None` if a fetch for this entry was
    /// already issued this session.
    pub fn arm(&mut self, entry_id: &str) -> Option<u64> {
        if self.requested.contains(entry_id) {
            return None;
        }
        self.requested.insert(entry_id.to_string());
        Some(self.generation)
    }

    /// Whether a result stamped with `generation` is still current.
    pub fn admits(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Forget an entry so a later view session may score it again
    /// (used after an explicit re-score).
    pub fn forget(&mut self, entry_id: &str) {
        self.requested.remove(entry_id);
    }
}

/// One entry's outcome from a batch re-score.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub entry_id: String,
    pub payload: Option<JsonValue>,
}

/// Re-score a set of entries, strictly sequentially.
///
/// Each fetch is awaited to completion before the next starts, as
/// backpressure toward the external scorer. A failure on one entry is
/// logged and skipped; it never aborts the remaining batch.
pub async fn rescore_batch(
    scorer: Arc<dyn ModerationScorer>,
    entry_ids: Vec<String>,
) -> Vec<BatchOutcome> {
    let mut outcomes = Vec::with_capacity(entry_ids.len());
    for entry_id in entry_ids {
        match scorer.fetch_moderation(&entry_id, true).await {
            Ok(payload) => outcomes.push(BatchOutcome {
                entry_id,
                payload: Some(payload),
            }),
            Err(e) => {
                eprintln!("⚠️  Re-score failed for {}: {}", entry_id, e);
                outcomes.push(BatchOutcome {
                    entry_id,
                    payload: None,
                });
            }
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyScorer {
        in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModerationScorer for FlakyScorer {
        async fn fetch_moderation(
            &self,
            entry_id: &str,
            _refresh: bool,
        ) -> Result<JsonValue, ScoreError> {
            // Sequential processing means at most one fetch in flight.
            let active = self.in_flight.fetch_add(1, Ordering::SeqCst);
            assert_eq!(active, 0, "batch fetches must not overlap");
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.calls.lock().unwrap().push(entry_id.to_string());
            if entry_id == "bad" {
                Err(ScoreError::Failed("boom".into()))
            } else {
                Ok(json!({ "boxes": [] }))
            }
        }
    }

    #[tokio::test]
    async fn test_batch_is_sequential_and_survives_failures() {
        let scorer = Arc::new(FlakyScorer {
            in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        });
        let outcomes = rescore_batch(
            scorer.clone(),
            vec!["a".into(), "bad".into(), "c".into()],
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].payload.is_some());
        assert!(outcomes[1].payload.is_none());
        assert!(outcomes[2].payload.is_some());
        assert_eq!(
            *scorer.calls.lock().unwrap(),
            vec!["a".to_string(), "bad".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sidecar_scorer_reads_payload_files() {
        let dir = std::env::temp_dir().join("capture-gallery-sidecar-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("p1.json"), r#"{"boxes": []}"#)
            .await
            .unwrap();
        tokio::fs::write(dir.join("p2.json"), "not json")
            .await
            .unwrap();

        let scorer = SidecarScorer::new(&dir);
        let payload = scorer.fetch_moderation("p1", false).await.unwrap();
        assert!(payload.get("boxes").is_some());

        assert!(matches!(
            scorer.fetch_moderation("missing", false).await,
            Err(ScoreError::Unavailable)
        ));
        assert!(matches!(
            scorer.fetch_moderation("p2", false).await,
            Err(ScoreError::Failed(_))
        ));
    }

    #[test]
    fn test_gate_arms_once_per_entry() {
        let mut gate = FetchGate::new();
        assert_eq!(gate.arm("p1"), Some(0));
        assert_eq!(gate.arm("p1"), None);
        assert_eq!(gate.arm("p2"), Some(0));
    }

    #[test]
    fn test_stale_generations_are_rejected() {
        let mut gate = FetchGate::new();
        let stamp = gate.arm("p1").unwrap();
        assert!(gate.admits(stamp));

        // User navigates away before the fetch resolves.
        gate.bump();
        assert!(!gate.admits(stamp));

        let fresh = gate.arm("p2").unwrap();
        assert!(gate.admits(fresh));
    }

    #[test]
    fn test_navigate_away_and_back_can_fetch_again() {
        let mut gate = FetchGate::new();

        // Open entry A; its fetch is still in flight.
        gate.bump();
        let stamp_a = gate.arm("A").unwrap();

        // Navigate to B and back to A before A's fetch resolves.
        gate.bump();
        gate.bump();

        // The in-flight result is stale and gets dropped; the dropper
        // must also forget the entry, or A could never be scored again.
        assert!(!gate.admits(stamp_a));
        gate.forget("A");

        let fresh = gate.arm("A").expect("re-activation must re-arm");
        assert!(gate.admits(fresh));
    }

    #[test]
    fn test_forget_allows_rescore() {
        let mut gate = FetchGate::new();
        gate.arm("p1").unwrap();
        gate.forget("p1");
        assert!(gate.arm("p1").is_some());
    }
}
