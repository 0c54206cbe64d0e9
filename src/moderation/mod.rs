/// Moderation module
///
/// This module handles everything between the external scorer and the
/// rendered gallery:
/// - Normalizing raw scorer payloads into canonical detections (detection.rs)
/// - The redaction decision table (policy.rs)
/// - The scorer seam, fetch staleness gate, and batch re-scoring (scorer.rs)

pub mod detection;
pub mod policy;
pub mod scorer;

pub use detection::{
    classify_label, normalize, BoxUnit, Detection, DetectionRect, LabelClass, ModerationInfo,
    Severity,
};
pub use policy::{decide, RedactionDecision, SafetyLevel};
pub use scorer::{
    rescore_batch, BatchOutcome, FetchGate, ModerationScorer, ScoreError, SidecarScorer,
};
