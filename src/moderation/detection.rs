/// Detection normalization
///
/// Converts the raw, loosely-shaped moderation payload delivered by the
/// external scorer into a canonical list of `Detection` records with a
/// derived severity. The scorer's free-text labels are mapped onto a
/// closed `LabelClass` enum here, so downstream policy code never touches
/// string heuristics.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Closed classification of a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelClass {
    /// Benign region (face, armpits, feet) that is never a privacy concern
    Safe,
    /// Low-severity region (covered body parts, explicitly mild labels)
    Mild,
    /// Region requiring strong redaction
    Sensitive,
}

/// Coordinate unit of a detector-reported bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxUnit {
    /// Coordinates in [0, 1] relative to the source image
    Normalized,
    /// Coordinates in source-image pixels
    Pixel,
}

/// A detector-reported bounding box with its inferred unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub unit: BoxUnit,
}

/// A single normalized detection.
///
/// `is_safe` and `is_sensitive` are mutually exclusive by construction;
/// a safe detection is never included in a redaction mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Unique within one normalization pass
    pub id: String,
    /// Canonical upper-case label
    pub label: String,
    /// Closed classification derived from the label
    pub class: LabelClass,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    /// Reported bounding box
    pub rect: DetectionRect,
    pub is_safe: bool,
    pub is_sensitive: bool,
}

/// Aggregate severity over all detections of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Sensitive,
}

/// Canonical moderation result for one image.
///
/// Absence of a raw payload is represented upstream as `Option::None`
/// (never scored); a scored-clean image is `Some` with no detections and
/// `Severity::None`. The two must stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationInfo {
    pub detections: Vec<Detection>,
    pub severity: Severity,
}

impl ModerationInfo {
    /// All detections that are candidates for a redaction mask.
    pub fn non_safe(&self) -> Vec<Detection> {
        self.detections
            .iter()
            .filter(|d| !d.is_safe)
            .cloned()
            .collect()
    }

    /// All detections flagged as requiring strong redaction.
    pub fn sensitive(&self) -> Vec<Detection> {
        self.detections
            .iter()
            .filter(|d| d.is_sensitive)
            .cloned()
            .collect()
    }
}

/// Label substrings that mark a benign region.
const SAFE_MARKERS: &[&str] = &["FACE", "ARMPITS", "FEET"];

/// Label substrings that mark a low-severity region.
const MILD_MARKERS: &[&str] = &["MILD", "SAFE", "COVERED"];

/// Body-part labels known to be low-severity when they appear without
/// an explicit exposure qualifier.
const MILD_LABELS: &[&str] = &["BELLY", "BACK", "SHOULDERS", "HIPS", "LEGS"];

/// Map a scorer label onto the closed classification.
///
/// This is the only place free-text label matching is allowed; everything
/// downstream works with `LabelClass`.
pub fn classify_label(label: &str) -> LabelClass {
    if SAFE_MARKERS.iter().any(|m| label.contains(m)) {
        return LabelClass::Safe;
    }
    if MILD_MARKERS.iter().any(|m| label.contains(m))
        || MILD_LABELS.iter().any(|m| label == *m)
    {
        return LabelClass::Mild;
    }
    LabelClass::Sensitive
}

/// Normalize a raw moderation payload into canonical detections.
///
/// The payload is treated as untrusted: missing or non-numeric fields
/// become zeros, and a single malformed box never blocks the rest.
pub fn normalize(raw: &JsonValue) -> ModerationInfo {
    let boxes = raw
        .get("boxes")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let detections: Vec<Detection> = boxes
        .iter()
        .enumerate()
        .map(|(index, b)| normalize_box(index, b))
        .collect();

    let severity = explicit_severity(raw).unwrap_or_else(|| derive_severity(&detections));

    ModerationInfo {
        detections,
        severity,
    }
}

/// Normalize one raw box entry.
fn normalize_box(index: usize, raw: &JsonValue) -> Detection {
    let label = first_string(raw, &["label", "class", "name"])
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| format!("UNKNOWN_{}", index));

    let class = classify_label(&label);
    let is_safe = class == LabelClass::Safe;

    // An explicit isSensitive flag from the scorer wins over the label
    // heuristic, but never overrides a safe classification.
    let is_sensitive = if is_safe {
        false
    } else {
        match raw.get("isSensitive").and_then(JsonValue::as_bool) {
            Some(flag) => flag,
            None => class == LabelClass::Sensitive,
        }
    };

    let x = num_field(raw, "x");
    let y = num_field(raw, "y");
    let width = num_field(raw, "width");
    let height = num_field(raw, "height");

    // Unit heuristic: normalized coordinates live in [0, 1], so any
    // component above 1 means the detector reported pixels.
    let unit = if x > 1.0 || y > 1.0 || width > 1.0 || height > 1.0 {
        BoxUnit::Pixel
    } else {
        BoxUnit::Normalized
    };

    Detection {
        id: format!("{}_{}", label, index),
        label,
        class,
        confidence: num_field(raw, "confidence").clamp(0.0, 1.0),
        rect: DetectionRect {
            x,
            y,
            width,
            height,
            unit,
        },
        is_safe,
        is_sensitive,
    }
}

/// Aggregate severity from the detection list.
fn derive_severity(detections: &[Detection]) -> Severity {
    if detections.iter().any(|d| d.is_sensitive) {
        Severity::Sensitive
    } else if detections.iter().any(|d| !d.is_safe) {
        Severity::Mild
    } else {
        Severity::None
    }
}

/// An explicit severity string on the payload takes precedence.
fn explicit_severity(raw: &JsonValue) -> Option<Severity> {
    match raw.get("severity").and_then(JsonValue::as_str) {
        Some("none") => Some(Severity::None),
        Some("mild") => Some(Severity::Mild),
        Some("sensitive") => Some(Severity::Sensitive),
        _ => None,
    }
}

/// First present string among the given keys.
fn first_string<'a>(raw: &'a JsonValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| raw.get(*k).and_then(JsonValue::as_str))
}

/// Numeric field, defensively defaulting to zero.
fn num_field(raw: &JsonValue, key: &str) -> f32 {
    raw.get(key).and_then(JsonValue::as_f64).unwrap_or(0.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_boxes_is_clean() {
        let info = normalize(&json!({}));
        assert!(info.detections.is_empty());
        assert_eq!(info.severity, Severity::None);
    }

    #[test]
    fn test_ids_unique_within_pass() {
        let info = normalize(&json!({
            "boxes": [
                { "label": "exposed_a", "x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2 },
                { "label": "exposed_a", "x": 0.5, "y": 0.5, "width": 0.2, "height": 0.2 },
                {},
                {},
            ]
        }));
        let mut ids: Vec<&str> = info.detections.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_missing_label_becomes_unknown() {
        let info = normalize(&json!({ "boxes": [{ "x": 0.1 }] }));
        assert_eq!(info.detections[0].label, "UNKNOWN_0");
    }

    #[test]
    fn test_label_field_fallback_order() {
        let info = normalize(&json!({
            "boxes": [
                { "class": "belly", "name": "ignored" },
                { "name": "face_female" },
            ]
        }));
        assert_eq!(info.detections[0].label, "BELLY");
        assert_eq!(info.detections[1].label, "FACE_FEMALE");
    }

    #[test]
    fn test_safe_and_sensitive_exclusive() {
        let info = normalize(&json!({
            "boxes": [
                { "label": "face_female", "isSensitive": true },
                { "label": "exposed_x" },
                { "label": "buttocks_covered" },
            ]
        }));
        for d in &info.detections {
            assert!(!(d.is_safe && d.is_sensitive), "{} is both", d.label);
        }
        // The explicit flag never overrides a safe label.
        assert!(info.detections[0].is_safe);
        assert!(!info.detections[0].is_sensitive);
    }

    #[test]
    fn test_unit_inference() {
        let info = normalize(&json!({
            "boxes": [
                { "label": "a", "x": 0.5, "y": 0.5, "width": 0.1, "height": 0.1 },
                { "label": "b", "x": 100, "y": 50, "width": 20, "height": 20 },
            ]
        }));
        assert_eq!(info.detections[0].rect.unit, BoxUnit::Normalized);
        assert_eq!(info.detections[1].rect.unit, BoxUnit::Pixel);
    }

    #[test]
    fn test_malformed_fields_default_to_zero() {
        let info = normalize(&json!({
            "boxes": [{ "label": "thing", "confidence": "high", "x": "wat" }]
        }));
        let d = &info.detections[0];
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.rect.x, 0.0);
        assert_eq!(d.rect.width, 0.0);
    }

    #[test]
    fn test_derived_severity() {
        let clean = normalize(&json!({ "boxes": [{ "label": "face_female" }] }));
        assert_eq!(clean.severity, Severity::None);

        let mild = normalize(&json!({ "boxes": [{ "label": "buttocks_covered" }] }));
        assert_eq!(mild.severity, Severity::Mild);

        let sensitive = normalize(&json!({
            "boxes": [{ "label": "buttocks_covered" }, { "label": "exposed_x" }]
        }));
        assert_eq!(sensitive.severity, Severity::Sensitive);
    }

    #[test]
    fn test_explicit_severity_takes_precedence() {
        let info = normalize(&json!({
            "severity": "mild",
            "boxes": [{ "label": "exposed_x" }]
        }));
        assert_eq!(info.severity, Severity::Mild);
    }

    #[test]
    fn test_classify_label_adapter() {
        assert_eq!(classify_label("FACE_MALE"), LabelClass::Safe);
        assert_eq!(classify_label("ARMPITS_EXPOSED"), LabelClass::Safe);
        assert_eq!(classify_label("FEET_COVERED"), LabelClass::Safe);
        assert_eq!(classify_label("BUTTOCKS_COVERED"), LabelClass::Mild);
        assert_eq!(classify_label("BELLY"), LabelClass::Mild);
        assert_eq!(classify_label("EXPOSED_GENITALIA"), LabelClass::Sensitive);
    }
}
