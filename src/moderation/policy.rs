/// Redaction policy engine
///
/// A pure decision table mapping the active safety settings and an
/// image's moderation state to a `RedactionDecision`. Rules are
/// evaluated top to bottom; the first match wins. The table is total:
/// every input combination produces exactly one decision.

use super::detection::{Detection, ModerationInfo, Severity};

/// User-selected safety level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyLevel {
    /// No redaction anywhere
    Off,
    /// Blur images whose aggregate severity is sensitive
    Enabled,
    /// Blanket blur independent of detection confidence
    Strict,
}

impl SafetyLevel {
    /// All levels, in escalation order (for the settings picker).
    pub const ALL: [SafetyLevel; 3] = [SafetyLevel::Off, SafetyLevel::Enabled, SafetyLevel::Strict];
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Enabled => write!(f, "Enabled"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// What to redact for one image under the current settings.
///
/// Derived per (entry, settings) pair and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionDecision {
    pub blur_thumbnail: bool,
    pub blur_inspector: bool,
    /// Regions to mask in the inspector instead of a full-view blur
    pub inspector_boxes: Vec<Detection>,
}

impl RedactionDecision {
    fn clear() -> Self {
        Self {
            blur_thumbnail: false,
            blur_inspector: false,
            inspector_boxes: Vec::new(),
        }
    }

    fn blur_all() -> Self {
        Self {
            blur_thumbnail: true,
            blur_inspector: true,
            inspector_boxes: Vec::new(),
        }
    }
}

/// Decide whether and how to redact one image.
///
/// `moderation` is `None` for an entry that has never been scored, which
/// is distinct from a scored-clean `ModerationInfo` with no detections.
pub fn decide(
    level: SafetyLevel,
    selective_ambiguity: bool,
    moderation: Option<&ModerationInfo>,
) -> RedactionDecision {
    // Rule 1: safety off disables everything.
    if level == SafetyLevel::Off {
        return RedactionDecision::clear();
    }

    // Rule 2: not yet scored. Nothing concrete to draw, so blur
    // everything as the conservative default.
    let info = match moderation {
        Some(info) => info,
        None => return RedactionDecision::blur_all(),
    };

    // Rule 3: selective ambiguity trades the coarse full-view blur for a
    // precise per-region mask when there is anything to mask.
    if selective_ambiguity {
        let non_safe = info.non_safe();
        if !non_safe.is_empty() {
            let sensitive = info.sensitive();
            let boxes = if sensitive.is_empty() { non_safe } else { sensitive };
            return RedactionDecision {
                blur_thumbnail: level == SafetyLevel::Strict
                    || info.severity == Severity::Sensitive,
                blur_inspector: false,
                inspector_boxes: boxes,
            };
        }
    }

    // Rule 4: enabled blurs only on sensitive severity; mild passes.
    if level == SafetyLevel::Enabled {
        return if info.severity == Severity::Sensitive {
            RedactionDecision::blur_all()
        } else {
            RedactionDecision::clear()
        };
    }

    // Rule 5: strict is a blanket guarantee, no per-region overlay.
    if level == SafetyLevel::Strict {
        return RedactionDecision::blur_all();
    }

    // Rule 6: nothing matched.
    RedactionDecision::clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::detection::{BoxUnit, DetectionRect, LabelClass};

    fn det(label: &str, class: LabelClass) -> Detection {
        Detection {
            id: format!("{}_0", label),
            label: label.to_string(),
            class,
            confidence: 0.9,
            rect: DetectionRect {
                x: 0.1,
                y: 0.1,
                width: 0.2,
                height: 0.2,
                unit: BoxUnit::Normalized,
            },
            is_safe: class == LabelClass::Safe,
            is_sensitive: class == LabelClass::Sensitive,
        }
    }

    fn info(severity: Severity, detections: Vec<Detection>) -> ModerationInfo {
        ModerationInfo {
            detections,
            severity,
        }
    }

    #[test]
    fn test_off_never_redacts() {
        let scored = info(Severity::Sensitive, vec![det("X", LabelClass::Sensitive)]);
        for selective in [false, true] {
            let d = decide(SafetyLevel::Off, selective, Some(&scored));
            assert!(!d.blur_thumbnail);
            assert!(!d.blur_inspector);
            assert!(d.inspector_boxes.is_empty());

            let d = decide(SafetyLevel::Off, selective, None);
            assert_eq!(d, RedactionDecision::clear());
        }
    }

    #[test]
    fn test_unscored_blurs_everything() {
        for level in [SafetyLevel::Enabled, SafetyLevel::Strict] {
            for selective in [false, true] {
                let d = decide(level, selective, None);
                assert!(d.blur_thumbnail);
                assert!(d.blur_inspector);
                assert!(d.inspector_boxes.is_empty());
            }
        }
    }

    #[test]
    fn test_selective_masks_regions_instead_of_blur() {
        let scored = info(
            Severity::Sensitive,
            vec![
                det("FACE", LabelClass::Safe),
                det("COVERED_A", LabelClass::Mild),
                det("EXPOSED_B", LabelClass::Sensitive),
            ],
        );
        let d = decide(SafetyLevel::Enabled, true, Some(&scored));
        assert!(!d.blur_inspector);
        // Sensitive detections exist, so only those are masked.
        assert_eq!(d.inspector_boxes.len(), 1);
        assert_eq!(d.inspector_boxes[0].label, "EXPOSED_B");
        // Severity is sensitive, so the thumbnail still blurs.
        assert!(d.blur_thumbnail);
    }

    #[test]
    fn test_selective_falls_back_to_all_non_safe() {
        let scored = info(
            Severity::Mild,
            vec![
                det("FACE", LabelClass::Safe),
                det("COVERED_A", LabelClass::Mild),
                det("COVERED_B", LabelClass::Mild),
            ],
        );
        let d = decide(SafetyLevel::Enabled, true, Some(&scored));
        assert!(!d.blur_inspector);
        assert_eq!(d.inspector_boxes.len(), 2);
        // Mild severity under Enabled: thumbnail stays visible.
        assert!(!d.blur_thumbnail);

        // Under Strict the thumbnail blurs even for mild regions.
        let d = decide(SafetyLevel::Strict, true, Some(&scored));
        assert!(d.blur_thumbnail);
        assert!(!d.blur_inspector);
    }

    #[test]
    fn test_selective_with_only_safe_detections_falls_through() {
        let scored = info(Severity::None, vec![det("FACE", LabelClass::Safe)]);
        let d = decide(SafetyLevel::Strict, true, Some(&scored));
        // No non-safe regions to mask, so rule 5 applies.
        assert_eq!(d, RedactionDecision::blur_all());
    }

    #[test]
    fn test_enabled_blurs_only_sensitive() {
        let clean = info(Severity::None, vec![]);
        let mild = info(Severity::Mild, vec![det("COVERED_A", LabelClass::Mild)]);
        let sensitive = info(Severity::Sensitive, vec![det("X", LabelClass::Sensitive)]);

        assert_eq!(
            decide(SafetyLevel::Enabled, false, Some(&clean)),
            RedactionDecision::clear()
        );
        assert_eq!(
            decide(SafetyLevel::Enabled, false, Some(&mild)),
            RedactionDecision::clear()
        );
        assert_eq!(
            decide(SafetyLevel::Enabled, false, Some(&sensitive)),
            RedactionDecision::blur_all()
        );
    }

    #[test]
    fn test_strict_always_blurs_with_no_overlay() {
        let sensitive = info(Severity::Sensitive, vec![det("X", LabelClass::Sensitive)]);
        let d = decide(SafetyLevel::Strict, false, Some(&sensitive));
        assert!(d.blur_thumbnail);
        assert!(d.blur_inspector);
        assert!(d.inspector_boxes.is_empty());

        let clean = info(Severity::None, vec![]);
        assert_eq!(
            decide(SafetyLevel::Strict, false, Some(&clean)),
            RedactionDecision::blur_all()
        );
    }

    /// Every combination of level, selective flag, severity, and scored
    /// state produces exactly one decision without panicking.
    #[test]
    fn test_table_is_total() {
        let infos = [
            None,
            Some(info(Severity::None, vec![])),
            Some(info(Severity::Mild, vec![det("COVERED_A", LabelClass::Mild)])),
            Some(info(
                Severity::Sensitive,
                vec![det("X", LabelClass::Sensitive)],
            )),
        ];
        for level in [SafetyLevel::Off, SafetyLevel::Enabled, SafetyLevel::Strict] {
            for selective in [false, true] {
                for m in &infos {
                    let first = decide(level, selective, m.as_ref());
                    let second = decide(level, selective, m.as_ref());
                    assert_eq!(first, second, "decision must be deterministic");
                }
            }
        }
    }
}
