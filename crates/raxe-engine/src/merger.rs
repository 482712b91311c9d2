//! Scan merger
//!
//! Fuses L1 detections, L2 predictions, and plugin detections into a
//! `CombinedScanResult` with one authoritative severity. L2 predictions
//! become synthetic detections (`l2-<label>`) carrying the severity
//! derived from their confidence; duplicates collapse on
//! `(rule_id, first span)`.

use chrono::Utc;
use raxe_core::{
    CombinedScanResult, Detection, DetectionLayer, L2Result, ScanResult, Severity,
};
use raxe_rules::sort_detections;
use std::collections::HashSet;

/// Fuse layer outputs into a combined result
///
/// `confidence_threshold` governs the `has_threats` flag: the flag is set
/// only when a surviving detection reaches the threshold and the combined
/// severity is at least low.
pub fn merge(
    l1: ScanResult,
    l2: Option<L2Result>,
    plugin_detections: Vec<Detection>,
    confidence_threshold: f64,
) -> CombinedScanResult {
    let mut detections: Vec<Detection> = Vec::new();
    let mut seen = HashSet::new();

    for detection in &l1.detections {
        if seen.insert(detection.dedup_key()) {
            detections.push(detection.clone());
        }
    }

    if let Some(l2_result) = &l2 {
        for (index, prediction) in l2_result.predictions.iter().enumerate() {
            let rule_id = format!("l2-{}", prediction.label);
            // Synthetic key: the prediction index stands in for a span
            if !seen.insert((rule_id.clone(), Some((index, index)))) {
                continue;
            }
            let mut detection = Detection::new(
                rule_id,
                prediction.family,
                prediction.derived_severity(),
                prediction.confidence,
                DetectionLayer::L2,
                format!("classifier predicted {}", prediction.label),
            );
            if let Some(subfamily) = &prediction.subfamily {
                detection = detection.with_explanation(format!("subfamily: {}", subfamily));
            }
            detection.detected_at = Utc::now();
            detections.push(detection);
        }
    }

    for detection in plugin_detections {
        if seen.insert(detection.dedup_key()) {
            detections.push(detection);
        }
    }

    sort_detections(&mut detections);

    let l1_severity = l1.highest_severity();
    let l2_severity = l2.as_ref().and_then(|r| r.derived_severity());
    let plugin_severity = detections
        .iter()
        .filter(|d| d.layer == DetectionLayer::Plugin)
        .map(|d| d.severity)
        .max();

    let severity = [l1_severity, l2_severity, plugin_severity]
        .into_iter()
        .flatten()
        .max();

    let has_threats = severity.map_or(false, |s| s >= Severity::Low)
        && detections.iter().any(|d| d.confidence >= confidence_threshold);

    CombinedScanResult {
        detections,
        severity,
        has_threats,
        l1,
        l2,
    }
}

/// Recompute the threat flag after suppressions partition the list
pub fn recompute_threat_flag(result: &mut CombinedScanResult, confidence_threshold: f64) {
    result.severity = {
        let detection_severity = result.highest_detection_severity();
        let l2_severity = result.l2.as_ref().and_then(|r| r.derived_severity());
        // A suppressed L2 detection no longer contributes its derived
        // severity either; only count it while its detection survives
        let l2_alive = result
            .detections
            .iter()
            .any(|d| d.layer == DetectionLayer::L2);
        match (detection_severity, l2_severity) {
            (Some(d), Some(l2)) if l2_alive => Some(d.max(l2)),
            (detection, _) => detection,
        }
    };

    result.has_threats = result.severity.map_or(false, |s| s >= Severity::Low)
        && result
            .detections
            .iter()
            .any(|d| d.confidence >= confidence_threshold);
}
