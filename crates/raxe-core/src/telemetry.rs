//! Telemetry and scan-history schemas
//!
//! One event per scan, built from the pipeline result and handed to an
//! injected sink. Events are privacy-preserving by construction: they
//! carry the input fingerprint and aggregate counters, never raw text,
//! matched substrings, user identifiers, or configuration values.

use crate::severity::Severity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-scan telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTelemetryEvent {
    /// When the scan completed
    pub timestamp: DateTime<Utc>,

    /// SHA-256 hex fingerprint of the input
    pub prompt_hash: String,

    /// Whether the L1 layer fired
    pub l1_hit: bool,

    /// Whether the L2 layer fired
    pub l2_hit: bool,

    /// Number of detections after suppression
    pub detection_count: usize,

    /// Highest severity across detections, if any
    pub highest_severity: Option<Severity>,

    /// Total scan duration in milliseconds
    pub scan_duration_ms: u64,

    /// L1 portion of the duration
    pub l1_duration_ms: u64,

    /// L2 portion of the duration, when L2 ran
    pub l2_duration_ms: Option<u64>,

    /// Model type identifier, when L2 ran
    pub model_type: Option<String>,

    /// Ids of the rules that fired
    pub rule_ids_fired: Vec<String>,
}

/// A row of persisted scan history
///
/// Persistence itself is a sink concern; this type fixes the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistoryRecord {
    /// Row id assigned by the sink
    pub id: u64,

    /// When the scan completed
    pub timestamp: DateTime<Utc>,

    /// SHA-256 hex fingerprint of the input
    pub prompt_hash: String,

    /// Number of detections after suppression
    pub detection_count: usize,

    /// Highest severity across detections, if any
    pub highest_severity: Option<Severity>,

    /// Total scan duration in milliseconds
    pub duration_ms: u64,

    /// L1 portion of the duration
    pub l1_duration_ms: u64,

    /// L2 portion of the duration, when L2 ran
    pub l2_duration_ms: Option<u64>,

    /// Version of the pipeline that produced the row
    pub pipeline_version: String,
}

/// Sink accepting pre-redacted telemetry events
///
/// Transport is out of scope; implementations may batch, drop, or forward.
/// A failed emit must never fail a scan.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Accept one event
    async fn emit(&self, event: ScanTelemetryEvent);
}

/// Sink accepting scan-history rows
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Persist one record
    async fn record(&self, record: ScanHistoryRecord);
}

/// Sink that drops everything; the default when telemetry is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl TelemetrySink for NoopSink {
    async fn emit(&self, _event: ScanTelemetryEvent) {}
}

#[async_trait]
impl HistorySink for NoopSink {
    async fn record(&self, _record: ScanHistoryRecord) {}
}
