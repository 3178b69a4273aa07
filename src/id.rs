//! ID and timestamp utilities for renderloop
//!
//! Job ids are random UUIDs. Artifact names use a second-resolution local
//! timestamp; the workspace adds a suffix when two runs land in the same
//! second.

use chrono::Local;
use uuid::Uuid;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a unique job ID
///
/// Format: hyphenated UUID v4, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`
pub fn generate_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Timestamp used in persisted artifact names
///
/// Format: `YYYYmmdd_HHMMSS`, e.g. `20261019_142501`
pub fn artifact_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
