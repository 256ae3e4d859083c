//! Record identifier generation.
//!
//! IDs keep the legacy `<system>_<YYYYmmddHHMMSS>` shape so they sort by
//! creation time, with an 8-hex random suffix so two creations for the same
//! system within one second never share an ID.

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn random_suffix() -> String {
    let mut simple = uuid::Uuid::new_v4().simple().to_string();
    simple.truncate(8);
    simple
}

/// Make `system_id` usable as part of a record key.
///
/// Path separators and NUL become `_`, as do runs of dots and a leading dot.
/// The record itself keeps the original system ID.
pub fn id_segment(system_id: &str) -> String {
    let mut segment: String = system_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if segment.contains("..") {
        segment = segment.replace("..", "__");
    }
    if segment.starts_with('.') {
        segment.replace_range(..1, "_");
    }
    segment
}

/// ID for a new per-dimension assessment of `system_id`.
pub fn assessment_id(system_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        id_segment(system_id),
        at.format(TIMESTAMP_FORMAT),
        random_suffix()
    )
}

/// ID for a new comprehensive orchestration of `system_id`.
pub fn orchestration_id(system_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "orch_{}_{}_{}",
        id_segment(system_id),
        at.format(TIMESTAMP_FORMAT),
        random_suffix()
    )
}
