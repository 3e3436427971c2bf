//! Typed views over job result payloads.
//!
//! The scheduler treats `result` as opaque JSON; notification wording needs
//! a little structure. Parsing is deliberately forgiving: anything that does
//! not fit the expected shape degrades to a generic outcome rather than an
//! error.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::{
    CIVIC_ENGAGEMENT_PROCESSING, FLYER_PROCESSING, PRIVATE_EVENT_PROCESSING,
};

/// One event extracted from a submitted flyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlyerOutcome {
    Events(Vec<ExtractedEvent>),
    /// The flyer matched an event already on the calendar.
    Duplicate,
    NoEventFound,
}

/// A completed job's result, interpreted per job type.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Flyer(FlyerOutcome),
    PrivateEvent,
    CivicEngagement,
}

/// Interpret a completed job's result. `None` means the job type has no
/// notification mapping and the dispatcher should stay silent.
pub fn parse_outcome(job_type: &str, result: &serde_json::Value) -> Option<JobOutcome> {
    match job_type {
        FLYER_PROCESSING => Some(JobOutcome::Flyer(parse_flyer(result))),
        PRIVATE_EVENT_PROCESSING => Some(JobOutcome::PrivateEvent),
        CIVIC_ENGAGEMENT_PROCESSING => Some(JobOutcome::CivicEngagement),
        _ => None,
    }
}

fn parse_flyer(result: &serde_json::Value) -> FlyerOutcome {
    if result["duplicate"].as_bool() == Some(true) {
        return FlyerOutcome::Duplicate;
    }
    let events: Vec<ExtractedEvent> = result["events"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    if events.is_empty() {
        FlyerOutcome::NoEventFound
    } else {
        FlyerOutcome::Events(events)
    }
}
