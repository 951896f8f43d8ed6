use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ClassificationRequest, Modality};

/// Terminal outcome of classifying one (segment, modality) pair.
///
/// Every pair reaches exactly one of these; there are no retries or updates
/// after a row is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// A valid label was extracted from the service response.
    Ok,
    /// The service answered but no in-range integer could be extracted.
    ParseError,
    /// Every call attempt failed or timed out.
    ServiceError,
    /// The segment lacks an input the modality requires; no call was made.
    SkippedMissingInput,
}

impl ResultStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultStatus::Ok)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultStatus::Ok => "ok",
            ResultStatus::ParseError => "parse_error",
            ResultStatus::ServiceError => "service_error",
            ResultStatus::SkippedMissingInput => "skipped_missing_input",
        };
        f.write_str(s)
    }
}

/// One persisted row of the result table, keyed by (segment_id, modality).
///
/// Immutable once written. `raw_response` keeps the verbatim service output
/// for auditing, including responses no label could be parsed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub segment_id: String,
    pub modality: Modality,
    pub predicted_label: Option<i64>,
    pub raw_response: Option<String>,
    /// Number of service calls actually made for this pair.
    pub attempt_count: u32,
    pub status: ResultStatus,
    pub rated_at: DateTime<Utc>,
}

impl ClassificationResult {
    pub fn ok(request: &ClassificationRequest, label: i64, raw: String, attempts: u32) -> Self {
        Self {
            segment_id: request.segment_id.clone(),
            modality: request.modality,
            predicted_label: Some(label),
            raw_response: Some(raw),
            attempt_count: attempts,
            status: ResultStatus::Ok,
            rated_at: Utc::now(),
        }
    }

    pub fn parse_error(request: &ClassificationRequest, raw: String, attempts: u32) -> Self {
        Self {
            segment_id: request.segment_id.clone(),
            modality: request.modality,
            predicted_label: None,
            raw_response: Some(raw),
            attempt_count: attempts,
            status: ResultStatus::ParseError,
            rated_at: Utc::now(),
        }
    }

    pub fn service_error(request: &ClassificationRequest, attempts: u32) -> Self {
        Self {
            segment_id: request.segment_id.clone(),
            modality: request.modality,
            predicted_label: None,
            raw_response: None,
            attempt_count: attempts,
            status: ResultStatus::ServiceError,
            rated_at: Utc::now(),
        }
    }

    pub fn skipped_missing_input(segment_id: impl Into<String>, modality: Modality) -> Self {
        Self {
            segment_id: segment_id.into(),
            modality,
            predicted_label: None,
            raw_response: None,
            attempt_count: 0,
            status: ResultStatus::SkippedMissingInput,
            rated_at: Utc::now(),
        }
    }

    /// Identity of this row in the result table.
    pub fn key(&self) -> (String, Modality) {
        (self.segment_id.clone(), self.modality)
    }
}
