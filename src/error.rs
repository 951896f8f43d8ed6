use thiserror::Error;

use crate::models::Modality;

/// Errors raised while building requests or talking to the rating service.
///
/// Only `Configuration` is fatal to a run. The other variants are captured
/// into the status of the result row for the affected (segment, modality)
/// pair and never cross the runner boundary.
#[derive(Debug, Error)]
pub enum RateError {
    /// The segment lacks an attribute the requested modality needs.
    #[error("segment {segment_id} has no {what}, required by the {modality} modality")]
    MissingInput {
        segment_id: String,
        modality: Modality,
        what: &'static str,
    },

    /// Network failure, non-success HTTP status, or per-call timeout.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service response contained no integer label within the scale.
    #[error("no label in range {min}..={max} found in response")]
    ResponseParse { min: i64, max: i64 },

    /// Missing credentials or an invalid run configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        RateError::Transport(err.to_string())
    }
}
