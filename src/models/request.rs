use std::path::PathBuf;

use crate::models::Modality;

/// A fully-specified rating request for one (segment, modality) pair.
///
/// Ephemeral: created by the prompt builder, consumed by the rating client,
/// discarded once a result is obtained. The audio clip is carried as a path
/// and only read and encoded at send time, so building a request never does
/// I/O.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    /// Random id correlating log lines across retries.
    pub request_id: String,
    pub segment_id: String,
    pub modality: Modality,
    /// Fixed per-modality instruction text (scale and output format).
    pub instructions: String,
    /// Rendered text payload: transcript and/or annotated feature block.
    pub payload: String,
    /// WAV clip to attach for the raw-audio modality.
    pub audio_clip: Option<PathBuf>,
}

impl ClassificationRequest {
    pub fn new(
        segment_id: impl Into<String>,
        modality: Modality,
        instructions: String,
        payload: String,
        audio_clip: Option<PathBuf>,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            segment_id: segment_id.into(),
            modality,
            instructions,
            payload,
            audio_clip,
        }
    }
}
