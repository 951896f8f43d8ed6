use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RateError;
use crate::models::Modality;

/// A timestamped segment of a source video with its hand-labeled ground truth.
///
/// Produced by the upstream extraction stage; read-only to the pipeline.
/// Transcript, feature vector, and audio clip are each optional - a segment
/// lacking an attribute is skipped for the modalities that require it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Stable identifier, unique within a run.
    pub segment_id: String,
    /// Media-relative start offset in milliseconds.
    pub start_ms: u64,
    /// Media-relative end offset in milliseconds.
    pub end_ms: u64,
    /// Transcribed speech for this time range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Human-assigned empathy label on the configured ordinal scale.
    pub ground_truth: i64,
    /// Named scalar audio features (tempo, MFCC means, silence ratio, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_features: Option<BTreeMap<String, f64>>,
    /// Path to the extracted WAV clip for this segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_clip: Option<PathBuf>,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Transcript text, treating empty/whitespace-only text as absent.
    pub fn transcript_text(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Feature vector, treating an empty map as absent.
    pub fn feature_vector(&self) -> Option<&BTreeMap<String, f64>> {
        self.audio_features.as_ref().filter(|f| !f.is_empty())
    }

    /// Whether this segment carries every input the modality requires.
    pub fn has_inputs_for(&self, modality: Modality) -> bool {
        match modality {
            Modality::Transcript => self.transcript_text().is_some(),
            Modality::AudioFeatures => self.feature_vector().is_some(),
            Modality::Combined => {
                self.transcript_text().is_some() && self.feature_vector().is_some()
            }
            Modality::RawAudio => self.audio_clip.is_some(),
        }
    }
}

/// Read-only collection of segments for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSet {
    pub segments: Vec<Segment>,
}

impl SegmentSet {
    /// Build a set, enforcing unique ids and start < end on every segment.
    pub fn new(segments: Vec<Segment>) -> Result<Self, RateError> {
        let mut seen = std::collections::HashSet::new();
        for segment in &segments {
            if !seen.insert(segment.segment_id.as_str()) {
                return Err(RateError::Configuration(format!(
                    "duplicate segment id '{}'",
                    segment.segment_id
                )));
            }
            if segment.start_ms >= segment.end_ms {
                return Err(RateError::Configuration(format!(
                    "segment '{}' has start {}ms >= end {}ms",
                    segment.segment_id, segment.start_ms, segment.end_ms
                )));
            }
        }
        Ok(Self { segments })
    }

    pub fn get(&self, segment_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.segment_id == segment_id)
    }

    pub fn ground_truth_of(&self, segment_id: &str) -> Option<i64> {
        self.get(segment_id).map(|s| s.ground_truth)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
