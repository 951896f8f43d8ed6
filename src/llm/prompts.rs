use std::collections::BTreeMap;

use crate::error::RateError;
use crate::models::{ClassificationRequest, EmpathyScale, Modality, Segment};

/// Build the rating request for one (segment, modality) pair.
///
/// Fails with `MissingInput` when the segment lacks an attribute the modality
/// requires; the runner records such pairs as skipped. Pure: no network or
/// file I/O happens here - the raw-audio clip travels as a path and is only
/// read at send time.
pub fn build_request(
    segment: &Segment,
    modality: Modality,
    scale: EmpathyScale,
) -> Result<ClassificationRequest, RateError> {
    let missing = |what: &'static str| RateError::MissingInput {
        segment_id: segment.segment_id.clone(),
        modality,
        what,
    };

    let payload = match modality {
        Modality::Transcript => {
            let transcript = segment.transcript_text().ok_or_else(|| missing("transcript"))?;
            format!("## Transcript\n{}\n\nEmpathy rating:", transcript)
        }
        Modality::AudioFeatures => {
            let features = segment.feature_vector().ok_or_else(|| missing("audio features"))?;
            format!(
                "## Audio features\n{}\nEmpathy rating:",
                format_feature_block(features)
            )
        }
        Modality::Combined => {
            let transcript = segment.transcript_text().ok_or_else(|| missing("transcript"))?;
            let features = segment.feature_vector().ok_or_else(|| missing("audio features"))?;
            format!(
                "## Transcript\n{}\n\n## Audio features\n{}\nEmpathy rating:",
                transcript,
                format_feature_block(features)
            )
        }
        Modality::RawAudio => {
            segment.audio_clip.as_ref().ok_or_else(|| missing("audio clip"))?;
            "Rate the empathy expressed in the attached recording.\n\nEmpathy rating:"
                .to_string()
        }
    };

    Ok(ClassificationRequest::new(
        &segment.segment_id,
        modality,
        build_instructions(modality, scale),
        payload,
        segment.audio_clip.clone(),
    ))
}

/// Fixed instruction text for a modality: what to judge, the ordinal scale,
/// and the required output format.
pub fn build_instructions(modality: Modality, scale: EmpathyScale) -> String {
    let role = match modality {
        Modality::Transcript => {
            "You are an expert empathy rater. Rate the level of empathy expressed in the \
             following speech transcript."
        }
        Modality::AudioFeatures => {
            "You are an expert empathy rater. Rate the level of empathy expressed in a \
             speaker's voice, described by the numeric audio features below."
        }
        Modality::Combined => {
            "You are an expert empathy rater. Rate the level of empathy expressed in a \
             speech segment using both its transcript and the numeric audio features of \
             the same recording. The two sections are delimited below; treat them as two \
             views of one segment."
        }
        Modality::RawAudio => {
            "You are an expert empathy rater. Listen to the attached speech recording and \
             rate the level of empathy the speaker expresses."
        }
    };

    format!(
        "{}\n\nAnswer with a single integer from {} to {}, where {} means anti-empathetic \
         and {} means strongly empathetic. You may add a short justification after the \
         integer, but the integer must come first.\n\nBase your rating only on the \
         material provided.",
        role, scale.min, scale.max, scale.min, scale.max
    )
}

/// Render the feature vector one line per feature, pairing each value with a
/// short description - bare floats mean nothing to the rating service.
fn format_feature_block(features: &BTreeMap<String, f64>) -> String {
    let mut block = String::new();
    for (name, value) in features {
        block.push_str(&format!(
            "- {} = {} ({})\n",
            name,
            value,
            feature_description(name)
        ));
    }
    block
}

/// Human-readable descriptions for the features the extraction stage emits.
fn feature_description(name: &str) -> &'static str {
    if name.starts_with("mfcc_mean") {
        return "mean mel-frequency cepstral coefficient, a timbre descriptor";
    }
    if name.starts_with("tonnetz_mean") {
        return "mean tonal centroid component, a harmonic color descriptor";
    }
    match name {
        "duration_sec" => "segment length in seconds",
        "tempo_bpm" => "estimated speech tempo in beats per minute",
        "silence_ratio" => "fraction of frames below the silence energy threshold",
        _ => "numeric audio descriptor",
    }
}
