use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::models::{Segment, SegmentSet};

/// One record of the segments file, as written by the extraction stage.
#[derive(Debug, Deserialize)]
struct SegmentRecord {
    segment_id: String,
    start_ms: u64,
    end_ms: u64,
    #[serde(default)]
    transcript: Option<String>,
    ground_truth: i64,
    #[serde(default)]
    audio_features: Option<BTreeMap<String, f64>>,
}

/// One record of the standalone audio-features file. Everything except the
/// segment id is collected as a named scalar feature.
#[derive(Debug, Deserialize)]
struct FeatureRecord {
    segment_id: String,
    #[serde(flatten)]
    features: BTreeMap<String, f64>,
}

/// Parse a segments JSON file into a SegmentSet
pub fn parse_segments_file(path: &Path) -> Result<SegmentSet> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_segments_json(&content)
}

/// Parse a segments JSON string into a SegmentSet
pub fn parse_segments_json(json: &str) -> Result<SegmentSet> {
    let records: Vec<SegmentRecord> =
        serde_json::from_str(json).context("Failed to parse segments JSON")?;

    let segments = records
        .into_iter()
        .map(|r| Segment {
            segment_id: r.segment_id,
            start_ms: r.start_ms,
            end_ms: r.end_ms,
            transcript: r.transcript,
            ground_truth: r.ground_truth,
            audio_features: r.audio_features,
            audio_clip: None,
        })
        .collect();

    SegmentSet::new(segments).context("Invalid segment set")
}

/// Merge a standalone audio-features file into the segment set, keyed by
/// segment id. Features from this file replace any inline feature vector.
/// Returns the number of segments that received features.
pub fn merge_features_file(set: &mut SegmentSet, path: &Path) -> Result<usize> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let records: Vec<FeatureRecord> =
        serde_json::from_str(&content).context("Failed to parse features JSON")?;

    let mut merged = 0;
    for record in records {
        match set
            .segments
            .iter_mut()
            .find(|s| s.segment_id == record.segment_id)
        {
            Some(segment) => {
                segment.audio_features = Some(record.features);
                merged += 1;
            }
            None => {
                warn!(
                    "features file references unknown segment '{}'",
                    record.segment_id
                );
            }
        }
    }
    Ok(merged)
}

/// Resolve `<dir>/<segment_id>.wav` for every segment and attach the clips
/// that exist. Returns the number of clips attached.
pub fn attach_audio_clips(set: &mut SegmentSet, dir: &Path) -> usize {
    let mut attached = 0;
    for segment in &mut set.segments {
        let clip = dir.join(format!("{}.wav", segment.segment_id));
        if clip.is_file() {
            segment.audio_clip = Some(clip);
            attached += 1;
        }
    }
    attached
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_json() {
        let json = r#"[
            {"segment_id": "vid1_a", "start_ms": 20000, "end_ms": 33000,
             "transcript": "I hear you.", "ground_truth": 5},
            {"segment_id": "vid1_b", "start_ms": 40000, "end_ms": 52000,
             "ground_truth": 3,
             "audio_features": {"tempo_bpm": 101.5, "silence_ratio": 0.22}}
        ]"#;

        let set = parse_segments_json(json).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("vid1_a").unwrap().transcript.as_deref(), Some("I hear you."));
        assert_eq!(set.get("vid1_b").unwrap().transcript, None);
        assert_eq!(
            set.get("vid1_b")
                .unwrap()
                .audio_features
                .as_ref()
                .unwrap()
                .get("tempo_bpm"),
            Some(&101.5)
        );
        assert_eq!(set.ground_truth_of("vid1_b"), Some(3));
    }

    #[test]
    fn test_duplicate_segment_ids_rejected() {
        let json = r#"[
            {"segment_id": "dup", "start_ms": 0, "end_ms": 1000, "ground_truth": 1},
            {"segment_id": "dup", "start_ms": 2000, "end_ms": 3000, "ground_truth": 2}
        ]"#;
        assert!(parse_segments_json(json).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let json = r#"[
            {"segment_id": "bad", "start_ms": 5000, "end_ms": 5000, "ground_truth": 1}
        ]"#;
        assert!(parse_segments_json(json).is_err());
    }

    #[test]
    fn test_merge_features_file() {
        let segments_json = r#"[
            {"segment_id": "a", "start_ms": 0, "end_ms": 1000, "ground_truth": 4},
            {"segment_id": "b", "start_ms": 1000, "end_ms": 2000, "ground_truth": 2}
        ]"#;
        let mut set = parse_segments_json(segments_json).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let features_path = dir.path().join("features.json");
        std::fs::write(
            &features_path,
            r#"[
                {"segment_id": "a", "tempo_bpm": 88.0, "silence_ratio": 0.4},
                {"segment_id": "ghost", "tempo_bpm": 10.0}
            ]"#,
        )
        .unwrap();

        let merged = merge_features_file(&mut set, &features_path).unwrap();
        assert_eq!(merged, 1);
        assert!(set.get("a").unwrap().feature_vector().is_some());
        assert!(set.get("b").unwrap().feature_vector().is_none());
    }

    #[test]
    fn test_attach_audio_clips() {
        let segments_json = r#"[
            {"segment_id": "a", "start_ms": 0, "end_ms": 1000, "ground_truth": 4},
            {"segment_id": "b", "start_ms": 1000, "end_ms": 2000, "ground_truth": 2}
        ]"#;
        let mut set = parse_segments_json(segments_json).unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"RIFF").unwrap();

        let attached = attach_audio_clips(&mut set, dir.path());
        assert_eq!(attached, 1);
        assert!(set.get("a").unwrap().audio_clip.is_some());
        assert!(set.get("b").unwrap().audio_clip.is_none());
    }
}
