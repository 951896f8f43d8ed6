use tracing::warn;

use crate::models::{
    AnalysisRecord, ClassificationResult, ConfusionMatrix, EmpathyScale, MatchQuality, Modality,
    SegmentSet,
};

/// Compare classification results to ground truth, one analysis record per
/// modality present in the result set, in canonical modality order.
///
/// Error metrics are computed over OK results only, but every excluded row
/// (parse/service errors, skips, unknown segment ids, out-of-scale labels)
/// is counted and reported - dropping failed calls silently would overstate
/// a modality's performance.
///
/// Pure function of its inputs: repeated runs over the same result table and
/// ground truth produce identical records.
pub fn execute_evaluate(
    results: &[ClassificationResult],
    segments: &SegmentSet,
    scale: EmpathyScale,
) -> Vec<AnalysisRecord> {
    let mut records = Vec::new();

    for modality in Modality::ALL {
        let rows: Vec<&ClassificationResult> =
            results.iter().filter(|r| r.modality == modality).collect();
        if rows.is_empty() {
            continue;
        }

        let mut confusion = ConfusionMatrix::new(scale);
        let mut abs_error_sum = 0.0;
        let mut sample_count = 0usize;
        let mut skipped_count = 0usize;
        let mut hits = 0usize;
        let mut near_misses = 0usize;
        let mut misses = 0usize;

        for row in rows {
            let aligned = match (row.status.is_ok(), row.predicted_label) {
                (true, Some(predicted)) => match segments.ground_truth_of(&row.segment_id) {
                    Some(truth) if scale.contains(truth) && scale.contains(predicted) => {
                        Some((truth, predicted))
                    }
                    Some(truth) => {
                        warn!(
                            "segment '{}' has out-of-scale labels (truth {}, predicted {}), excluding",
                            row.segment_id, truth, predicted
                        );
                        None
                    }
                    None => {
                        warn!(
                            "result references unknown segment '{}', excluding",
                            row.segment_id
                        );
                        None
                    }
                },
                _ => None,
            };

            match aligned {
                Some((truth, predicted)) => {
                    sample_count += 1;
                    abs_error_sum += (predicted - truth).abs() as f64;
                    confusion.record(truth, predicted);
                    match MatchQuality::of(scale, truth, predicted) {
                        MatchQuality::Hit => hits += 1,
                        MatchQuality::NearMiss => near_misses += 1,
                        MatchQuality::Miss => misses += 1,
                    }
                }
                None => skipped_count += 1,
            }
        }

        let total = sample_count + skipped_count;
        let mean_absolute_error = if sample_count > 0 {
            abs_error_sum / sample_count as f64
        } else {
            0.0
        };
        let accuracy_percent = if sample_count > 0 {
            100.0 * hits as f64 / sample_count as f64
        } else {
            0.0
        };
        let skipped_proportion = if total > 0 {
            skipped_count as f64 / total as f64
        } else {
            0.0
        };

        records.push(AnalysisRecord {
            modality,
            mean_absolute_error,
            accuracy_percent,
            sample_count,
            skipped_count,
            skipped_proportion,
            hits,
            near_misses,
            misses,
            confusion_matrix: confusion,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationRequest, Segment};

    fn segment(id: &str, truth: i64) -> Segment {
        Segment {
            segment_id: id.to_string(),
            start_ms: 0,
            end_ms: 10_000,
            transcript: Some("text".to_string()),
            ground_truth: truth,
            audio_features: None,
            audio_clip: None,
        }
    }

    fn ok_result(id: &str, modality: Modality, label: i64) -> ClassificationResult {
        let request = ClassificationRequest::new(
            id,
            modality,
            "instructions".to_string(),
            "payload".to_string(),
            None,
        );
        ClassificationResult::ok(&request, label, label.to_string(), 1)
    }

    fn error_result(id: &str, modality: Modality) -> ClassificationResult {
        let request = ClassificationRequest::new(
            id,
            modality,
            "instructions".to_string(),
            "payload".to_string(),
            None,
        );
        ClassificationResult::service_error(&request, 3)
    }

    fn scenario() -> (Vec<ClassificationResult>, SegmentSet) {
        // Truths [2, 4, 5] with predictions [3, 4, 3], plus a service error
        // on a fourth segment with truth 1
        let segments = SegmentSet::new(vec![
            segment("s1", 2),
            segment("s2", 4),
            segment("s3", 5),
            segment("s4", 1),
        ])
        .unwrap();
        let results = vec![
            ok_result("s1", Modality::Transcript, 3),
            ok_result("s2", Modality::Transcript, 4),
            ok_result("s3", Modality::Transcript, 3),
            error_result("s4", Modality::Transcript),
        ];
        (results, segments)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (results, segments) = scenario();
        let records = execute_evaluate(&results, &segments, EmpathyScale::default());

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.modality, Modality::Transcript);
        assert!((record.mean_absolute_error - 1.0).abs() < 1e-9);
        assert!((record.accuracy_percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(record.sample_count, 3);
        assert_eq!(record.skipped_count, 1);
        assert!((record.skipped_proportion - 0.25).abs() < 1e-9);
        assert_eq!(record.hits, 1);
        assert_eq!(record.confusion_matrix.get(2, 3), 1);
        assert_eq!(record.confusion_matrix.get(4, 4), 1);
        assert_eq!(record.confusion_matrix.get(5, 3), 1);
        assert_eq!(record.confusion_matrix.total(), 3);
    }

    #[test]
    fn test_determinism() {
        let (results, segments) = scenario();
        let scale = EmpathyScale::default();
        let first = execute_evaluate(&results, &segments, scale);
        let second = execute_evaluate(&results, &segments, scale);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.mean_absolute_error, b.mean_absolute_error);
            assert_eq!(a.accuracy_percent, b.accuracy_percent);
            assert_eq!(a.confusion_matrix, b.confusion_matrix);
        }
    }

    #[test]
    fn test_matrix_shape_independent_of_observed_labels() {
        let segments = SegmentSet::new(vec![segment("s1", 3)]).unwrap();
        let results = vec![ok_result("s1", Modality::RawAudio, 3)];
        let records = execute_evaluate(&results, &segments, EmpathyScale::default());

        let matrix = &records[0].confusion_matrix;
        assert_eq!(matrix.counts.len(), 5);
        assert!(matrix.counts.iter().all(|row| row.len() == 5));
        assert_eq!(matrix.total(), 1);
    }

    #[test]
    fn test_one_record_per_modality_in_canonical_order() {
        let segments = SegmentSet::new(vec![segment("s1", 3)]).unwrap();
        let results = vec![
            ok_result("s1", Modality::RawAudio, 3),
            ok_result("s1", Modality::Transcript, 2),
            ok_result("s1", Modality::Combined, 3),
        ];
        let records = execute_evaluate(&results, &segments, EmpathyScale::default());

        let modalities: Vec<Modality> = records.iter().map(|r| r.modality).collect();
        assert_eq!(
            modalities,
            vec![Modality::Transcript, Modality::Combined, Modality::RawAudio]
        );
    }

    #[test]
    fn test_unknown_segment_counts_as_skipped() {
        let segments = SegmentSet::new(vec![segment("known", 3)]).unwrap();
        let results = vec![
            ok_result("known", Modality::Transcript, 3),
            ok_result("phantom", Modality::Transcript, 4),
        ];
        let records = execute_evaluate(&results, &segments, EmpathyScale::default());

        assert_eq!(records[0].sample_count, 1);
        assert_eq!(records[0].skipped_count, 1);
    }

    #[test]
    fn test_all_failures_yield_zeroed_metrics() {
        let segments = SegmentSet::new(vec![segment("s1", 2)]).unwrap();
        let results = vec![error_result("s1", Modality::Combined)];
        let records = execute_evaluate(&results, &segments, EmpathyScale::default());

        let record = &records[0];
        assert_eq!(record.sample_count, 0);
        assert_eq!(record.skipped_count, 1);
        assert_eq!(record.mean_absolute_error, 0.0);
        assert_eq!(record.accuracy_percent, 0.0);
        assert_eq!(record.skipped_proportion, 1.0);
    }
}
