use serde::{Deserialize, Serialize};

use crate::models::{EmpathyScale, Modality};

/// Label-range x label-range grid of (ground truth, predicted) counts.
///
/// Always the full scale shape, including all-zero rows and columns, so
/// matrices are comparable across runs and modalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub scale: EmpathyScale,
    /// counts[truth_index][predicted_index]
    pub counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(scale: EmpathyScale) -> Self {
        let n = scale.label_count();
        Self {
            scale,
            counts: vec![vec![0; n]; n],
        }
    }

    /// Record one (truth, predicted) observation. Out-of-scale labels are
    /// rejected so the grid shape is invariant.
    pub fn record(&mut self, truth: i64, predicted: i64) -> bool {
        match (self.scale.index_of(truth), self.scale.index_of(predicted)) {
            (Some(t), Some(p)) => {
                self.counts[t][p] += 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, truth: i64, predicted: i64) -> u64 {
        match (self.scale.index_of(truth), self.scale.index_of(predicted)) {
            (Some(t), Some(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

/// How far a prediction landed from the ground truth.
///
/// Mirrors the hit / near-miss / miss buckets of the original study: an exact
/// match is a hit, confusing an extreme with neutral is a near-miss, and
/// confusing the two extremes is a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Hit,
    NearMiss,
    Miss,
}

impl MatchQuality {
    pub fn of(scale: EmpathyScale, truth: i64, predicted: i64) -> Self {
        let distance = (predicted - truth).abs();
        if distance == 0 {
            MatchQuality::Hit
        } else if distance <= scale.near_miss_span() {
            MatchQuality::NearMiss
        } else {
            MatchQuality::Miss
        }
    }
}

/// Per-modality evaluation statistics, derived wholesale from the result
/// table and ground truth on each evaluator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub modality: Modality,
    /// Mean of |predicted - truth| over OK results.
    pub mean_absolute_error: f64,
    /// Percentage of OK results matching ground truth exactly.
    pub accuracy_percent: f64,
    /// OK results with aligned ground truth.
    pub sample_count: usize,
    /// Results excluded from the metrics (errors, skips, unknown segments).
    pub skipped_count: usize,
    /// skipped_count / (sample_count + skipped_count).
    pub skipped_proportion: f64,
    pub hits: usize,
    pub near_misses: usize,
    pub misses: usize,
    pub confusion_matrix: ConfusionMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_shape_is_constant() {
        let matrix = ConfusionMatrix::new(EmpathyScale::default());
        assert_eq!(matrix.counts.len(), 5);
        assert!(matrix.counts.iter().all(|row| row.len() == 5));
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn test_record_and_get() {
        let mut matrix = ConfusionMatrix::new(EmpathyScale::default());
        assert!(matrix.record(2, 3));
        assert!(matrix.record(2, 3));
        assert!(matrix.record(5, 1));
        assert_eq!(matrix.get(2, 3), 2);
        assert_eq!(matrix.get(5, 1), 1);
        assert_eq!(matrix.get(1, 1), 0);
        assert_eq!(matrix.total(), 3);
    }

    #[test]
    fn test_out_of_scale_rejected() {
        let mut matrix = ConfusionMatrix::new(EmpathyScale::default());
        assert!(!matrix.record(0, 3));
        assert!(!matrix.record(2, 9));
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn test_match_quality_buckets() {
        let scale = EmpathyScale::default();
        assert_eq!(MatchQuality::of(scale, 3, 3), MatchQuality::Hit);
        assert_eq!(MatchQuality::of(scale, 3, 5), MatchQuality::NearMiss);
        assert_eq!(MatchQuality::of(scale, 4, 5), MatchQuality::NearMiss);
        assert_eq!(MatchQuality::of(scale, 1, 5), MatchQuality::Miss);
        assert_eq!(MatchQuality::of(scale, 5, 1), MatchQuality::Miss);
    }
}
