use serde::{Deserialize, Serialize};

use crate::error::RateError;

/// The fixed ordinal scale ground truth and predictions are drawn from.
///
/// Both bounds are inclusive. The scale drives the prompt wording, the
/// range check in the response parser, and the confusion matrix shape, so a
/// run is comparable end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmpathyScale {
    pub min: i64,
    pub max: i64,
}

impl Default for EmpathyScale {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

impl EmpathyScale {
    pub fn new(min: i64, max: i64) -> Result<Self, RateError> {
        if min >= max {
            return Err(RateError::Configuration(format!(
                "invalid empathy scale: min {} must be below max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, label: i64) -> bool {
        label >= self.min && label <= self.max
    }

    /// Number of distinct labels on the scale.
    pub fn label_count(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    /// Labels in ascending order.
    pub fn labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.min..=self.max
    }

    /// Zero-based position of a label on the scale, if in range.
    pub fn index_of(&self, label: i64) -> Option<usize> {
        self.contains(label).then(|| (label - self.min) as usize)
    }

    /// Largest |predicted - truth| distance still counted as a near-miss.
    ///
    /// Half the scale span, so on 1-5 a neutral/extreme confusion (distance 2)
    /// is a near-miss while an extreme/extreme confusion (distance 4) is a miss.
    pub fn near_miss_span(&self) -> i64 {
        (self.max - self.min) / 2
    }
}
