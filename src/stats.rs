use serde::Serialize;

use crate::record::{Grade, StudentRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCounts {
    pub excellent: usize,
    pub very_good: usize,
    pub good: usize,
    pub average: usize,
    pub below_average: usize,
}

impl GradeCounts {
    fn bump(&mut self, grade: Grade) {
        match grade {
            Grade::Excellent => self.excellent += 1,
            Grade::VeryGood => self.very_good += 1,
            Grade::Good => self.good += 1,
            Grade::Average => self.average += 1,
            Grade::BelowAverage => self.below_average += 1,
        }
    }

    pub fn get(&self, grade: Grade) -> usize {
        match grade {
            Grade::Excellent => self.excellent,
            Grade::VeryGood => self.very_good,
            Grade::Good => self.good,
            Grade::Average => self.average,
            Grade::BelowAverage => self.below_average,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_students: usize,
    pub counts: GradeCounts,
    pub top: Option<StudentRecord>,
    pub lowest: Option<StudentRecord>,
}

/// One pass over the dataset. Buckets come from the stored percentage, not
/// the stored grade label; the first record wins ties for top and lowest.
pub fn compute_stats(records: &[StudentRecord]) -> PerformanceStats {
    let mut counts = GradeCounts::default();
    let mut top: Option<&StudentRecord> = None;
    let mut lowest: Option<&StudentRecord> = None;

    for r in records {
        counts.bump(Grade::classify(r.percentage));

        if top.map_or(true, |t| r.percentage > t.percentage) {
            top = Some(r);
        }
        if lowest.map_or(true, |l| r.percentage < l.percentage) {
            lowest = Some(r);
        }
    }

    PerformanceStats {
        total_students: records.len(),
        counts,
        top: top.cloned(),
        lowest: lowest.cloned(),
    }
}
