use serde::Serialize;

use crate::error::{StoreError, StoreResult};

pub const SUBJECT_COUNT: usize = 6;

pub const SUBJECTS: [&str; SUBJECT_COUNT] = [
    "Mathematics",
    "Physics",
    "Chemistry",
    "English",
    "Computer",
    "Biology",
];

pub const MARK_MIN: i32 = 0;
pub const MARK_MAX: i32 = 100;

/// Width of the on-disk name buffer, including the terminating NUL.
pub const NAME_CAPACITY: usize = 100;
pub const NAME_MAX_BYTES: usize = NAME_CAPACITY - 1;

/// Width of the on-disk grade buffer, including the terminating NUL.
pub const GRADE_CAPACITY: usize = 20;

pub type Marks = [i32; SUBJECT_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Grade {
    #[serde(rename = "Below Average")]
    BelowAverage,
    #[serde(rename = "Average")]
    Average,
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
    #[serde(rename = "Excellent")]
    Excellent,
}

impl Grade {
    pub const ALL: [Grade; 5] = [
        Grade::Excellent,
        Grade::VeryGood,
        Grade::Good,
        Grade::Average,
        Grade::BelowAverage,
    ];

    /// Classification scale shared by record derivation and statistics:
    /// <50 Below Average, 50-59 Average, 60-74 Good, 75-89 Very Good, >=90 Excellent.
    pub fn classify(percentage: f32) -> Grade {
        if percentage < 50.0 {
            Grade::BelowAverage
        } else if percentage < 60.0 {
            Grade::Average
        } else if percentage < 75.0 {
            Grade::Good
        } else if percentage < 90.0 {
            Grade::VeryGood
        } else {
            Grade::Excellent
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::BelowAverage => "Below Average",
            Grade::Average => "Average",
            Grade::Good => "Good",
            Grade::VeryGood => "Very Good",
            Grade::Excellent => "Excellent",
        }
    }

    pub fn from_label(label: &str) -> Option<Grade> {
        Grade::ALL.into_iter().find(|g| g.label() == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub roll: i32,
    pub name: String,
    pub marks: Marks,
    pub total: i32,
    pub percentage: f32,
    pub grade: Grade,
}

impl StudentRecord {
    /// Derived but unvalidated; `store::add` validates on insert.
    pub fn draft(roll: i32, name: impl Into<String>, marks: Marks) -> Self {
        let mut record = StudentRecord {
            roll,
            name: name.into(),
            marks,
            total: 0,
            percentage: 0.0,
            grade: Grade::BelowAverage,
        };
        record.compute_derived();
        record
    }

    /// Recomputes `total`, `percentage` and `grade` from `marks`.
    /// Must run after every change to `marks` and before the record is saved.
    pub fn compute_derived(&mut self) {
        self.total = self
            .marks
            .iter()
            .fold(0i32, |acc, m| acc.saturating_add(*m));
        self.percentage = percentage_of(self.total);
        self.grade = Grade::classify(self.percentage);
    }

    /// Checks the caller-supplied fields: name width and mark ranges.
    pub fn validate(&self) -> StoreResult<()> {
        validate_name(&self.name)?;
        validate_marks(&self.marks)
    }

    pub fn is_derived_consistent(&self) -> bool {
        let mut fresh = self.clone();
        fresh.compute_derived();
        fresh.total == self.total
            && fresh.percentage.to_bits() == self.percentage.to_bits()
            && fresh.grade == self.grade
    }
}

/// Single-precision percentage of a total out of `SUBJECT_COUNT * 100`.
pub fn percentage_of(total: i32) -> f32 {
    (total as f32 / (SUBJECT_COUNT as f32 * 100.0)) * 100.0
}

pub fn validate_mark(subject: usize, value: i32) -> StoreResult<()> {
    if !(MARK_MIN..=MARK_MAX).contains(&value) {
        let subject_name = SUBJECTS.get(subject).copied().unwrap_or("subject");
        return Err(StoreError::invalid(format!(
            "{} mark must be between {} and {}, got {}",
            subject_name, MARK_MIN, MARK_MAX, value
        )));
    }
    Ok(())
}

pub fn validate_marks(marks: &Marks) -> StoreResult<()> {
    for (i, m) in marks.iter().enumerate() {
        validate_mark(i, *m)?;
    }
    Ok(())
}

pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.len() > NAME_MAX_BYTES {
        return Err(StoreError::invalid(format!(
            "name is {} bytes; at most {} fit in a record",
            name.len(),
            NAME_MAX_BYTES
        )));
    }
    if name.contains('\0') {
        return Err(StoreError::invalid("name must not contain NUL"));
    }
    Ok(())
}

/// Converts a 1-based subject number into an index into `marks`.
pub fn subject_index(subject: i64) -> StoreResult<usize> {
    if subject < 1 || subject > SUBJECT_COUNT as i64 {
        return Err(StoreError::invalid(format!(
            "subject number must be between 1 and {}, got {}",
            SUBJECT_COUNT, subject
        )));
    }
    Ok((subject - 1) as usize)
}
