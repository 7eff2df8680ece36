use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::derivation::{Derived, GradeLetter, Marks};
use crate::ids::{EnrollmentId, UserId};

/// Grade attached to one enrollment: the raw marks plus the columns derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub marks: Marks,
    pub total_marks: Option<Decimal>,
    pub letter: Option<GradeLetter>,
    pub grade_points: Option<Decimal>,
    pub quality_points: Option<Decimal>,
    pub is_passed: bool,
    pub exam_date: Option<NaiveDate>,
    pub remarks: String,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

impl Grade {
    pub fn new(
        marks: Marks,
        derived: Derived,
        exam_date: Option<NaiveDate>,
        remarks: String,
        recorded_by: UserId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            marks,
            total_marks: derived.total_marks,
            letter: derived.letter,
            grade_points: derived.grade_points,
            quality_points: derived.quality_points,
            is_passed: derived.is_passed,
            exam_date,
            remarks,
            recorded_by,
            recorded_at,
        }
    }

    pub fn derived(&self) -> Derived {
        Derived {
            total_marks: self.total_marks,
            letter: self.letter,
            grade_points: self.grade_points,
            quality_points: self.quality_points,
            is_passed: self.is_passed,
        }
    }

    /// Failed unit for progression: below the pass mark with a derived failing letter.
    pub fn is_failed_unit(&self) -> bool {
        !self.is_passed && self.letter.is_some_and(GradeLetter::is_failing)
    }
}

/// Input for `record_grade`. Missing marks stay empty; derivation waits for CAT and final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeEntry {
    pub enrollment: EnrollmentId,
    #[serde(default)]
    pub cat: Option<Decimal>,
    #[serde(default, rename = "final")]
    pub final_exam: Option<Decimal>,
    #[serde(default)]
    pub practical: Option<Decimal>,
    #[serde(default)]
    pub project: Option<Decimal>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
}

impl GradeEntry {
    pub fn marks(&self) -> Marks {
        Marks {
            cat: self.cat,
            final_exam: self.final_exam,
            practical: self.practical,
            project: self.project,
        }
    }
}

/// Administrative letter for an enrollment (I, W, P, NP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeOverride {
    pub enrollment: EnrollmentId,
    pub letter: GradeLetter,
    pub passed: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}
