use serde::{Deserialize, Serialize};

use crate::enrollment::RowFailure;
use crate::ids::{EnrollmentId, NotificationId, SemesterId, StudentId};

/// Where a student lands after the end-of-year evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProgressionOutcome {
    Promoted { year: u8, semester: u8 },
    Graduated,
    NotPromoted,
}

impl ProgressionOutcome {
    pub fn label(self) -> &'static str {
        match self {
            ProgressionOutcome::Promoted { .. } => "promoted",
            ProgressionOutcome::Graduated => "graduated",
            ProgressionOutcome::NotPromoted => "not_promoted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressionRequest {
    pub student: StudentId,
    /// Any semester of the academic year being closed.
    pub semester: SemesterId,
    /// Enroll a promoted student into the curriculum of their new year and semester
    /// in this semester.
    #[serde(default)]
    pub auto_enroll_into: Option<SemesterId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionReport {
    pub student: StudentId,
    pub outcome: ProgressionOutcome,
    pub failed_units: u32,
    pub fees_cleared: bool,
    pub reasons: Vec<String>,
    pub repeat_enrollments: Vec<EnrollmentId>,
    pub auto_enrolled: Vec<EnrollmentId>,
    pub auto_enroll_failures: Vec<RowFailure>,
    pub notification: NotificationId,
}

/// Reasons a student was held back, in the order they are reported.
pub(crate) fn hold_back_reasons(
    failed_units: u32,
    max_failed_units: u32,
    fees_cleared: bool,
) -> Vec<String> {
    let mut reasons = Vec::new();
    if failed_units > max_failed_units {
        reasons.push(format!("{failed_units} failed units"));
    }
    if !fees_cleared {
        reasons.push("outstanding fees".to_string());
    }
    reasons
}

/// Title and body of the notification written for each outcome.
pub(crate) fn outcome_message(
    outcome: ProgressionOutcome,
    closed_year: u8,
    failed_units: u32,
    max_failed_units: u32,
    reasons: &[String],
) -> (String, String) {
    match outcome {
        ProgressionOutcome::Promoted { year, semester } => {
            let mut message = format!(
                "Congratulations! You have been promoted to Year {year}, Semester {semester}."
            );
            if failed_units > 0 {
                message.push_str(&format!(
                    " Note: You had {failed_units} failed unit(s) but can proceed with supplementary exams."
                ));
            }
            (format!("Promoted to Year {year}"), message)
        }
        ProgressionOutcome::Graduated => (
            "Graduation Eligibility".to_string(),
            "Congratulations! You have completed all requirements and are eligible for \
             graduation. Please contact the registry for graduation procedures."
                .to_string(),
        ),
        ProgressionOutcome::NotPromoted => {
            let mut message = format!(
                "You have not been promoted due to: {}.",
                reasons.join(", ")
            );
            if failed_units > max_failed_units {
                message.push_str(&format!(
                    " You have {failed_units} failed units (maximum allowed: {max_failed_units})."
                ));
            }
            message.push_str(" Please contact the academic office for guidance.");
            (
                format!("Academic Progression Update - Year {closed_year}"),
                message,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_list_failed_units_before_fees() {
        assert_eq!(
            hold_back_reasons(3, 2, false),
            vec!["3 failed units".to_string(), "outstanding fees".to_string()]
        );
        assert!(hold_back_reasons(2, 2, true).is_empty());
    }

    #[test]
    fn promotion_message_mentions_supplementaries_for_failed_units() {
        let (title, message) =
            outcome_message(ProgressionOutcome::Promoted { year: 2, semester: 1 }, 1, 1, 2, &[]);
        assert_eq!(title, "Promoted to Year 2");
        assert!(message.contains("supplementary exams"));
    }

    #[test]
    fn hold_back_message_names_the_limit() {
        let reasons = hold_back_reasons(4, 2, true);
        let (title, message) =
            outcome_message(ProgressionOutcome::NotPromoted, 1, 4, 2, &reasons);
        assert_eq!(title, "Academic Progression Update - Year 1");
        assert!(message.contains("4 failed units (maximum allowed: 2)"));
    }
}
