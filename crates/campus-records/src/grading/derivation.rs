//! Pure mark-to-grade derivation. Storage keeps raw and derived fields side by side,
//! but the derivation only lives here.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::records_error::Violation;
use crate::validation::in_range;

pub const PASS_MARK: Decimal = dec!(45);
pub const CAT_WEIGHT: Decimal = dec!(0.4);
pub const FINAL_WEIGHT: Decimal = dec!(0.6);
pub const PRACTICAL_WEIGHT: Decimal = dec!(0.1);
pub const PROJECT_WEIGHT: Decimal = dec!(0.1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLetter {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "I")]
    Incomplete,
    #[serde(rename = "W")]
    Withdrawn,
    #[serde(rename = "P")]
    Pass,
    #[serde(rename = "NP")]
    NoPass,
}

/// Lower bound (inclusive), letter and grade points, highest band first.
const GRADE_BANDS: [(Decimal, GradeLetter, Decimal); 12] = [
    (dec!(90), GradeLetter::APlus, dec!(4.0)),
    (dec!(80), GradeLetter::A, dec!(4.0)),
    (dec!(75), GradeLetter::AMinus, dec!(3.7)),
    (dec!(70), GradeLetter::BPlus, dec!(3.3)),
    (dec!(65), GradeLetter::B, dec!(3.0)),
    (dec!(60), GradeLetter::BMinus, dec!(2.7)),
    (dec!(55), GradeLetter::CPlus, dec!(2.3)),
    (dec!(50), GradeLetter::C, dec!(2.0)),
    (dec!(45), GradeLetter::CMinus, dec!(1.7)),
    (dec!(40), GradeLetter::DPlus, dec!(1.3)),
    (dec!(35), GradeLetter::D, dec!(1.0)),
    (Decimal::ZERO, GradeLetter::F, dec!(0.0)),
];

impl GradeLetter {
    pub fn as_str(self) -> &'static str {
        match self {
            GradeLetter::APlus => "A+",
            GradeLetter::A => "A",
            GradeLetter::AMinus => "A-",
            GradeLetter::BPlus => "B+",
            GradeLetter::B => "B",
            GradeLetter::BMinus => "B-",
            GradeLetter::CPlus => "C+",
            GradeLetter::C => "C",
            GradeLetter::CMinus => "C-",
            GradeLetter::DPlus => "D+",
            GradeLetter::D => "D",
            GradeLetter::F => "F",
            GradeLetter::Incomplete => "I",
            GradeLetter::Withdrawn => "W",
            GradeLetter::Pass => "P",
            GradeLetter::NoPass => "NP",
        }
    }

    /// Letters produced by the marks table, as opposed to administrative overrides.
    pub fn is_derived(self) -> bool {
        !matches!(
            self,
            GradeLetter::Incomplete | GradeLetter::Withdrawn | GradeLetter::Pass | GradeLetter::NoPass
        )
    }

    /// Derived letters below the pass mark; these count as failed units at promotion.
    pub fn is_failing(self) -> bool {
        matches!(self, GradeLetter::DPlus | GradeLetter::D | GradeLetter::F)
    }

    /// Letters a withdrawal leaves attached to the enrollment.
    pub fn survives_withdrawal(self) -> bool {
        matches!(self, GradeLetter::Incomplete | GradeLetter::Withdrawn)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let letter = match raw.trim().to_ascii_uppercase().as_str() {
            "A+" => GradeLetter::APlus,
            "A" => GradeLetter::A,
            "A-" => GradeLetter::AMinus,
            "B+" => GradeLetter::BPlus,
            "B" => GradeLetter::B,
            "B-" => GradeLetter::BMinus,
            "C+" => GradeLetter::CPlus,
            "C" => GradeLetter::C,
            "C-" => GradeLetter::CMinus,
            "D+" => GradeLetter::DPlus,
            "D" => GradeLetter::D,
            "F" => GradeLetter::F,
            "I" => GradeLetter::Incomplete,
            "W" => GradeLetter::Withdrawn,
            "P" => GradeLetter::Pass,
            "NP" => GradeLetter::NoPass,
            _ => return None,
        };
        Some(letter)
    }
}

impl fmt::Display for GradeLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw assessment marks, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marks {
    pub cat: Option<Decimal>,
    pub final_exam: Option<Decimal>,
    pub practical: Option<Decimal>,
    pub project: Option<Decimal>,
}

impl Marks {
    pub fn validate(&self) -> Result<(), Violation> {
        let fields = [
            ("cat", self.cat),
            ("final_exam", self.final_exam),
            ("practical", self.practical),
            ("project", self.project),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                in_range(field, value, Decimal::ZERO, dec!(100))?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cat.is_none()
            && self.final_exam.is_none()
            && self.practical.is_none()
            && self.project.is_none()
    }

    /// Weighted total, clamped to [0, 100] and left unrounded so the band and pass mark
    /// see the exact sum. Absent until both CAT and final are in. Practical and project
    /// weights stack on top of the CAT/final split, so a full set of marks can exceed
    /// 100 before clamping.
    pub fn total(&self) -> Option<Decimal> {
        let (cat, final_exam) = (self.cat?, self.final_exam?);
        let mut total = cat * CAT_WEIGHT + final_exam * FINAL_WEIGHT;
        if let Some(practical) = self.practical {
            total += practical * PRACTICAL_WEIGHT;
        }
        if let Some(project) = self.project {
            total += project * PROJECT_WEIGHT;
        }
        Some(total.clamp(Decimal::ZERO, dec!(100)).normalize())
    }
}

/// Derived columns of a grade row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derived {
    pub total_marks: Option<Decimal>,
    pub letter: Option<GradeLetter>,
    pub grade_points: Option<Decimal>,
    pub quality_points: Option<Decimal>,
    pub is_passed: bool,
}

/// Letter and points for a total mark.
pub fn band_for(total: Decimal) -> (GradeLetter, Decimal) {
    GRADE_BANDS
        .iter()
        .find(|(floor, _, _)| total >= *floor)
        .map(|(_, letter, points)| (*letter, *points))
        .unwrap_or((GradeLetter::F, Decimal::ZERO))
}

pub fn derive(marks: &Marks, credit_hours: u8) -> Derived {
    match marks.total() {
        Some(total) => {
            let (letter, points) = band_for(total);
            Derived {
                total_marks: Some(total),
                letter: Some(letter),
                grade_points: Some(points),
                quality_points: Some(round2(points * Decimal::from(credit_hours))),
                is_passed: total >= PASS_MARK,
            }
        }
        None => Derived {
            total_marks: None,
            letter: None,
            grade_points: None,
            quality_points: None,
            is_passed: false,
        },
    }
}

/// Administrative letter (I, W, P, NP). Carries no points and stays out of GPA.
pub fn derive_override(
    marks: &Marks,
    letter: GradeLetter,
    passed: bool,
) -> Result<Derived, Violation> {
    if letter.is_derived() {
        return Err(Violation::DerivedLetterOverride(letter.as_str()));
    }
    Ok(Derived {
        total_marks: marks.total(),
        letter: Some(letter),
        grade_points: None,
        quality_points: None,
        is_passed: passed,
    })
}

pub(crate) fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(cat: Decimal, final_exam: Decimal) -> Marks {
        Marks {
            cat: Some(cat),
            final_exam: Some(final_exam),
            ..Marks::default()
        }
    }

    #[test]
    fn weighted_total_lands_on_the_pass_boundary() {
        let derived = derive(&marks(dec!(30), dec!(55)), 3);
        assert_eq!(derived.total_marks, Some(dec!(45)));
        assert_eq!(derived.letter, Some(GradeLetter::CMinus));
        assert_eq!(derived.grade_points, Some(dec!(1.7)));
        assert_eq!(derived.quality_points, Some(dec!(5.1)));
        assert!(derived.is_passed);
    }

    #[test]
    fn practical_and_project_stack_and_the_total_is_clamped() {
        let full = Marks {
            cat: Some(dec!(100)),
            final_exam: Some(dec!(100)),
            practical: Some(dec!(100)),
            project: Some(dec!(100)),
        };
        assert_eq!(full.total(), Some(dec!(100)));
        assert_eq!(derive(&full, 4).letter, Some(GradeLetter::APlus));
    }

    #[test]
    fn every_band_agrees_with_the_pass_threshold() {
        for (floor, letter, points) in GRADE_BANDS {
            let derived = derive(&marks(floor, floor), 2);
            assert_eq!(derived.letter, Some(letter), "floor {floor}");
            assert_eq!(derived.grade_points, Some(points));
            assert_eq!(derived.is_passed, !letter.is_failing());
            assert_eq!(derived.quality_points, Some(points * dec!(2)));
        }
    }

    #[test]
    fn just_below_a_boundary_drops_a_band() {
        let derived = derive(&marks(dec!(44.99), dec!(44.99)), 3);
        assert_eq!(derived.letter, Some(GradeLetter::DPlus));
        assert!(!derived.is_passed);
    }

    #[test]
    fn a_third_decimal_below_the_pass_mark_is_not_rounded_up() {
        let derived = derive(&marks(dec!(44.99), dec!(45)), 3);
        assert_eq!(derived.total_marks, Some(dec!(44.996)));
        assert_eq!(derived.letter, Some(GradeLetter::DPlus));
        assert_eq!(derived.grade_points, Some(dec!(1.3)));
        assert!(!derived.is_passed);
    }

    #[test]
    fn incomplete_marks_derive_nothing() {
        let partial = Marks {
            cat: Some(dec!(20)),
            ..Marks::default()
        };
        let derived = derive(&partial, 3);
        assert_eq!(derived.letter, None);
        assert!(!derived.is_passed);
    }

    #[test]
    fn overrides_only_accept_administrative_letters() {
        let derived = derive_override(&Marks::default(), GradeLetter::Pass, true).expect("P");
        assert_eq!(derived.grade_points, None);
        assert!(derived.is_passed);

        assert_eq!(
            derive_override(&Marks::default(), GradeLetter::A, true),
            Err(Violation::DerivedLetterOverride("A"))
        );
    }

    #[test]
    fn derivation_is_stable_for_unchanged_inputs() {
        let input = marks(dec!(62.5), dec!(71.25));
        assert_eq!(derive(&input, 3), derive(&input, 3));
    }
}
