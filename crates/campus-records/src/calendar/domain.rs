use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ids::{AcademicYearId, SemesterId};
use crate::records_error::{Conflict, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, ordered};

pub const SEEDED_SEMESTER_DAYS: i64 = 100;
pub const SEEDED_SEMESTER_GAP_DAYS: i64 = 7;
pub const REGISTRATION_MARGIN_DAYS: i64 = 14;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAcademicYear {
    /// `YYYY/YYYY` with consecutive years, e.g. `2024/2025`.
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewAcademicYear {
    pub fn validate(&self) -> Result<(), Violation> {
        parse_label(&self.label)?;
        ordered("start_date", self.start_date, "end_date", self.end_date)?;
        Ok(())
    }

    /// September 1st of `start_year` through August 31st of the following year.
    pub fn standard(start_year: i32) -> Option<Self> {
        let end_year = start_year.checked_add(1)?;
        Some(Self {
            label: format!("{start_year}/{end_year}"),
            start_date: NaiveDate::from_ymd_opt(start_year, 9, 1)?,
            end_date: NaiveDate::from_ymd_opt(end_year, 8, 31)?,
        })
    }
}

/// Start year of a `YYYY/YYYY` label.
pub fn parse_label(label: &str) -> Result<i32, Violation> {
    let invalid = || Violation::InvalidFormat {
        field: "academic_year",
        value: label.to_string(),
    };

    let (first, second) = label.split_once('/').ok_or_else(invalid)?;
    if first.len() != 4 || second.len() != 4 {
        return Err(invalid());
    }
    let first: i32 = first.parse().map_err(|_| invalid())?;
    let second: i32 = second.parse().map_err(|_| invalid())?;
    if second != first + 1 {
        return Err(invalid());
    }
    Ok(first)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: AcademicYearId,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

impl AcademicYear {
    pub fn start_year(&self) -> i32 {
        parse_label(&self.label).unwrap_or_else(|_| chrono::Datelike::year(&self.start_date))
    }

    /// Two-digit start year used by bed numbers and fee receipts.
    pub fn short_year(&self) -> String {
        format!("{:02}", self.start_year().rem_euclid(100))
    }
}

impl Constrained for AcademicYear {
    const ENTITY: &'static str = "academic_year";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(Conflict::DuplicateAcademicYear, &self.label)]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSemester {
    pub academic_year: AcademicYearId,
    pub number: u8,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub registration_start: NaiveDate,
    pub registration_end: NaiveDate,
}

impl NewSemester {
    pub fn validate(&self) -> Result<(), Violation> {
        in_range("semester_number", self.number, 1, 3)?;
        ordered("start_date", self.start_date, "end_date", self.end_date)?;
        ordered(
            "registration_start_date",
            self.registration_start,
            "registration_end_date",
            self.registration_end,
        )?;
        Ok(())
    }

    /// Seeded layout: semesters of 100 days separated by 7-day breaks, with
    /// registration open two weeks either side of the start.
    pub fn seeded(academic_year: AcademicYearId, year_start: NaiveDate, number: u8) -> Self {
        let offset = i64::from(number.saturating_sub(1))
            * (SEEDED_SEMESTER_DAYS + SEEDED_SEMESTER_GAP_DAYS);
        let start_date = year_start + Duration::days(offset);
        Self {
            academic_year,
            number,
            start_date,
            end_date: start_date + Duration::days(SEEDED_SEMESTER_DAYS),
            registration_start: start_date - Duration::days(REGISTRATION_MARGIN_DAYS),
            registration_end: start_date + Duration::days(REGISTRATION_MARGIN_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: SemesterId,
    pub academic_year: AcademicYearId,
    pub number: u8,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub registration_start: NaiveDate,
    pub registration_end: NaiveDate,
    pub is_current: bool,
}

impl Semester {
    pub fn registration_open_on(&self, day: NaiveDate) -> bool {
        self.registration_start <= day && day <= self.registration_end
    }
}

impl Constrained for Semester {
    const ENTITY: &'static str = "semester";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateSemester,
            format!("{}:{}", self.academic_year, self.number),
        )]
    }
}

/// Outcome of the academic year seeding batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}
