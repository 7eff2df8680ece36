use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::CurriculumSlot;
use super::service::{upsert_curriculum_row, DirectoryService};
use crate::events::EventPublisher;
use crate::ids::{Actor, CourseId, ProgrammeId};
use crate::records_error::{RecordsError, Violation};
use crate::store::{Database, Tables};

/// A (programme, year, semester) slot the allocator could not fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnfilledSlot {
    pub programme: String,
    pub year: u8,
    pub semester: u8,
    pub available: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub allocated: usize,
    pub already_filled: usize,
    pub unfilled: Vec<UnfilledSlot>,
}

impl<D, E> DirectoryService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    /// Fill every (year, semester) of each active programme with `per_semester`
    /// mandatory courses, taken from the active pool in course-code order. A course is
    /// used at most once per programme; slots that already hold enough courses are left
    /// alone, so re-running the batch is harmless.
    pub fn allocate_curriculum(
        &self,
        actor: Actor,
        per_semester: usize,
    ) -> Result<AllocationReport, RecordsError> {
        if per_semester == 0 {
            return Err(Violation::out_of_range("per_semester", 1, usize::MAX, 0).into());
        }

        let report = self.context().commit(|tables, _| {
            let mut pool: Vec<(String, CourseId)> = tables
                .courses
                .filter(|course| course.is_active)
                .map(|course| (course.code.clone(), course.id))
                .collect();
            pool.sort();

            let mut programmes: Vec<(String, ProgrammeId, u8, u8)> = tables
                .programmes
                .filter(|programme| programme.is_active)
                .map(|programme| {
                    (
                        programme.code.clone(),
                        programme.id,
                        programme.duration_years,
                        programme.semesters_per_year,
                    )
                })
                .collect();
            programmes.sort();

            let mut report = AllocationReport::default();
            for (code, programme, years, semesters) in programmes {
                allocate_programme(
                    tables,
                    &pool,
                    (code.as_str(), programme),
                    (years, semesters),
                    per_semester,
                    &mut report,
                )?;
            }
            Ok(report)
        })?;

        for slot in &report.unfilled {
            warn!(
                programme = %slot.programme,
                year = slot.year,
                semester = slot.semester,
                available = slot.available,
                "not enough unused courses to fill curriculum slot"
            );
        }
        info!(
            allocated = report.allocated,
            already_filled = report.already_filled,
            %actor,
            "curriculum allocation finished"
        );
        Ok(report)
    }
}

fn allocate_programme(
    tables: &mut Tables,
    pool: &[(String, CourseId)],
    (code, programme): (&str, ProgrammeId),
    (years, semesters): (u8, u8),
    per_semester: usize,
    report: &mut AllocationReport,
) -> Result<(), RecordsError> {
    let mut used: BTreeSet<CourseId> = tables
        .curriculum
        .filter(|row| row.programme == programme)
        .map(|row| row.course)
        .collect();

    for year in 1..=years {
        for semester in 1..=semesters {
            let placed = tables
                .curriculum
                .filter(|row| {
                    row.programme == programme
                        && row.year == year
                        && row.semester == semester
                        && row.is_active
                })
                .count();
            if placed >= per_semester {
                report.already_filled += 1;
                continue;
            }

            let wanted = per_semester - placed;
            let available: Vec<CourseId> = pool
                .iter()
                .map(|(_, course)| *course)
                .filter(|course| !used.contains(course))
                .collect();
            if available.len() < wanted {
                report.unfilled.push(UnfilledSlot {
                    programme: code.to_string(),
                    year,
                    semester,
                    available: available.len(),
                });
                continue;
            }

            for course in available.into_iter().take(wanted) {
                upsert_curriculum_row(
                    tables,
                    CurriculumSlot {
                        programme,
                        course,
                        year,
                        semester,
                        is_mandatory: true,
                    },
                )?;
                used.insert(course);
                report.allocated += 1;
            }
        }
    }

    Ok(())
}
