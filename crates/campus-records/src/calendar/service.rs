use chrono::NaiveDate;
use tracing::{debug, info};

use super::domain::{AcademicYear, NewAcademicYear, NewSemester, SeedReport, Semester};
use crate::context::CoreContext;
use crate::events::EventPublisher;
use crate::ids::{AcademicYearId, Actor, SemesterId};
use crate::records_error::{RecordsError, Violation};
use crate::store::{Database, Tables};

/// Academic years, semesters and the calendar cursor.
pub struct CalendarService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> CalendarService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn create_academic_year(
        &self,
        actor: Actor,
        new: NewAcademicYear,
    ) -> Result<AcademicYear, RecordsError> {
        new.validate()?;
        let year = self
            .ctx
            .commit(|tables, _| insert_academic_year(tables, new))?;
        info!(academic_year = %year.id, label = %year.label, %actor, "academic year created");
        Ok(year)
    }

    pub fn create_semester(
        &self,
        actor: Actor,
        new: NewSemester,
    ) -> Result<Semester, RecordsError> {
        new.validate()?;
        let semester = self.ctx.commit(|tables, _| insert_semester(tables, new))?;
        info!(
            semester = %semester.id,
            academic_year = %semester.academic_year,
            number = semester.number,
            %actor,
            "semester created"
        );
        Ok(semester)
    }

    /// Point the cursor at `year`; the previous current year is cleared in the same unit.
    pub fn set_current_year(
        &self,
        actor: Actor,
        year: AcademicYearId,
    ) -> Result<AcademicYear, RecordsError> {
        let previous = self.ctx.commit(|tables, _| {
            tables.academic_years.fetch(year)?;
            let previous = tables.cursor.current_year.replace(year);
            project_current_year(tables)?;
            Ok(previous)
        })?;

        info!(academic_year = %year, previous = ?previous, %actor, "current academic year set");
        self.academic_year(year)
    }

    pub fn set_current_semester(
        &self,
        actor: Actor,
        semester: SemesterId,
    ) -> Result<Semester, RecordsError> {
        let previous = self.ctx.commit(|tables, _| {
            tables.semesters.fetch(semester)?;
            let previous = tables.cursor.current_semester.replace(semester);
            project_current_semester(tables)?;
            Ok(previous)
        })?;

        info!(%semester, previous = ?previous, %actor, "current semester set");
        self.semester(semester)
    }

    pub fn academic_year(&self, year: AcademicYearId) -> Result<AcademicYear, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.academic_years.fetch(year)?.clone()))
    }

    pub fn semester(&self, semester: SemesterId) -> Result<Semester, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.semesters.fetch(semester)?.clone()))
    }

    pub fn academic_year_by_label(&self, label: &str) -> Result<AcademicYear, RecordsError> {
        self.ctx.lookup(|tables| {
            tables
                .academic_years
                .find(|year| year.label == label)
                .cloned()
                .ok_or_else(|| RecordsError::not_found("academic_year", label))
        })
    }

    pub fn current_year(&self) -> Result<Option<AcademicYear>, RecordsError> {
        self.ctx.query(|tables| {
            tables
                .cursor
                .current_year
                .and_then(|id| tables.academic_years.get(id))
                .cloned()
        })
    }

    pub fn current_semester(&self) -> Result<Option<Semester>, RecordsError> {
        self.ctx.query(|tables| {
            tables
                .cursor
                .current_semester
                .and_then(|id| tables.semesters.get(id))
                .cloned()
        })
    }

    pub fn semesters_of(&self, year: AcademicYearId) -> Result<Vec<Semester>, RecordsError> {
        debug!(academic_year = %year, "listing semesters");
        self.ctx.lookup(|tables| {
            tables.academic_years.fetch(year)?;
            let mut semesters: Vec<Semester> = tables
                .semesters
                .filter(|semester| semester.academic_year == year)
                .cloned()
                .collect();
            semesters.sort_by_key(|semester| semester.number);
            Ok(semesters)
        })
    }

    /// Create `count` standard academic years starting at `first_start_year`, each with
    /// three seeded semesters. Years whose label already exists are skipped untouched.
    pub fn seed_academic_years(
        &self,
        actor: Actor,
        first_start_year: i32,
        count: u16,
    ) -> Result<SeedReport, RecordsError> {
        if count == 0 {
            return Err(Violation::out_of_range("count", 1, u16::MAX, 0).into());
        }
        let last_start_year = first_start_year
            .checked_add(i32::from(count) - 1)
            .ok_or_else(|| {
                Violation::out_of_range(
                    "first_start_year",
                    i32::MIN,
                    i32::MAX - i32::from(count) + 1,
                    first_start_year,
                )
            })?;

        let report = self.ctx.commit(|tables, _| {
            let mut report = SeedReport::default();
            for start_year in first_start_year..=last_start_year {
                let new = NewAcademicYear::standard(start_year).ok_or(Violation::InvalidFormat {
                    field: "start_year",
                    value: start_year.to_string(),
                })?;

                if tables.academic_years.find(|year| year.label == new.label).is_some() {
                    report.skipped.push(new.label);
                    continue;
                }

                let label = new.label.clone();
                let year = insert_academic_year(tables, new)?;
                for number in 1..=3 {
                    insert_semester(tables, NewSemester::seeded(year.id, year.start_date, number))?;
                }
                report.created.push(label);
            }
            Ok(report)
        })?;

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            %actor,
            "academic years seeded"
        );
        Ok(report)
    }
}

fn insert_academic_year(
    tables: &mut Tables,
    new: NewAcademicYear,
) -> Result<AcademicYear, RecordsError> {
    let id = tables.academic_years.insert_with(|id| AcademicYear {
        id,
        label: new.label,
        start_date: new.start_date,
        end_date: new.end_date,
        is_current: false,
    })?;
    Ok(tables.academic_years.fetch(id)?.clone())
}

fn insert_semester(tables: &mut Tables, new: NewSemester) -> Result<Semester, RecordsError> {
    tables.academic_years.fetch(new.academic_year)?;
    let id = tables.semesters.insert_with(|id| Semester {
        id,
        academic_year: new.academic_year,
        number: new.number,
        start_date: new.start_date,
        end_date: new.end_date,
        registration_start: new.registration_start,
        registration_end: new.registration_end,
        is_current: false,
    })?;
    Ok(tables.semesters.fetch(id)?.clone())
}

fn project_current_year(tables: &mut Tables) -> Result<(), RecordsError> {
    let current = tables.cursor.current_year;
    let ids: Vec<AcademicYearId> = tables.academic_years.values().map(|year| year.id).collect();
    for id in ids {
        tables
            .academic_years
            .update(id, |year| year.is_current = Some(id) == current)?;
    }
    Ok(())
}

fn project_current_semester(tables: &mut Tables) -> Result<(), RecordsError> {
    let current = tables.cursor.current_semester;
    let ids: Vec<SemesterId> = tables.semesters.values().map(|semester| semester.id).collect();
    for id in ids {
        tables
            .semesters
            .update(id, |semester| semester.is_current = Some(id) == current)?;
    }
    Ok(())
}

/// Chronological position of a semester: (academic year start, semester number).
pub(crate) fn semester_position(
    tables: &Tables,
    semester: SemesterId,
) -> Result<(NaiveDate, u8), RecordsError> {
    let row = tables.semesters.fetch(semester)?;
    let year = tables.academic_years.fetch(row.academic_year)?;
    Ok((year.start_date, row.number))
}
