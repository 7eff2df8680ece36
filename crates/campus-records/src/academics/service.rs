use chrono::NaiveDate;
use tracing::{debug, info};

use super::domain::{
    AttendanceRecord, AttendanceSummary, Examination, NewAttendance, NewExamination,
    NewResearch, NewTimetableSlot, ResearchAction, ResearchProject, ResearchStatus,
    TimetableSlot,
};
use crate::context::CoreContext;
use crate::directory::{active_course, active_department};
use crate::events::EventPublisher;
use crate::ids::{
    Actor, CourseId, ExaminationId, LecturerId, ProgrammeId, ResearchId, SemesterId, StudentId,
};
use crate::records_error::{Precondition, RecordsError};
use crate::store::{Database, Tables};
use crate::validation::ordered;

/// Examinations, the class timetable, attendance and research projects.
pub struct AcademicsService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> AcademicsService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn schedule_examination(
        &self,
        actor: Actor,
        new: NewExamination,
    ) -> Result<Examination, RecordsError> {
        new.validate()?;
        let created_at = self.ctx.now();
        let exam = self.ctx.commit(|tables, _| {
            active_course(tables, new.course)?;
            tables.semesters.fetch(new.semester)?;
            for lecturer in &new.invigilators {
                active_lecturer(tables, *lecturer)?;
            }
            let id = tables.examinations.insert_with(|id| Examination {
                id,
                course: new.course,
                semester: new.semester,
                exam_type: new.exam_type,
                exam_date: new.exam_date,
                start_time: new.start_time,
                duration_minutes: new.duration_minutes,
                venue: new.venue,
                max_marks: new.max_marks,
                instructions: new.instructions,
                invigilators: new.invigilators,
                is_published: false,
                created_by: actor.user(),
                created_at,
            })?;
            Ok(tables.examinations.fetch(id)?.clone())
        })?;

        info!(
            examination = %exam.id,
            course = %exam.course,
            date = %exam.exam_date,
            %actor,
            "examination scheduled"
        );
        Ok(exam)
    }

    /// Publication cannot be withdrawn; publishing again is a no-op.
    pub fn publish_examination(
        &self,
        actor: Actor,
        examination: ExaminationId,
    ) -> Result<Examination, RecordsError> {
        let exam = self.ctx.commit(|tables, _| {
            tables
                .examinations
                .update(examination, |row| row.is_published = true)?;
            Ok(tables.examinations.fetch(examination)?.clone())
        })?;
        info!(%examination, %actor, "examination published");
        Ok(exam)
    }

    /// Published examinations of a semester in date order.
    pub fn examinations_for(&self, semester: SemesterId) -> Result<Vec<Examination>, RecordsError> {
        self.ctx.query(|tables| {
            let mut exams: Vec<_> = tables
                .examinations
                .filter(|exam| exam.semester == semester && exam.is_published)
                .cloned()
                .collect();
            exams.sort_by_key(|exam| (exam.exam_date, exam.start_time));
            exams
        })
    }

    pub fn schedule_slot(
        &self,
        actor: Actor,
        new: NewTimetableSlot,
    ) -> Result<TimetableSlot, RecordsError> {
        new.validate()?;
        let slot = self.ctx.commit(|tables, _| {
            active_course(tables, new.course)?;
            active_lecturer(tables, new.lecturer)?;
            tables.semesters.fetch(new.semester)?;
            tables.programmes.fetch(new.programme)?;
            let id = tables.timetable.insert_with(|id| TimetableSlot {
                id,
                course: new.course,
                lecturer: new.lecturer,
                semester: new.semester,
                programme: new.programme,
                day: new.day,
                start_time: new.start_time,
                end_time: new.end_time,
                venue: new.venue,
                class_type: new.class_type,
                year: new.year,
                semester_number: new.semester_number,
                is_active: true,
            })?;
            Ok(tables.timetable.fetch(id)?.clone())
        })?;

        info!(
            slot = %slot.id,
            course = %slot.course,
            day = slot.day.label(),
            %actor,
            "timetable slot scheduled"
        );
        Ok(slot)
    }

    /// Active slots for a programme cohort in a semester, by day then start time.
    pub fn timetable_for(
        &self,
        semester: SemesterId,
        programme: ProgrammeId,
        year: u8,
    ) -> Result<Vec<TimetableSlot>, RecordsError> {
        self.ctx.query(|tables| {
            let mut slots: Vec<_> = tables
                .timetable
                .filter(|slot| {
                    slot.is_active
                        && slot.semester == semester
                        && slot.programme == programme
                        && slot.year == year
                })
                .cloned()
                .collect();
            slots.sort_by_key(|slot| (slot.day as u8, slot.start_time));
            slots
        })
    }

    /// Record a student's attendance at a slot. The student must hold an active
    /// enrollment in the slot's course for the slot's semester.
    pub fn mark_attendance(
        &self,
        actor: Actor,
        new: NewAttendance,
    ) -> Result<AttendanceRecord, RecordsError> {
        let marked_at = self.ctx.now();
        let record = self.ctx.commit(|tables, _| {
            let slot = tables.timetable.fetch(new.slot)?;
            if !slot.is_active {
                return Err(RecordsError::inactive("timetable slot", slot.id));
            }
            let enrolled = tables
                .enrollments
                .find(|row| {
                    row.student == new.student
                        && row.course == slot.course
                        && row.semester == slot.semester
                        && row.is_active
                })
                .is_some();
            if !enrolled {
                let course = tables.courses.fetch(slot.course)?;
                return Err(Precondition::NotEnrolled {
                    course: course.code.clone(),
                }
                .into());
            }

            let id = tables.attendance.insert_with(|id| AttendanceRecord {
                id,
                student: new.student,
                slot: new.slot,
                date: new.date,
                status: new.status,
                remarks: new.remarks,
                marked_by: actor.user(),
                marked_at,
            })?;
            Ok(tables.attendance.fetch(id)?.clone())
        })?;

        info!(
            attendance = %record.id,
            student = %record.student,
            slot = %record.slot,
            %actor,
            "attendance marked"
        );
        Ok(record)
    }

    pub fn attendance_summary(
        &self,
        student: StudentId,
        course: CourseId,
        semester: SemesterId,
    ) -> Result<AttendanceSummary, RecordsError> {
        debug!(%student, %course, %semester, "summarising attendance");
        self.ctx.query(|tables| {
            let mut summary = AttendanceSummary::default();
            for record in tables.attendance.filter(|record| record.student == student) {
                let in_course = tables
                    .timetable
                    .get(record.slot)
                    .is_some_and(|slot| slot.course == course && slot.semester == semester);
                if in_course {
                    summary.record(record.status);
                }
            }
            summary
        })
    }

    pub fn register_research(
        &self,
        actor: Actor,
        new: NewResearch,
    ) -> Result<ResearchProject, RecordsError> {
        new.validate()?;
        let created_at = self.ctx.now();
        let project = self.ctx.commit(|tables, _| {
            active_lecturer(tables, new.principal_investigator)?;
            for lecturer in &new.co_investigators {
                active_lecturer(tables, *lecturer)?;
            }
            for student in &new.students {
                tables.students.fetch(*student)?;
            }
            active_department(tables, new.department)?;

            let id = tables.research.insert_with(|id| ResearchProject {
                id,
                title: new.title.trim().to_string(),
                research_type: new.research_type,
                principal_investigator: new.principal_investigator,
                co_investigators: new.co_investigators,
                students: new.students,
                department: new.department,
                start_date: new.start_date,
                expected_end_date: new.expected_end_date,
                actual_end_date: None,
                status: ResearchStatus::Proposal,
                summary: new.summary,
                keywords: new.keywords,
                funding_amount: new.funding_amount,
                funding_source: new.funding_source,
                ethics_approval: new.ethics_approval,
                created_at,
            })?;
            Ok(tables.research.fetch(id)?.clone())
        })?;

        info!(research = %project.id, title = %project.title, %actor, "research project registered");
        Ok(project)
    }

    /// Move a project through its lifecycle. Completion stamps the actual end date,
    /// defaulting to today.
    pub fn transition_research(
        &self,
        actor: Actor,
        research: ResearchId,
        action: ResearchAction,
        on: Option<NaiveDate>,
    ) -> Result<ResearchProject, RecordsError> {
        let today = self.ctx.today();
        let project = self.ctx.commit(|tables, _| {
            let current = tables.research.fetch(research)?;
            let next = current.status.apply(action)?;
            let start = current.start_date;
            if next == ResearchStatus::Completed {
                let ended = on.unwrap_or(today);
                ordered("start_date", start, "actual_end_date", ended)?;
                tables.research.update(research, |row| {
                    row.status = next;
                    row.actual_end_date = Some(ended);
                })?;
            } else {
                tables.research.update(research, |row| row.status = next)?;
            }
            Ok(tables.research.fetch(research)?.clone())
        })?;

        info!(%research, status = project.status.label(), %actor, "research project transitioned");
        Ok(project)
    }

    pub fn research(&self, research: ResearchId) -> Result<ResearchProject, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.research.fetch(research)?.clone()))
    }
}

fn active_lecturer(tables: &Tables, lecturer: LecturerId) -> Result<(), RecordsError> {
    let row = tables.lecturers.fetch(lecturer)?;
    if !row.is_active {
        return Err(RecordsError::inactive("lecturer", &row.employee_number));
    }
    Ok(())
}
