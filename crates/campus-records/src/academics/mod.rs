//! Examinations, timetable, attendance and research projects.

pub mod domain;
mod service;

pub use domain::{
    AttendanceRecord, AttendanceStatus, AttendanceSummary, ClassType, DayOfWeek, ExamType,
    Examination, NewAttendance, NewExamination, NewResearch, NewTimetableSlot, ResearchAction,
    ResearchProject, ResearchStatus, ResearchType, TimetableSlot,
};
pub use service::AcademicsService;
