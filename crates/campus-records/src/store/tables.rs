use serde::{Deserialize, Serialize};

use super::Table;
use crate::academics::{AttendanceRecord, Examination, ResearchProject, TimetableSlot};
use crate::access::{LoginAttempt, TwoFactorCode};
use crate::billing::{FeePayment, FeeStructure};
use crate::calendar::{AcademicYear, Semester};
use crate::directory::{
    Course, Department, Faculty, Lecturer, Programme, ProgrammeCourse, StaffMember, Student, User,
};
use crate::enrollment::Enrollment;
use crate::hostel::{Bed, Hostel, HostelBooking, HostelPayment, Room};
use crate::ids::{
    AcademicYearId, AttendanceId, BedId, BookingId, ClearanceId, CourseId, DefermentId,
    DepartmentId, EnrollmentId, ExaminationId, FacultyId, FeePaymentId, FeeStructureId, HostelId, HostelPaymentId, LecturerId,
    LibraryResourceId, LoanId, LoginAttemptId, NotificationId, ProgrammeCourseId, ProgrammeId,
    ReportingId, ResearchId, RoomId, SemesterId, SpecialExamId, StaffId, StudentId, TimetableId,
    TwoFactorCodeId, UserId,
};
use crate::library::{LibraryResource, Loan};
use crate::notifications::Notification;
use crate::reporting::StudentReporting;
use crate::student_affairs::{ClearanceRequest, DefermentApplication, SpecialExamApplication};

/// Singleton pointer to the current academic year and semester. The `is_current`
/// flags on the rows are a projection of this record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCursor {
    pub current_year: Option<AcademicYearId>,
    pub current_semester: Option<SemesterId>,
}

/// Every relation of the records core, committed together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub users: Table<UserId, User>,
    pub faculties: Table<FacultyId, Faculty>,
    pub departments: Table<DepartmentId, Department>,
    pub programmes: Table<ProgrammeId, Programme>,
    pub courses: Table<CourseId, Course>,
    pub curriculum: Table<ProgrammeCourseId, ProgrammeCourse>,
    pub lecturers: Table<LecturerId, Lecturer>,
    pub students: Table<StudentId, Student>,
    pub staff: Table<StaffId, StaffMember>,

    pub academic_years: Table<AcademicYearId, AcademicYear>,
    pub semesters: Table<SemesterId, Semester>,
    pub cursor: CalendarCursor,
    pub reportings: Table<ReportingId, StudentReporting>,

    pub enrollments: Table<EnrollmentId, Enrollment>,

    pub fee_structures: Table<FeeStructureId, FeeStructure>,
    pub fee_payments: Table<FeePaymentId, FeePayment>,

    pub hostels: Table<HostelId, Hostel>,
    pub rooms: Table<RoomId, Room>,
    pub beds: Table<BedId, Bed>,
    pub bookings: Table<BookingId, HostelBooking>,
    pub hostel_payments: Table<HostelPaymentId, HostelPayment>,

    pub examinations: Table<ExaminationId, Examination>,
    pub timetable: Table<TimetableId, TimetableSlot>,
    pub attendance: Table<AttendanceId, AttendanceRecord>,
    pub research: Table<ResearchId, ResearchProject>,
    pub notifications: Table<NotificationId, Notification>,

    pub library_resources: Table<LibraryResourceId, LibraryResource>,
    pub loans: Table<LoanId, Loan>,

    pub clearances: Table<ClearanceId, ClearanceRequest>,
    pub special_exams: Table<SpecialExamId, SpecialExamApplication>,
    pub deferments: Table<DefermentId, DefermentApplication>,

    pub two_factor_codes: Table<TwoFactorCodeId, TwoFactorCode>,
    pub login_attempts: Table<LoginAttemptId, LoginAttempt>,
}
