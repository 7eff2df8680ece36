use crate::infra::parse_date;
use campus_records::billing::{FeeComponents, NewFeeStructure, PaymentMethod, PaymentRequest};
use campus_records::calendar::{NewAcademicYear, NewSemester};
use campus_records::config::PolicyConfig;
use campus_records::context::FixedClock;
use campus_records::directory::{
    AdmissionType, CourseLevel, CourseType, CurriculumSlot, GuardianContact, NewCourse,
    NewDepartment, NewFaculty, NewProgramme, NewStudent, NewUser, ProgrammeType, SponsorType,
    StudyMode, UserCategory,
};
use campus_records::enrollment::{EnrollmentFlags, EnrollmentRequest};
use campus_records::error::AppError;
use campus_records::grading::GradeEntry;
use campus_records::hostel::{
    BookingAction, BookingRequest, HostelType, NewHostel, RoomPlan, TransitionDetails,
};
use campus_records::ids::{Actor, UserId};
use campus_records::records_error::{RecordsError, Violation};
use campus_records::Campus;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the demo runs on (YYYY-MM-DD). Defaults to 2024-09-10, inside the
    /// semester 1 registration window.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the hostel portion of the demo.
    #[arg(long)]
    pub(crate) skip_hostel: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args
        .today
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2024, 9, 10).unwrap_or_default());
    let now = Utc.from_utc_datetime(&today.and_hms_opt(8, 0, 0).unwrap_or_default());
    let campus = Campus::in_memory_at(Arc::new(FixedClock(now)), PolicyConfig::default());

    println!("Campus records demo ({today})");

    let registrar = campus
        .directory
        .create_user(Actor(UserId(0)), user("registrar", UserCategory::Registrar))?;
    let actor = Actor(registrar.id);

    let faculty = campus.directory.create_faculty(
        actor,
        NewFaculty {
            name: "Faculty of Science".to_string(),
            code: "SCI".to_string(),
            description: String::new(),
            dean: None,
            established_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        },
    )?;
    let department = campus.directory.create_department(
        actor,
        NewDepartment {
            name: "Computing".to_string(),
            code: "CS".to_string(),
            faculty: faculty.id,
            head: None,
            description: String::new(),
            established_date: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap_or_default(),
        },
    )?;
    let programme = campus.directory.create_programme(
        actor,
        NewProgramme {
            name: "BSc Computer Science".to_string(),
            code: "BSC-CS".to_string(),
            programme_type: ProgrammeType::Bachelor,
            study_mode: StudyMode::FullTime,
            department: department.id,
            duration_years: 3,
            semesters_per_year: 2,
            total_semesters: 6,
            credit_hours_required: 120,
            entry_requirements: String::new(),
        },
    )?;

    let mut courses = Vec::new();
    for (code, name) in [
        ("C101", "Introduction to Programming"),
        ("C102", "Discrete Mathematics"),
    ] {
        let course = campus.directory.create_course(
            actor,
            NewCourse {
                name: name.to_string(),
                code: code.to_string(),
                course_type: CourseType::Core,
                level: CourseLevel::L100,
                credit_hours: 3,
                contact_hours: Default::default(),
                department: department.id,
                description: String::new(),
            },
        )?;
        campus.directory.upsert_curriculum(
            actor,
            CurriculumSlot {
                programme: programme.id,
                course: course.id,
                year: 1,
                semester: 1,
                is_mandatory: true,
            },
        )?;
        courses.push(course);
    }

    let start_year = if today.month() >= 9 {
        today.year()
    } else {
        today.year() - 1
    };
    let year = campus.calendar.create_academic_year(
        actor,
        NewAcademicYear::standard(start_year).ok_or_else(|| {
            RecordsError::from(Violation::InvalidFormat {
                field: "start_year",
                value: start_year.to_string(),
            })
        })?,
    )?;
    let semester = campus
        .calendar
        .create_semester(actor, NewSemester::seeded(year.id, year.start_date, 1))?;
    campus.calendar.set_current_year(actor, year.id)?;
    campus.calendar.set_current_semester(actor, semester.id)?;
    println!(
        "Calendar: {} semester 1, registration {} to {}",
        year.label, semester.registration_start, semester.registration_end
    );

    let account = campus
        .directory
        .create_user(actor, user("sct-0001", UserCategory::Student))?;
    let student = campus.directory.register_student(
        actor,
        NewStudent {
            user: account.id,
            student_number: "SCT-0001".to_string(),
            programme: programme.id,
            current_year: 1,
            current_semester: 1,
            admission_date: year.start_date,
            admission_type: AdmissionType::Direct,
            sponsor: SponsorType::SelfSponsored,
            guardian: GuardianContact::default(),
        },
    )?;
    println!("Registered {} in {}", student.student_number, programme.code);

    println!("\nEnrollment and grading");
    let sheet = [(dec!(30), dec!(55)), (dec!(62), dec!(71))];
    for (course, (cat, final_exam)) in courses.iter().zip(sheet) {
        let enrollment = campus.enrollment.enroll(
            actor,
            EnrollmentRequest {
                student: student.id,
                course: course.id,
                semester: semester.id,
                lecturer: None,
                flags: EnrollmentFlags::default(),
            },
        )?;
        let grade = campus.grading.record_grade(
            actor,
            GradeEntry {
                enrollment: enrollment.id,
                cat: Some(cat),
                final_exam: Some(final_exam),
                practical: None,
                project: None,
                remarks: None,
                exam_date: None,
            },
        )?;
        println!(
            "  {}: total {} -> {}",
            course.code,
            grade
                .total_marks
                .map(|total| total.to_string())
                .unwrap_or_else(|| "-".to_string()),
            grade.letter.map(|letter| letter.as_str()).unwrap_or("-"),
        );
    }
    let transcript = campus.transcript.transcript(student.id)?;
    println!(
        "  Cumulative GPA: {}",
        transcript
            .cumulative_gpa
            .map(|gpa| gpa.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );

    println!("\nFees");
    let structure = campus.billing.create_fee_structure(
        actor,
        NewFeeStructure {
            programme: programme.id,
            academic_year: year.id,
            year: 1,
            semester: 1,
            components: FeeComponents {
                tuition: dec!(60000),
                registration: dec!(5000),
                examination: dec!(5000),
                library: dec!(10000),
                ..FeeComponents::default()
            },
            government_subsidy: dec!(30000),
            scholarship_amount: Decimal::ZERO,
        },
    )?;
    println!(
        "  Structure: total {} net {}",
        structure.total_fee(),
        structure.net_fee()
    );
    let receipt = format!("FEE{}0001S1001", &year.label[2..4]);
    let payment = campus.billing.record_payment(
        actor,
        PaymentRequest {
            student: student.id,
            fee_structure: structure.id,
            amount: dec!(30000),
            method: PaymentMethod::Mpesa,
            payment_date: today,
            receipt_number: receipt,
            references: Default::default(),
            remarks: String::new(),
            allow_overpay: false,
            pending: false,
        },
    )?;
    let statement = campus.billing.statement(student.id)?;
    println!(
        "  Paid {} with {}; balance {}",
        payment.amount, payment.receipt_number, statement.total_balance
    );

    if !args.skip_hostel {
        println!("\nHostel");
        let hostel = campus.hostel.create_hostel(
            actor,
            NewHostel {
                name: "Kilimanjaro Hall".to_string(),
                hostel_type: HostelType::Boys,
                department: department.id,
                warden: None,
                total_rooms: 2,
                description: String::new(),
                facilities: String::new(),
            },
        )?;
        let rooms = campus.hostel.generate_rooms(
            actor,
            RoomPlan {
                hostel: hostel.id,
                academic_year: year.id,
                prefix: "K".to_string(),
                rooms: 2,
                rooms_per_floor: 10,
                beds_per_room: 2,
            },
        )?;
        println!(
            "  Generated {} rooms with {} beds",
            rooms.rooms_created, rooms.beds_created
        );
        let bed = campus.context().query(|tables| {
            tables
                .beds
                .values()
                .filter(|bed| bed.is_available)
                .map(|bed| bed.id)
                .min()
        })?;
        if let Some(bed) = bed {
            let booking = campus.hostel.create_booking(
                actor,
                BookingRequest {
                    student: student.id,
                    bed,
                    booking_fee: dec!(6000),
                    expected_checkout_date: None,
                    remarks: String::new(),
                },
            )?;
            campus
                .hostel
                .transition(actor, booking.id, BookingAction::Approve, TransitionDetails::default())?;
            let detail = campus.hostel.booking_detail(booking.id)?;
            println!(
                "  Booking {} approved for room {} ({})",
                detail.booking.id, detail.room_number, detail.booking.status.label()
            );
        }
        for row in campus.hostel.occupancy_report(year.id)? {
            println!(
                "  {}: {}/{} beds held, {} rooms with space",
                row.name, row.occupied_beds, row.total_beds, row.rooms_with_space
            );
        }
    }

    println!("\nDomain events: {}", campus.events().names().join(", "));
    Ok(())
}

fn user(username: &str, category: UserCategory) -> NewUser {
    NewUser {
        username: username.to_string(),
        national_id: None,
        category,
        first_name: "Demo".to_string(),
        last_name: username.to_string(),
        email: format!("{username}@campus.example"),
        phone: String::new(),
        gender: None,
        date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end_on_the_default_date() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn demo_can_skip_the_hostel_portion() {
        run_demo(DemoArgs {
            today: None,
            skip_hostel: true,
        })
        .expect("demo completes");
    }
}
