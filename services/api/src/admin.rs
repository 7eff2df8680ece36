//! Batch and maintenance commands. Each one loads the snapshot, runs a single
//! operation as the given actor, prints its report and saves the snapshot back.

use crate::infra::{open_campus, print_json, semester_of, snapshot_path, ServiceCampus};
use campus_records::billing::FeeTemplate;
use campus_records::config::AppConfig;
use campus_records::error::AppError;
use campus_records::hostel::RoomPlan;
use campus_records::ids::{Actor, HostelId, StudentId, UserId};
use campus_records::progression::ProgressionRequest;
use campus_records::telemetry;
use chrono::Utc;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct StoreArgs {
    /// Snapshot file (falls back to APP_DATA_PATH)
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// User id recorded as the actor of every change
    #[arg(long)]
    pub(crate) actor: u64,
}

#[derive(Args, Debug)]
pub(crate) struct SeedYearsArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    /// Calendar year the first academic year starts in
    #[arg(long)]
    pub(crate) first_start_year: i32,
    #[arg(long, default_value_t = 1)]
    pub(crate) count: u16,
}

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    /// Mandatory courses placed in each programme year and semester
    #[arg(long, default_value_t = 5)]
    pub(crate) per_semester: usize,
}

#[derive(Args, Debug)]
pub(crate) struct GenerateFeesArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    /// Academic year label, e.g. 2024/2025
    #[arg(long)]
    pub(crate) academic_year: String,
    /// JSON fee template; the built-in schedule is used when omitted
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct StatementArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    #[arg(long)]
    pub(crate) student: u64,
}

#[derive(Args, Debug)]
pub(crate) struct GenerateRoomsArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    #[arg(long)]
    pub(crate) hostel: u64,
    #[arg(long)]
    pub(crate) academic_year: String,
    /// Room number prefix, e.g. K for K001
    #[arg(long)]
    pub(crate) prefix: String,
    #[arg(long)]
    pub(crate) rooms: u16,
    #[arg(long, default_value_t = 10)]
    pub(crate) rooms_per_floor: u16,
    #[arg(long, default_value_t = 4)]
    pub(crate) beds_per_room: u8,
}

#[derive(Args, Debug)]
pub(crate) struct OccupancyArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    #[arg(long)]
    pub(crate) academic_year: String,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    /// Marks sheet with header student_id,course_code,cat,final,practical,project
    #[arg(long)]
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) academic_year: String,
    #[arg(long)]
    pub(crate) semester: u8,
}

#[derive(Args, Debug)]
pub(crate) struct ProgressionArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    #[arg(long)]
    pub(crate) student: u64,
    /// Academic year being closed
    #[arg(long)]
    pub(crate) academic_year: String,
    #[arg(long, default_value_t = 1)]
    pub(crate) semester: u8,
    /// Enroll a promoted student into this semester number
    #[arg(long)]
    pub(crate) auto_enroll_semester: Option<u8>,
    /// Academic year of the auto-enroll semester (defaults to --academic-year)
    #[arg(long)]
    pub(crate) auto_enroll_year: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct TranscriptArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    #[arg(long)]
    pub(crate) student: u64,
}

fn with_campus<T>(
    store: StoreArgs,
    job: impl FnOnce(&ServiceCampus, Actor) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let path = snapshot_path(&config, store.data)?;
    let campus = open_campus(Some(&path), config.policy.clone())?;
    let outcome = job(&campus, Actor(UserId(store.actor)))?;
    campus.database().save()?;
    info!(snapshot = %path.display(), "snapshot saved");
    Ok(outcome)
}

pub(crate) fn seed_academic_years(args: SeedYearsArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, actor| {
        let report = campus
            .calendar
            .seed_academic_years(actor, args.first_start_year, args.count)?;
        print_json(&report)
    })
}

pub(crate) fn allocate_curriculum(args: AllocateArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, actor| {
        let report = campus
            .directory
            .allocate_curriculum(actor, args.per_semester)?;
        print_json(&report)
    })
}

pub(crate) fn generate_fee_structures(args: GenerateFeesArgs) -> Result<(), AppError> {
    let template = match &args.template {
        Some(path) => serde_json::from_reader(File::open(path)?).map_err(std::io::Error::from)?,
        None => FeeTemplate::default(),
    };
    with_campus(args.store, |campus, actor| {
        let year = campus.calendar.academic_year_by_label(&args.academic_year)?;
        let report = campus
            .billing
            .generate_fee_structures(actor, year.id, &template)?;
        print_json(&report)
    })
}

pub(crate) fn fee_statement(args: StatementArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, _| {
        print_json(&campus.billing.statement(StudentId(args.student))?)
    })
}

pub(crate) fn generate_rooms(args: GenerateRoomsArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, actor| {
        let year = campus.calendar.academic_year_by_label(&args.academic_year)?;
        let report = campus.hostel.generate_rooms(
            actor,
            RoomPlan {
                hostel: HostelId(args.hostel),
                academic_year: year.id,
                prefix: args.prefix,
                rooms: args.rooms,
                rooms_per_floor: args.rooms_per_floor,
                beds_per_room: args.beds_per_room,
            },
        )?;
        print_json(&report)
    })
}

pub(crate) fn occupancy(args: OccupancyArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, _| {
        let year = campus.calendar.academic_year_by_label(&args.academic_year)?;
        print_json(&campus.hostel.occupancy_report(year.id)?)
    })
}

pub(crate) fn report_students(args: StoreArgs) -> Result<(), AppError> {
    with_campus(args, |campus, actor| {
        print_json(&campus.reporting.report_students_to_semesters(actor)?)
    })
}

pub(crate) fn import_marks(args: ImportArgs) -> Result<(), AppError> {
    let sheet = File::open(&args.file)?;
    with_campus(args.store, |campus, actor| {
        let semester = semester_of(campus, &args.academic_year, args.semester)?;
        let report = campus.grading.import_marks(actor, semester.id, sheet)?;
        print_json(&report)
    })
}

pub(crate) fn evaluate_progression(args: ProgressionArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, actor| {
        let closing = semester_of(campus, &args.academic_year, args.semester)?;
        let auto_enroll_into = match args.auto_enroll_semester {
            Some(number) => {
                let label = args
                    .auto_enroll_year
                    .as_deref()
                    .unwrap_or(&args.academic_year);
                Some(semester_of(campus, label, number)?.id)
            }
            None => None,
        };
        let report = campus.progression.evaluate_progression(
            actor,
            ProgressionRequest {
                student: StudentId(args.student),
                semester: closing.id,
                auto_enroll_into,
            },
        )?;
        print_json(&report)
    })
}

pub(crate) fn transcript(args: TranscriptArgs) -> Result<(), AppError> {
    with_campus(args.store, |campus, _| {
        print_json(&campus.transcript.transcript(StudentId(args.student))?)
    })
}

pub(crate) fn cleanup_access(args: StoreArgs) -> Result<(), AppError> {
    with_campus(args, |campus, actor| {
        let report = campus
            .access
            .cleanup_expired_access_records(actor, Utc::now())?;
        print_json(&report)
    })
}

pub(crate) fn mark_overdue(args: StoreArgs) -> Result<(), AppError> {
    with_campus(args, |campus, actor| {
        let today = campus.context().today();
        let flagged = campus.library.mark_overdue(actor, today)?;
        print_json(&serde_json::json!({ "flagged": flagged, "today": today }))
    })
}
