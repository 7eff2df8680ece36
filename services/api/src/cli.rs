use crate::admin;
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use campus_records::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "campus-records",
    about = "Serve and administer the academic records and billing core",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Seed standard academic years with their semesters
    Seed {
        #[command(subcommand)]
        command: SeedCommand,
    },
    /// Curriculum batch jobs
    Curriculum {
        #[command(subcommand)]
        command: CurriculumCommand,
    },
    /// Fee structures and statements
    Fees {
        #[command(subcommand)]
        command: FeesCommand,
    },
    /// Hostel provisioning and occupancy
    Hostel {
        #[command(subcommand)]
        command: HostelCommand,
    },
    /// Semester reporting batch jobs
    Reporting {
        #[command(subcommand)]
        command: ReportingCommand,
    },
    /// Marks sheet import
    Grades {
        #[command(subcommand)]
        command: GradesCommand,
    },
    /// Year-end promotion decision for one student
    Progression(admin::ProgressionArgs),
    /// Print a student's transcript as JSON
    Transcript(admin::TranscriptArgs),
    /// Housekeeping jobs meant for a scheduler
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommand,
    },
    /// Run a scripted walk-through over an in-memory campus
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum SeedCommand {
    /// Create consecutive academic years, skipping labels that already exist
    AcademicYears(admin::SeedYearsArgs),
}

#[derive(Subcommand, Debug)]
enum CurriculumCommand {
    /// Fill each programme year and semester from the active course pool
    Allocate(admin::AllocateArgs),
}

#[derive(Subcommand, Debug)]
enum FeesCommand {
    /// Create missing fee structures for every active programme in a year
    Generate(admin::GenerateFeesArgs),
    /// Print a student's fee statement
    Statement(admin::StatementArgs),
}

#[derive(Subcommand, Debug)]
enum HostelCommand {
    /// Create numbered rooms and their beds for an academic year
    GenerateRooms(admin::GenerateRoomsArgs),
    /// Print bed occupancy for every active hostel
    Occupancy(admin::OccupancyArgs),
}

#[derive(Subcommand, Debug)]
enum ReportingCommand {
    /// Report every student to the semesters of their programme window
    ReportStudents(admin::StoreArgs),
}

#[derive(Subcommand, Debug)]
enum GradesCommand {
    /// Record grades from a marks sheet CSV
    Import(admin::ImportArgs),
}

#[derive(Subcommand, Debug)]
enum MaintenanceCommand {
    /// Delete expired two-factor codes and stale login attempts
    CleanupAccess(admin::StoreArgs),
    /// Flag library loans past their due date
    MarkOverdue(admin::StoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Snapshot file to load on start and save on shutdown
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seed {
            command: SeedCommand::AcademicYears(args),
        } => admin::seed_academic_years(args),
        Command::Curriculum {
            command: CurriculumCommand::Allocate(args),
        } => admin::allocate_curriculum(args),
        Command::Fees { command } => match command {
            FeesCommand::Generate(args) => admin::generate_fee_structures(args),
            FeesCommand::Statement(args) => admin::fee_statement(args),
        },
        Command::Hostel { command } => match command {
            HostelCommand::GenerateRooms(args) => admin::generate_rooms(args),
            HostelCommand::Occupancy(args) => admin::occupancy(args),
        },
        Command::Reporting {
            command: ReportingCommand::ReportStudents(args),
        } => admin::report_students(args),
        Command::Grades {
            command: GradesCommand::Import(args),
        } => admin::import_marks(args),
        Command::Progression(args) => admin::evaluate_progression(args),
        Command::Transcript(args) => admin::transcript(args),
        Command::Maintenance { command } => match command {
            MaintenanceCommand::CleanupAccess(args) => admin::cleanup_access(args),
            MaintenanceCommand::MarkOverdue(args) => admin::mark_overdue(args),
        },
        Command::Demo(args) => run_demo(args),
    }
}
