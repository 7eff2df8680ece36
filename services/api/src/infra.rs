use campus_records::calendar::Semester;
use campus_records::config::{AppConfig, ConfigError, PolicyConfig};
use campus_records::context::SystemClock;
use campus_records::error::AppError;
use campus_records::events::TracingEventPublisher;
use campus_records::records_error::RecordsError;
use campus_records::store::MemoryDatabase;
use campus_records::Campus;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ServiceCampus = Campus<MemoryDatabase, TracingEventPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the campus over the snapshot at `path`, or an empty in-memory store.
pub(crate) fn open_campus(
    path: Option<&PathBuf>,
    policy: PolicyConfig,
) -> Result<ServiceCampus, AppError> {
    let db = match path {
        Some(path) => MemoryDatabase::open(path)?,
        None => MemoryDatabase::new(),
    };
    Ok(Campus::with_store(
        db,
        TracingEventPublisher,
        Arc::new(SystemClock),
        policy,
    ))
}

/// Administrative commands mutate persisted state, so they insist on a snapshot path
/// from `--data` or `APP_DATA_PATH`.
pub(crate) fn snapshot_path(
    config: &AppConfig,
    flag: Option<PathBuf>,
) -> Result<PathBuf, AppError> {
    flag.or_else(|| config.storage.data_path.clone())
        .ok_or(AppError::Config(ConfigError::MissingDataPath))
}

/// Find semester `number` of the academic year labelled `label`, e.g. `2024/2025`.
pub(crate) fn semester_of(
    campus: &ServiceCampus,
    label: &str,
    number: u8,
) -> Result<Semester, AppError> {
    let year = campus.calendar.academic_year_by_label(label)?;
    campus
        .calendar
        .semesters_of(year.id)?
        .into_iter()
        .find(|semester| semester.number == number)
        .ok_or_else(|| {
            RecordsError::not_found("semester", format!("{label} semester {number}")).into()
        })
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
