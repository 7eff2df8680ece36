use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::calendar::{AcademicYear, NewAcademicYear};
use crate::campus::Campus;
use crate::config::PolicyConfig;
use crate::context::FixedClock;
use crate::events::MemoryEventLog;
use crate::ids::{Actor, UserId};
use crate::store::MemoryDatabase;

pub(super) type TestCampus = Campus<MemoryDatabase, MemoryEventLog>;

pub(super) const ACTOR: Actor = Actor(UserId(1));

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn campus() -> TestCampus {
    let now = Utc
        .with_ymd_and_hms(2024, 9, 10, 8, 0, 0)
        .single()
        .expect("valid instant");
    Campus::in_memory_at(Arc::new(FixedClock(now)), PolicyConfig::default())
}

pub(super) fn academic_year(campus: &TestCampus, start_year: i32) -> AcademicYear {
    let new = NewAcademicYear::standard(start_year).expect("standard year");
    campus
        .calendar
        .create_academic_year(ACTOR, new)
        .expect("academic year created")
}
