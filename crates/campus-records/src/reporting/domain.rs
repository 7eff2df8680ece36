use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ReportingId, SemesterId, StudentId, UserId};
use crate::records_error::{Conflict, RecordsError};
use crate::store::{Constrained, UniqueKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingType {
    #[default]
    Online,
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReportingStatus {
    pub fn label(self) -> &'static str {
        match self {
            ReportingStatus::Pending => "pending",
            ReportingStatus::Approved => "approved",
            ReportingStatus::Rejected => "rejected",
        }
    }

    /// Pending is the only state a decision can be taken from.
    pub fn decide(self, approve: bool) -> Result<ReportingStatus, RecordsError> {
        let target = if approve {
            ReportingStatus::Approved
        } else {
            ReportingStatus::Rejected
        };
        match self {
            ReportingStatus::Pending => Ok(target),
            from => Err(RecordsError::transition(
                "student reporting",
                from.label(),
                target.label(),
            )),
        }
    }
}

/// A student's declaration of presence for one semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReporting {
    pub id: ReportingId,
    pub student: StudentId,
    pub semester: SemesterId,
    pub reporting_type: ReportingType,
    pub reported_at: DateTime<Utc>,
    pub remarks: String,
    pub status: ReportingStatus,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Constrained for StudentReporting {
    const ENTITY: &'static str = "student reporting";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateReporting,
            format!("{}:{}", self.student, self.semester),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingRequest {
    pub student: StudentId,
    pub semester: SemesterId,
    #[serde(default)]
    pub reporting_type: ReportingType,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportingBatchReport {
    pub students: usize,
    pub created: usize,
    pub existing: usize,
}
