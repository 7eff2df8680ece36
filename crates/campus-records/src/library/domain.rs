use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{LibraryResourceId, LoanId, UserId};
use crate::records_error::{Conflict, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, non_negative, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Book,
    Journal,
    Ebook,
    Thesis,
    Reference,
    Multimedia,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLibraryResource {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub publication_year: Option<i32>,
    pub call_number: String,
    pub total_copies: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub subject_area: String,
    #[serde(default)]
    pub digital_copy_url: String,
}

impl NewLibraryResource {
    pub fn validate(&self) -> Result<(), Violation> {
        required("title", &self.title)?;
        required("author", &self.author)?;
        in_range("total_copies", self.total_copies, 1, 10_000)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryResource {
    pub id: LibraryResourceId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub resource_type: ResourceType,
    pub publisher: String,
    pub publication_year: Option<i32>,
    pub call_number: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub location: String,
    pub subject_area: String,
    pub digital_copy_url: String,
    pub added_on: NaiveDate,
}

impl LibraryResource {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

impl Constrained for LibraryResource {
    const ENTITY: &'static str = "library resource";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateCallNumber,
            self.call_number.clone(),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
    Lost,
    Damaged,
}

impl LoanStatus {
    pub fn label(self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Lost => "lost",
            LoanStatus::Damaged => "damaged",
        }
    }

    /// The copy is still out with the borrower.
    pub fn is_open(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: UserId,
    pub resource: LibraryResourceId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub renewals: u8,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub fine_amount: Decimal,
    pub librarian: UserId,
    pub remarks: String,
}

impl Constrained for Loan {
    const ENTITY: &'static str = "loan";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub borrower: UserId,
    pub resource: LibraryResourceId,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub remarks: String,
}

/// How a copy came back. Lost and damaged copies do not return to the shelf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    #[default]
    Good,
    Damaged,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub returned_on: NaiveDate,
    #[serde(default)]
    pub fine_amount: Decimal,
    #[serde(default)]
    pub condition: ReturnCondition,
    #[serde(default)]
    pub remarks: String,
}

impl ReturnRequest {
    pub fn validate(&self) -> Result<(), Violation> {
        non_negative("fine_amount", self.fine_amount)
    }
}
