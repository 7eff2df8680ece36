use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::domain::{
    BorrowRequest, LibraryResource, Loan, LoanStatus, NewLibraryResource, ReturnCondition,
    ReturnRequest,
};
use crate::context::CoreContext;
use crate::directory::active_user;
use crate::events::EventPublisher;
use crate::ids::{Actor, LibraryResourceId, LoanId, UserId};
use crate::records_error::{Precondition, RecordsError};
use crate::store::Database;
use crate::validation::{normalise_code, ordered};

pub struct LibraryService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> LibraryService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn add_resource(
        &self,
        actor: Actor,
        new: NewLibraryResource,
    ) -> Result<LibraryResource, RecordsError> {
        new.validate()?;
        let call_number = normalise_code("call_number", &new.call_number)?;
        let added_on = self.ctx.today();
        let resource = self.ctx.commit(|tables, _| {
            let id = tables.library_resources.insert_with(|id| LibraryResource {
                id,
                title: new.title.trim().to_string(),
                author: new.author.trim().to_string(),
                isbn: new.isbn,
                resource_type: new.resource_type,
                publisher: new.publisher,
                publication_year: new.publication_year,
                call_number,
                total_copies: new.total_copies,
                available_copies: new.total_copies,
                location: new.location,
                subject_area: new.subject_area,
                digital_copy_url: new.digital_copy_url,
                added_on,
            })?;
            Ok(tables.library_resources.fetch(id)?.clone())
        })?;

        info!(resource = %resource.id, call_number = %resource.call_number, %actor, "library resource added");
        Ok(resource)
    }

    /// Lend one copy. Fails when every copy is out.
    pub fn borrow(&self, actor: Actor, request: BorrowRequest) -> Result<Loan, RecordsError> {
        let now = self.ctx.now();
        ordered("borrowed_on", now.date_naive(), "due_date", request.due_date)?;

        let loan = self.ctx.commit(|tables, _| {
            active_user(tables, request.borrower)?;
            let resource = tables.library_resources.fetch(request.resource)?;
            if !resource.is_available() {
                return Err(Precondition::NoCopiesAvailable {
                    call_number: resource.call_number.clone(),
                }
                .into());
            }
            tables
                .library_resources
                .update(request.resource, |row| row.available_copies -= 1)?;

            let id = tables.loans.insert_with(|id| Loan {
                id,
                borrower: request.borrower,
                resource: request.resource,
                borrowed_at: now,
                due_date: request.due_date,
                renewals: 0,
                return_date: None,
                status: LoanStatus::Active,
                fine_amount: Decimal::ZERO,
                librarian: actor.user(),
                remarks: request.remarks,
            })?;
            Ok(tables.loans.fetch(id)?.clone())
        })?;

        info!(
            loan = %loan.id,
            resource = %loan.resource,
            borrower = %loan.borrower,
            due = %loan.due_date,
            %actor,
            "library loan opened"
        );
        Ok(loan)
    }

    /// Push the due date of an open loan out. An overdue loan becomes active again.
    pub fn renew(
        &self,
        actor: Actor,
        loan: LoanId,
        due_date: NaiveDate,
    ) -> Result<Loan, RecordsError> {
        let renewed = self.ctx.commit(|tables, _| {
            let current = tables.loans.fetch(loan)?;
            if !current.status.is_open() {
                return Err(RecordsError::transition(
                    "library loan",
                    current.status.label(),
                    LoanStatus::Active.label(),
                ));
            }
            ordered("current_due_date", current.due_date, "due_date", due_date)?;
            tables.loans.update(loan, |row| {
                row.due_date = due_date;
                row.renewals += 1;
                row.status = LoanStatus::Active;
            })?;
            Ok(tables.loans.fetch(loan)?.clone())
        })?;

        info!(%loan, due = %renewed.due_date, renewals = renewed.renewals, %actor, "library loan renewed");
        Ok(renewed)
    }

    /// Close an open loan, recording the fine and return date. Good copies go back
    /// on the shelf.
    pub fn return_loan(
        &self,
        actor: Actor,
        loan: LoanId,
        request: ReturnRequest,
    ) -> Result<Loan, RecordsError> {
        request.validate()?;
        let closed = self.ctx.commit(|tables, _| {
            let current = tables.loans.fetch(loan)?;
            let status = match request.condition {
                ReturnCondition::Good => LoanStatus::Returned,
                ReturnCondition::Damaged => LoanStatus::Damaged,
                ReturnCondition::Lost => LoanStatus::Lost,
            };
            if !current.status.is_open() {
                return Err(RecordsError::transition(
                    "library loan",
                    current.status.label(),
                    status.label(),
                ));
            }
            ordered(
                "borrowed_on",
                current.borrowed_at.date_naive(),
                "returned_on",
                request.returned_on,
            )?;
            let resource = current.resource;

            tables.loans.update(loan, |row| {
                row.status = status;
                row.return_date = Some(request.returned_on);
                row.fine_amount = request.fine_amount;
                if !request.remarks.is_empty() {
                    row.remarks = request.remarks;
                }
            })?;
            if request.condition == ReturnCondition::Good {
                tables.library_resources.update(resource, |row| {
                    row.available_copies = (row.available_copies + 1).min(row.total_copies);
                })?;
            } else {
                tables.library_resources.update(resource, |row| {
                    row.total_copies = row.total_copies.saturating_sub(1);
                })?;
            }
            Ok(tables.loans.fetch(loan)?.clone())
        })?;

        info!(
            %loan,
            status = closed.status.label(),
            fine = %closed.fine_amount,
            %actor,
            "library loan closed"
        );
        Ok(closed)
    }

    /// Flag every active loan due before `today` as overdue. Returns how many moved.
    pub fn mark_overdue(&self, actor: Actor, today: NaiveDate) -> Result<usize, RecordsError> {
        let flagged = self.ctx.commit(|tables, _| {
            let due: Vec<LoanId> = tables
                .loans
                .filter(|row| row.status == LoanStatus::Active && row.due_date < today)
                .map(|row| row.id)
                .collect();
            for loan in &due {
                tables
                    .loans
                    .update(*loan, |row| row.status = LoanStatus::Overdue)?;
            }
            Ok(due.len())
        })?;

        info!(flagged, %today, %actor, "overdue loans flagged");
        Ok(flagged)
    }

    pub fn resource(&self, resource: LibraryResourceId) -> Result<LibraryResource, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.library_resources.fetch(resource)?.clone()))
    }

    pub fn loans_of(&self, borrower: UserId) -> Result<Vec<Loan>, RecordsError> {
        debug!(%borrower, "listing library loans");
        self.ctx.query(|tables| {
            tables
                .loans
                .filter(|row| row.borrower == borrower)
                .cloned()
                .collect()
        })
    }
}
