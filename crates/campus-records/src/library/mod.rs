//! Library catalogue and loans.

pub mod domain;
mod service;

pub use domain::{
    BorrowRequest, LibraryResource, Loan, LoanStatus, NewLibraryResource, ResourceType,
    ReturnCondition, ReturnRequest,
};
pub use service::LibraryService;
