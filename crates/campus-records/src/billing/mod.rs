//! Fee structures, payments and reconciliation.

pub mod domain;
mod generator;
mod service;

pub use domain::{
    check_receipt, receipt_prefix, FeeAccount, FeeComponents, FeePayment, FeeStatement,
    FeeStatus, FeeStructure, NewFeeStructure, PaymentMethod, PaymentReferences, PaymentRequest,
    PaymentStatus,
};
pub use generator::{FeeTemplate, GenerationReport};
pub use service::BillingService;
pub(crate) use service::{build_statement, fees_cleared};
