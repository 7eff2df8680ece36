//! Grade derivation and recording.

pub mod derivation;
pub mod domain;
mod import;
mod service;

pub use derivation::{
    band_for, derive, derive_override, Derived, GradeLetter, Marks, CAT_WEIGHT, FINAL_WEIGHT,
    PASS_MARK, PRACTICAL_WEIGHT, PROJECT_WEIGHT,
};
pub(crate) use derivation::round2;
pub use domain::{Grade, GradeEntry, GradeOverride};
pub use import::{ImportFailure, ImportReport, ImportedGrade, MARKS_SHEET_HEADER};
pub use service::GradingService;
