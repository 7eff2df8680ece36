//! Student affairs: clearances, special exams and deferments of study.

pub mod domain;
mod service;

pub use domain::{
    deferment_end, ClearanceAction, ClearanceAssessment, ClearanceDecision, ClearanceRequest,
    ClearanceScope, ClearanceStatus, ClearanceType, DefermentApplication, DefermentDecision,
    DefermentStatus, DefermentType, ExamSitting, NewClearanceRequest, NewDefermentApplication,
    NewSpecialExamApplication, SpecialExamAction, SpecialExamApplication, SpecialExamStatus,
    SpecialExamType,
};
pub use service::StudentAffairsService;
