use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AcademicYearId, FeePaymentId, FeeStructureId, ProgrammeId, StudentId, UserId};
use crate::records_error::{Conflict, Precondition, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, non_negative};

/// The fifteen named charges of a fee structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeComponents {
    pub tuition: Decimal,
    pub registration: Decimal,
    pub examination: Decimal,
    pub library: Decimal,
    pub laboratory: Decimal,
    pub fieldwork: Decimal,
    pub technology: Decimal,
    pub accommodation: Decimal,
    pub meals: Decimal,
    pub medical: Decimal,
    pub insurance: Decimal,
    pub student_union: Decimal,
    pub sports: Decimal,
    pub graduation: Decimal,
    pub other: Decimal,
}

impl FeeComponents {
    pub fn entries(&self) -> [(&'static str, Decimal); 15] {
        [
            ("tuition", self.tuition),
            ("registration", self.registration),
            ("examination", self.examination),
            ("library", self.library),
            ("laboratory", self.laboratory),
            ("fieldwork", self.fieldwork),
            ("technology", self.technology),
            ("accommodation", self.accommodation),
            ("meals", self.meals),
            ("medical", self.medical),
            ("insurance", self.insurance),
            ("student_union", self.student_union),
            ("sports", self.sports),
            ("graduation", self.graduation),
            ("other", self.other),
        ]
    }

    pub fn total(&self) -> Decimal {
        self.entries().iter().map(|(_, amount)| *amount).sum()
    }

    pub fn validate(&self) -> Result<(), Violation> {
        for (field, amount) in self.entries() {
            non_negative(field, amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeeStructure {
    pub programme: ProgrammeId,
    pub academic_year: AcademicYearId,
    pub year: u8,
    pub semester: u8,
    pub components: FeeComponents,
    #[serde(default)]
    pub government_subsidy: Decimal,
    #[serde(default)]
    pub scholarship_amount: Decimal,
}

impl NewFeeStructure {
    pub fn validate(&self) -> Result<(), Violation> {
        in_range("year", self.year, 1, 8)?;
        in_range("semester", self.semester, 1, 3)?;
        self.components.validate()?;
        non_negative("government_subsidy", self.government_subsidy)?;
        non_negative("scholarship_amount", self.scholarship_amount)?;
        Ok(())
    }

    /// Net fee must not go below zero once aid is applied.
    pub fn check_net_fee(&self) -> Result<Decimal, Precondition> {
        let net = self.components.total() - self.government_subsidy - self.scholarship_amount;
        if net < Decimal::ZERO {
            return Err(Precondition::NegativeNetFee { net });
        }
        Ok(net)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub id: FeeStructureId,
    pub programme: ProgrammeId,
    pub academic_year: AcademicYearId,
    pub year: u8,
    pub semester: u8,
    pub components: FeeComponents,
    pub government_subsidy: Decimal,
    pub scholarship_amount: Decimal,
}

impl FeeStructure {
    pub fn total_fee(&self) -> Decimal {
        self.components.total()
    }

    pub fn net_fee(&self) -> Decimal {
        self.total_fee() - self.government_subsidy - self.scholarship_amount
    }

    pub fn covers(&self, programme: ProgrammeId, academic_year: AcademicYearId, year: u8) -> bool {
        self.programme == programme && self.academic_year == academic_year && self.year == year
    }
}

impl Constrained for FeeStructure {
    const ENTITY: &'static str = "fee structure";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateFeeStructure,
            format!(
                "{}:{}:Y{}S{}",
                self.programme, self.academic_year, self.year, self.semester
            ),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Mpesa,
    BankTransfer,
    Cash,
    Cheque,
    BankersCheque,
    Online,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
    Refunded,
    Partial,
}

impl PaymentStatus {
    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Reversed => "reversed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Partial => "partial",
        }
    }
}

/// External references attached to a payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentReferences {
    pub transaction_reference: String,
    pub mpesa_receipt: String,
    pub bank_slip_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePayment {
    pub id: FeePaymentId,
    pub student: StudentId,
    pub fee_structure: FeeStructureId,
    pub receipt_number: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub references: PaymentReferences,
    pub remarks: String,
    pub processed_by: Option<UserId>,
    /// Surplus over the balance was accepted when the payment was recorded.
    #[serde(default)]
    pub allow_overpay: bool,
    /// Set on reversal, refund and surplus rows: the payment they offset.
    pub compensates: Option<FeePaymentId>,
}

impl FeePayment {
    pub fn is_compensation(&self) -> bool {
        self.compensates.is_some()
    }

    /// Signed contribution to paid-to-date.
    pub fn ledger_amount(&self) -> Decimal {
        match (self.status, self.compensates) {
            (PaymentStatus::Completed, None) => self.amount,
            (PaymentStatus::Reversed | PaymentStatus::Refunded, Some(_)) => -self.amount,
            _ => Decimal::ZERO,
        }
    }
}

impl Constrained for FeePayment {
    const ENTITY: &'static str = "fee payment";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateReceipt,
            self.receipt_number.clone(),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub student: StudentId,
    pub fee_structure: FeeStructureId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub receipt_number: String,
    #[serde(default)]
    pub references: PaymentReferences,
    #[serde(default)]
    pub remarks: String,
    /// Accept amounts above the balance; the surplus is booked as a refund row.
    #[serde(default)]
    pub allow_overpay: bool,
    /// Record as pending until the channel confirms (mobile money, cheques).
    #[serde(default)]
    pub pending: bool,
}

/// Aggregate standing of a student against one fee structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Paid,
    Partial,
    Pending,
}

impl FeeStatus {
    pub fn classify(paid: Decimal, due: Decimal) -> Self {
        if paid >= due {
            FeeStatus::Paid
        } else if paid > Decimal::ZERO {
            FeeStatus::Partial
        } else {
            FeeStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeAccount {
    pub fee_structure: FeeStructureId,
    pub academic_year: String,
    pub year: u8,
    pub semester: u8,
    pub total_fee: Decimal,
    pub government_subsidy: Decimal,
    pub scholarship_amount: Decimal,
    pub net_fee: Decimal,
    pub paid_to_date: Decimal,
    pub balance: Decimal,
    pub status: FeeStatus,
    pub payments: Vec<FeePayment>,
}

/// Fee statement across every structure the student has been billed against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeStatement {
    pub student: StudentId,
    pub student_number: String,
    pub accounts: Vec<FeeAccount>,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub total_balance: Decimal,
}

/// Receipt prefix a caller-supplied receipt must carry: `FEE<YY><last4>S<sem>`.
pub fn receipt_prefix(start_year: i32, student_suffix: &str, semester: u8) -> String {
    format!(
        "FEE{:02}{}S{}",
        start_year.rem_euclid(100),
        student_suffix,
        semester
    )
}

pub fn check_receipt(receipt: &str, prefix: &str) -> Result<(), Violation> {
    let matches = receipt
        .strip_prefix(prefix)
        .is_some_and(|tail| tail.len() == 3 && tail.bytes().all(|b| b.is_ascii_digit()));
    if !matches {
        return Err(Violation::Mismatch {
            field: "receipt_number",
            expected: format!("{prefix}NNN"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn structure(tuition: Decimal, others: Decimal, subsidy: Decimal) -> NewFeeStructure {
        NewFeeStructure {
            programme: ProgrammeId(1),
            academic_year: AcademicYearId(1),
            year: 1,
            semester: 1,
            components: FeeComponents {
                tuition,
                registration: others,
                ..FeeComponents::default()
            },
            government_subsidy: subsidy,
            scholarship_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn net_fee_subtracts_aid_from_the_component_total() {
        let new = structure(dec!(60000), dec!(20000), dec!(30000));
        assert_eq!(new.components.total(), dec!(80000));
        assert_eq!(new.check_net_fee(), Ok(dec!(50000)));
    }

    #[test]
    fn aid_above_the_total_is_rejected() {
        let new = structure(dec!(10000), Decimal::ZERO, dec!(12000));
        assert_eq!(
            new.check_net_fee(),
            Err(Precondition::NegativeNetFee { net: dec!(-2000) })
        );
    }

    #[test]
    fn negative_components_fail_validation() {
        let mut new = structure(dec!(1000), Decimal::ZERO, Decimal::ZERO);
        new.components.sports = dec!(-1);
        assert_eq!(
            new.validate(),
            Err(Violation::Negative { field: "sports" })
        );
    }

    #[test]
    fn receipts_follow_the_year_student_semester_layout() {
        let prefix = receipt_prefix(2024, "0042", 1);
        assert_eq!(prefix, "FEE240042S1");
        assert!(check_receipt("FEE240042S1007", &prefix).is_ok());
        assert!(check_receipt("FEE240042S17", &prefix).is_err());
        assert!(check_receipt("FEE250042S1007", &prefix).is_err());
    }

    #[test]
    fn fee_status_follows_paid_to_date() {
        assert_eq!(FeeStatus::classify(dec!(0), dec!(50000)), FeeStatus::Pending);
        assert_eq!(FeeStatus::classify(dec!(30000), dec!(50000)), FeeStatus::Partial);
        assert_eq!(FeeStatus::classify(dec!(50000), dec!(50000)), FeeStatus::Paid);
    }
}
