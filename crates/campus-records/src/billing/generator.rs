//! Batch creation of fee structures for every programme year and semester.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{FeeComponents, NewFeeStructure};
use super::service::{insert_fee_structure, BillingService};
use crate::events::EventPublisher;
use crate::ids::{AcademicYearId, Actor};
use crate::records_error::RecordsError;
use crate::store::Database;

/// Charges applied to each generated structure. The graduation fee is only billed in
/// the final year of a programme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeTemplate {
    pub components: FeeComponents,
    #[serde(default)]
    pub government_subsidy: Decimal,
    #[serde(default)]
    pub scholarship_amount: Decimal,
}

impl Default for FeeTemplate {
    fn default() -> Self {
        Self {
            components: FeeComponents {
                tuition: dec!(50000),
                registration: dec!(1500),
                examination: dec!(2000),
                library: dec!(1000),
                laboratory: dec!(2500),
                fieldwork: dec!(3000),
                technology: dec!(1000),
                accommodation: dec!(6000),
                meals: dec!(4000),
                medical: dec!(1200),
                insurance: dec!(800),
                student_union: dec!(500),
                sports: dec!(600),
                graduation: dec!(5000),
                other: Decimal::ZERO,
            },
            government_subsidy: Decimal::ZERO,
            scholarship_amount: Decimal::ZERO,
        }
    }
}

impl FeeTemplate {
    fn components_for(&self, year: u8, duration_years: u8) -> FeeComponents {
        let mut components = self.components;
        if year < duration_years {
            components.graduation = Decimal::ZERO;
        }
        components
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub created: usize,
    pub skipped: usize,
}

impl<D, E> BillingService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    /// Get-or-create a structure for each (programme, year, semester) of the active
    /// programmes in one academic year. Existing structures are left untouched.
    pub fn generate_fee_structures(
        &self,
        actor: Actor,
        academic_year: AcademicYearId,
        template: &FeeTemplate,
    ) -> Result<GenerationReport, RecordsError> {
        let report = self.context().commit(|tables, _| {
            tables.academic_years.fetch(academic_year)?;
            let programmes: Vec<_> = tables
                .programmes
                .filter(|programme| programme.is_active)
                .map(|programme| {
                    (
                        programme.id,
                        programme.duration_years,
                        programme.semesters_per_year,
                    )
                })
                .collect();

            let mut report = GenerationReport::default();
            for (programme, duration, semesters) in programmes {
                for year in 1..=duration {
                    for semester in 1..=semesters {
                        let exists = tables
                            .fee_structures
                            .find(|row| {
                                row.covers(programme, academic_year, year) && row.semester == semester
                            })
                            .is_some();
                        if exists {
                            report.skipped += 1;
                            continue;
                        }
                        insert_fee_structure(
                            tables,
                            NewFeeStructure {
                                programme,
                                academic_year,
                                year,
                                semester,
                                components: template.components_for(year, duration),
                                government_subsidy: template.government_subsidy,
                                scholarship_amount: template.scholarship_amount,
                            },
                        )?;
                        report.created += 1;
                    }
                }
            }
            Ok(report)
        })?;

        info!(
            %academic_year,
            created = report.created,
            skipped = report.skipped,
            %actor,
            "fee structures generated"
        );
        Ok(report)
    }
}
