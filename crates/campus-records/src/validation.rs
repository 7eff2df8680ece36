use std::fmt::Display;

use rust_decimal::Decimal;

use crate::records_error::Violation;

pub(crate) fn in_range<T>(field: &'static str, value: T, min: T, max: T) -> Result<(), Violation>
where
    T: PartialOrd + Display + Copy,
{
    if value < min || value > max {
        return Err(Violation::out_of_range(field, min, max, value));
    }
    Ok(())
}

pub(crate) fn required(field: &'static str, value: &str) -> Result<(), Violation> {
    if value.trim().is_empty() {
        return Err(Violation::Required { field });
    }
    Ok(())
}

pub(crate) fn non_negative(field: &'static str, value: Decimal) -> Result<(), Violation> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Violation::Negative { field });
    }
    Ok(())
}

pub(crate) fn positive_amount(value: Decimal) -> Result<(), Violation> {
    if value <= Decimal::ZERO {
        return Err(Violation::NonPositiveAmount);
    }
    Ok(())
}

pub(crate) fn ordered<T: PartialOrd>(
    start_field: &'static str,
    start: T,
    end_field: &'static str,
    end: T,
) -> Result<(), Violation> {
    if start > end {
        return Err(Violation::DateOrder {
            start_field,
            end_field,
        });
    }
    Ok(())
}

/// Codes are compared case-insensitively, so they are stored upper-cased and trimmed.
pub(crate) fn normalise_code(field: &'static str, code: &str) -> Result<String, Violation> {
    let trimmed = code.trim();
    required(field, trimmed)?;
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(Violation::InvalidFormat {
            field,
            value: code.to_string(),
        });
    }
    Ok(trimmed.to_ascii_uppercase())
}
