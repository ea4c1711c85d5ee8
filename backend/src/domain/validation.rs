//! Input checks shared by every service that takes money or text from a caller.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::errors::{LedgerError, LedgerResult};

pub const MAX_TEXT_LENGTH: usize = 256;
pub const MAX_DECIMAL_PLACES: u32 = 2;

/// Amounts must be positive and carry at most two decimal places
pub fn validate_amount(field: &str, amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!("{} must be positive", field)));
    }
    if amount.normalize().scale() > MAX_DECIMAL_PLACES {
        return Err(LedgerError::validation(format!(
            "{} has too many decimal places (at most {})",
            field, MAX_DECIMAL_PLACES
        )));
    }
    Ok(())
}

/// Non-empty after trimming and at most 256 characters; returns the trimmed text
pub fn validate_text(field: &str, value: &str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        return Err(LedgerError::validation(format!(
            "{} cannot exceed {} characters",
            field, MAX_TEXT_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Due dates must leave room for day arithmetic on both sides
pub fn validate_due_date(due_date: Option<NaiveDate>) -> LedgerResult<()> {
    match due_date {
        Some(due) if due.pred_opt().is_none() || due.succ_opt().is_none() => Err(
            LedgerError::validation(format!("Due date {} is out of range", due)),
        ),
        _ => Ok(()),
    }
}

pub fn validate_owner(owner: &str) -> LedgerResult<()> {
    if owner.trim().is_empty() {
        return Err(LedgerError::validation("Owner cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_rules() {
        assert!(validate_amount("Amount", dec!(10.25)).is_ok());
        assert!(validate_amount("Amount", dec!(10.250)).is_ok());
        assert!(validate_amount("Amount", dec!(0)).is_err());
        assert!(validate_amount("Amount", dec!(-3)).is_err());
        assert!(validate_amount("Amount", dec!(1.005)).is_err());
    }

    #[test]
    fn test_text_is_trimmed_and_bounded() {
        assert_eq!(validate_text("Title", "  Rent ").unwrap(), "Rent");
        assert!(validate_text("Title", "   ").is_err());
        assert!(validate_text("Title", &"x".repeat(257)).is_err());
    }

    #[test]
    fn test_due_date_must_not_sit_on_the_calendar_edge() {
        assert!(validate_due_date(None).is_ok());
        assert!(validate_due_date(NaiveDate::from_ymd_opt(2025, 6, 1)).is_ok());
        assert!(validate_due_date(Some(NaiveDate::MIN)).is_err());
        assert!(validate_due_date(Some(NaiveDate::MAX)).is_err());
    }
}
