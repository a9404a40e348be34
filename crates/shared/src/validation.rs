//! Field validators shared by request DTOs.
//!
//! These plug into `#[validate(custom(function = "..."))]`.

use rust_decimal::{Decimal, RoundingStrategy};
use validator::ValidationError;

/// Minimum password length for journal accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Largest amount a `NUMERIC(12, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Requires at least 8 characters with an uppercase letter, a lowercase
/// letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(error(
            "password_length",
            "Password must be at least 8 characters",
        ));
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_upper && has_lower && has_digit {
        Ok(())
    } else {
        Err(error(
            "password_strength",
            "Password must contain uppercase, lowercase and a digit",
        ))
    }
}

/// Money amounts (bills, dish prices) must be non-negative and fit the
/// storage column once rounded to cents.
pub fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        return Err(error("amount_range", "Amount must be a non-negative number"));
    }
    if amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) > MAX_AMOUNT {
        return Err(error("amount_too_large", "Amount is too large"));
    }
    Ok(())
}

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "Value must not be blank"))
    } else {
        Ok(())
    }
}
