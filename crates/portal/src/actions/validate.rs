//! Coercion and validation of submitted form fields.
//!
//! Forms deliver every field as a string. A [`Validator`] coerces each one,
//! recording a message per failing field, and [`Validator::finish`] turns
//! the collected messages into one [`ActionError::Validation`]. Coercions
//! that fail return a placeholder so callers can keep going and report every
//! bad field at once; placeholders never reach the store because `finish`
//! fails first.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use warehub_core::Email;

use super::{ActionError, FieldErrors};

/// Longest accepted single-line text field.
pub const MAX_TEXT_LENGTH: usize = 255;
/// Longest accepted multi-line text field.
pub const MAX_LONG_TEXT_LENGTH: usize = 5000;

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field` unless one is already recorded.
    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_owned())
            .or_insert_with(|| message.into());
    }

    /// Record an error when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.fail(field, message);
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// A required single-line text field, trimmed.
    pub fn required(&mut self, field: &str, label: &str, raw: &str) -> String {
        let value = raw.trim();
        if value.is_empty() {
            self.fail(field, format!("{label} is required"));
        } else if value.chars().count() > MAX_TEXT_LENGTH {
            self.fail(
                field,
                format!("{label} must be at most {MAX_TEXT_LENGTH} characters"),
            );
        }
        value.to_owned()
    }

    /// A required free-text body.
    pub fn required_long(&mut self, field: &str, label: &str, raw: &str) -> String {
        let value = raw.trim();
        if value.is_empty() {
            self.fail(field, format!("{label} is required"));
        } else if value.chars().count() > MAX_LONG_TEXT_LENGTH {
            self.fail(
                field,
                format!("{label} must be at most {MAX_LONG_TEXT_LENGTH} characters"),
            );
        }
        value.to_owned()
    }

    /// An optional text field. Blank becomes `None`.
    pub fn optional(&mut self, field: &str, label: &str, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        if value.chars().count() > MAX_LONG_TEXT_LENGTH {
            self.fail(
                field,
                format!("{label} must be at most {MAX_LONG_TEXT_LENGTH} characters"),
            );
        }
        Some(value.to_owned())
    }

    /// A whole number greater than zero.
    pub fn positive_int(&mut self, field: &str, label: &str, raw: &str) -> i32 {
        match raw.trim().parse::<i32>() {
            Ok(n) if n > 0 => n,
            _ => {
                self.fail(field, format!("{label} must be a positive whole number"));
                0
            }
        }
    }

    /// A decimal amount greater than zero.
    pub fn positive_decimal(&mut self, field: &str, label: &str, raw: &str) -> Decimal {
        match parse_decimal(raw) {
            Some(n) if n > Decimal::ZERO => n,
            _ => {
                self.fail(field, format!("{label} must be greater than zero"));
                Decimal::ZERO
            }
        }
    }

    /// A decimal amount of zero or more. Blank means zero.
    pub fn non_negative_decimal(&mut self, field: &str, label: &str, raw: &str) -> Decimal {
        if raw.trim().is_empty() {
            return Decimal::ZERO;
        }
        match parse_decimal(raw) {
            Some(n) if n >= Decimal::ZERO => n,
            _ => {
                self.fail(field, format!("{label} cannot be negative"));
                Decimal::ZERO
            }
        }
    }

    /// A calendar date in `YYYY-MM-DD` form.
    pub fn date(&mut self, field: &str, label: &str, raw: &str) -> NaiveDate {
        let value = raw.trim();
        if value.is_empty() {
            self.fail(field, format!("{label} is required"));
            return NaiveDate::default();
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|_| {
            self.fail(field, format!("{label} must be a date (YYYY-MM-DD)"));
            NaiveDate::default()
        })
    }

    /// A required email address, normalized.
    pub fn email(&mut self, field: &str, raw: &str) -> Option<Email> {
        match Email::parse(raw) {
            Ok(email) => Some(email),
            Err(e) => {
                self.fail(field, e.to_string());
                None
            }
        }
    }

    /// A required enum value or typed id.
    pub fn parse<T: FromStr>(&mut self, field: &str, label: &str, raw: &str) -> Option<T> {
        let value = raw.trim();
        if value.is_empty() {
            self.fail(field, format!("{label} is required"));
            return None;
        }
        value.parse().map_or_else(
            |_| {
                self.fail(field, format!("{label} is not valid"));
                None
            },
            Some,
        )
    }

    /// An enum value that falls back to `default` when blank.
    pub fn parse_or<T: FromStr>(&mut self, field: &str, label: &str, raw: &str, default: T) -> T {
        if raw.trim().is_empty() {
            return default;
        }
        self.parse(field, label, raw).unwrap_or(default)
    }

    /// An optional enum value or typed id. Blank becomes `None`.
    pub fn parse_optional<T: FromStr>(&mut self, field: &str, label: &str, raw: &str) -> Option<T> {
        if raw.trim().is_empty() {
            return None;
        }
        self.parse(field, label, raw)
    }

    /// Fail with every recorded error, if any.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when any field failed.
    pub fn finish(self) -> Result<(), ActionError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ActionError::Validation(self.errors))
        }
    }
}

/// Parse a money or size amount. Thousands separators are tolerated.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use warehub_core::{SpaceStatus, StorageType};

    use super::*;

    #[test]
    fn test_capacity_is_coerced() {
        let mut v = Validator::new();
        assert_eq!(v.positive_int("capacity", "Capacity", " 250 "), 250);
        assert!(v.is_valid());
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        let mut v = Validator::new();
        v.positive_int("capacity", "Capacity", "-1");
        let Err(ActionError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("capacity").map(String::as_str),
            Some("Capacity must be a positive whole number")
        );
    }

    #[test]
    fn test_every_bad_field_is_reported() {
        let mut v = Validator::new();
        v.required("name", "Name", "  ");
        v.positive_decimal("rate", "Rate", "abc");
        v.date("startDate", "Start date", "31/12/2025");
        let Err(ActionError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_first_error_per_field_wins() {
        let mut v = Validator::new();
        v.fail("email", "first");
        v.fail("email", "second");
        let Err(ActionError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("email").map(String::as_str), Some("first"));
    }

    #[test]
    fn test_decimal_accepts_thousands_separator() {
        let mut v = Validator::new();
        assert_eq!(
            v.positive_decimal("rate", "Rate", "1,250.50"),
            Decimal::new(125_050, 2)
        );
        assert_eq!(v.non_negative_decimal("deposit", "Deposit", ""), Decimal::ZERO);
        assert!(v.is_valid());
    }

    #[test]
    fn test_enums_parse_from_form_spelling() {
        let mut v = Validator::new();
        assert_eq!(
            v.parse::<StorageType>("storageType", "Storage type", "cold_storage"),
            Some(StorageType::ColdStorage)
        );
        assert_eq!(
            v.parse_or("status", "Status", "", SpaceStatus::Available),
            SpaceStatus::Available
        );
        assert!(v.is_valid());
        assert_eq!(v.parse::<SpaceStatus>("status", "Status", "LEASED"), None);
        assert!(!v.is_valid());
    }
}
