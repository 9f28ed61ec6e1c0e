//! Extractor aliases whose rejections fold into [`ApiError`].
//!
//! Validation goes through `axum-valid`; `WithRejection` swaps axum's plain
//! text rejections for the JSON error body every other failure uses.

use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use axum_extra::extract::WithRejection;
use axum_valid::{Valid, ValidRejection, ValidationRejection};

use crate::error::ApiError;

/// JSON body that passed `validator` checks.
pub type ValidJson<T> = WithRejection<Valid<Json<T>>, ApiError>;

/// Query string that passed `validator` checks.
pub type ValidQuery<T> = WithRejection<Valid<Query<T>>, ApiError>;

/// Numeric id taken from the route.
pub type IdPath = WithRejection<Path<i32>, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation("id", rejection.body_text())
    }
}

impl<E> From<ValidRejection<E>> for ApiError
where
    E: Into<ApiError>,
{
    fn from(rejection: ValidRejection<E>) -> Self {
        match rejection {
            ValidationRejection::Valid(errors) => errors.into(),
            ValidationRejection::Inner(inner) => inner.into(),
        }
    }
}

/// Field rules shared by the request bodies.
pub mod rules {
    use std::borrow::Cow;

    use chrono::{Datelike, NaiveDate};
    use rust_decimal::Decimal;
    use validator::ValidationError;

    fn fail(code: &'static str, message: &'static str) -> ValidationError {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Borrowed(message));
        error
    }

    pub fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
        if amount.is_sign_positive() && !amount.is_zero() {
            Ok(())
        } else {
            Err(fail("positive", "must be greater than zero"))
        }
    }

    pub fn alphanumeric(value: &str) -> Result<(), ValidationError> {
        if value.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(())
        } else {
            Err(fail("alphanumeric", "must only contain letters and digits"))
        }
    }

    /// `#RRGGBB` in either case.
    pub fn hex_color(value: &str) -> Result<(), ValidationError> {
        let valid = value.len() == 7
            && value.starts_with('#')
            && value[1..].chars().all(|c| c.is_ascii_hexdigit());
        if valid {
            Ok(())
        } else {
            Err(fail("hex_color", "must be a #RRGGBB color"))
        }
    }

    /// Calendar dates outside this span are refused.
    pub const MIN_YEAR: i32 = 1900;
    pub const MAX_YEAR: i32 = 2100;

    pub fn supported_date(date: &NaiveDate) -> Result<(), ValidationError> {
        if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
            Ok(())
        } else {
            Err(fail("date_range", "must be a date between 1900 and 2100"))
        }
    }

    pub fn currency_code(value: &str) -> Result<(), ValidationError> {
        if common::is_iso_currency(value) {
            Ok(())
        } else {
            Err(fail("currency", "must be a 3-letter ISO 4217 currency code"))
        }
    }

}
