use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Coordinates, CoreError, FuelGrade};

const MAX_EMAIL_LEN: usize = 254;

/// Where a subscriber is based, used only to rank stations by distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Free-text address the coordinates were resolved from, when known.
    pub address: Option<String>,
}

impl SubscriberLocation {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A stored alert subscription, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub email: String,
    pub threshold: Decimal,
    pub grade: FuelGrade,
    pub location: Option<SubscriberLocation>,
}

/// A validated subscribe request. Writing it replaces any existing
/// subscription for the same email wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub email: String,
    pub threshold: Decimal,
    pub grade: FuelGrade,
}

impl NewSubscription {
    /// Validates and normalizes a subscription.
    ///
    /// The email is trimmed and lowercased so the registry key is stable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a malformed email or a
    /// non-positive threshold.
    pub fn new(email: &str, threshold: Decimal, grade: FuelGrade) -> Result<Self, CoreError> {
        let email = normalize_email(email)?;
        if threshold <= Decimal::ZERO {
            return Err(CoreError::validation(
                "threshold",
                format!("must be greater than zero, got {threshold}"),
            ));
        }
        Ok(Self {
            email,
            threshold,
            grade,
        })
    }

    /// Builds a subscription from loosely-typed request input, reporting the
    /// first missing or invalid field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when a field is missing or invalid,
    /// or [`CoreError::UnknownGrade`] when the grade is not recognized.
    pub fn from_input(
        email: Option<&str>,
        threshold: Option<Decimal>,
        grade: Option<&str>,
    ) -> Result<Self, CoreError> {
        let email = email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| CoreError::validation("email", "is required"))?;
        let threshold = threshold.ok_or_else(|| CoreError::validation("threshold", "is required"))?;
        let grade = grade
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| CoreError::validation("grade", "is required"))?
            .parse::<FuelGrade>()?;
        Self::new(email, threshold, grade)
    }
}

/// Trims and lowercases an email, checking it has the `local@domain` shape.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the address is empty, too long, or
/// not of the form `local@domain`.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(CoreError::validation("email", "is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(CoreError::validation(
            "email",
            format!("must be at most {MAX_EMAIL_LEN} characters"),
        ));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::validation(
            "email",
            format!("'{email}' is not a valid email address"),
        ));
    }
    Ok(email)
}
