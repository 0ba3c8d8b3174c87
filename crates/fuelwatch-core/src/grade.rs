use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The closed set of fuel grades the listing publishes.
///
/// Anything else coming off the scraper is rejected at the ingestion
/// boundary rather than threaded through the pipeline as a free-text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum FuelGrade {
    Grade95,
    Grade98,
    Diesel,
}

impl FuelGrade {
    /// Every grade, in the order the listing page presents them.
    pub const ALL: [FuelGrade; 3] = [FuelGrade::Grade95, FuelGrade::Grade98, FuelGrade::Diesel];

    /// Canonical label, as printed by the listing and stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FuelGrade::Grade95 => "95 E10",
            FuelGrade::Grade98 => "98 E5",
            FuelGrade::Diesel => "Diesel",
        }
    }
}

impl std::fmt::Display for FuelGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelGrade {
    type Err = CoreError;

    /// Accepts the canonical label plus the short forms users type
    /// (`95`, `e10`, `grade98`, `DIESEL`). Case, spaces, `-` and `_` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "95e10" | "95" | "e10" | "grade95" => Ok(FuelGrade::Grade95),
            "98e5" | "98" | "e5" | "grade98" => Ok(FuelGrade::Grade98),
            "diesel" => Ok(FuelGrade::Diesel),
            _ => Err(CoreError::UnknownGrade(s.to_owned())),
        }
    }
}

impl TryFrom<String> for FuelGrade {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FuelGrade> for &'static str {
    fn from(grade: FuelGrade) -> Self {
        grade.as_str()
    }
}
