use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-negative, finite repair area.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct SquareMeters(f64);

impl SquareMeters {
    pub const ZERO: Self = Self(0.0);

    pub fn new(value: f64) -> Result<Self, MeasurementError> {
        if !value.is_finite() {
            return Err(MeasurementError::NotFinite);
        }
        if value < 0.0 {
            return Err(MeasurementError::Negative(value));
        }
        // Normalize -0.0 so downstream costs never print a negative zero.
        Ok(Self(value + 0.0))
    }

    pub const fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for SquareMeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} m²", self.0)
    }
}

impl<'de> Deserialize<'de> for SquareMeters {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        SquareMeters::new(raw).map_err(serde::de::Error::custom)
    }
}

/// How area text that does not describe a valid measurement is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidInputPolicy {
    /// Surface a validation error and refuse to commit.
    #[default]
    Reject,
    /// Treat the input as zero area, matching the legacy dashboard.
    CoerceToZero,
}

impl InvalidInputPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reject" | "strict" => Some(Self::Reject),
            "zero" | "coerce" | "coerce_to_zero" => Some(Self::CoerceToZero),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::CoerceToZero => "zero",
        }
    }

    /// Resolves user-entered text into an area under this policy.
    pub fn resolve(self, raw: &str) -> Result<SquareMeters, MeasurementError> {
        match (parse_area(raw), self) {
            (Ok(area), _) => Ok(area),
            (Err(_), Self::CoerceToZero) => Ok(SquareMeters::ZERO),
            (Err(err), Self::Reject) => Err(err),
        }
    }
}

/// Strict parse of an area field. Surrounding whitespace is ignored.
pub fn parse_area(raw: &str) -> Result<SquareMeters, MeasurementError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MeasurementError::Empty);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| MeasurementError::Unparseable(trimmed.to_string()))?;
    SquareMeters::new(value)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeasurementError {
    #[error("area is required")]
    Empty,
    #[error("'{0}' is not a number")]
    Unparseable(String),
    #[error("area cannot be negative (got {0})")]
    Negative(f64),
    #[error("area must be a finite number")]
    NotFinite,
}
