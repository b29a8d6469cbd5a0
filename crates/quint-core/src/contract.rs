//! Implementation contracts carried by decision records.
//!
//! A contract is a small structured document the deciding agent attaches to
//! a DRR: the invariants an implementation must hold, the anti-patterns it
//! must avoid, the acceptance criteria that gate resolution, and the file
//! scope the decision affects. Characteristics are named measurements
//! recorded alongside a decision, read-only once written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ParseError;

/// Errors from parsing contract or characteristic documents.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The document is not valid JSON of the expected shape.
    #[error("contract is not a valid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// The implementation contract of a decision record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Conditions that must hold in the implementation.
    #[serde(default)]
    pub invariants: Vec<String>,
    /// Shapes the implementation must not contain.
    #[serde(default)]
    pub anti_patterns: Vec<String>,
    /// Checks that gate `resolution=implemented`.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// File patterns the decision affects.
    #[serde(default)]
    pub affected_scope: Vec<String>,
}

impl Contract {
    /// Parses a contract from its JSON document form.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] when the input is not a JSON object
    /// of the contract shape.
    pub fn parse(document: &str) -> Result<Self, ContractError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Whether the contract carries no constraints at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
            && self.anti_patterns.is_empty()
            && self.acceptance_criteria.is_empty()
            && self.affected_scope.is_empty()
    }
}

/// Measurement scale of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Ordered categories.
    Ordinal,
    /// Ratio scale with a true zero.
    Ratio,
    /// Interval scale without a true zero.
    Interval,
    /// Unordered categories.
    Nominal,
}

impl Scale {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordinal => "ordinal",
            Self::Ratio => "ratio",
            Self::Interval => "interval",
            Self::Nominal => "nominal",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordinal" => Ok(Self::Ordinal),
            "ratio" => Ok(Self::Ratio),
            "interval" => Ok(Self::Interval),
            "nominal" => Ok(Self::Nominal),
            _ => Err(ParseError::new("scale", s)),
        }
    }
}

/// A named measurement attached to a holon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    /// Measurement name.
    pub name: String,
    /// Measurement scale.
    pub scale: Scale,
    /// Recorded value, kept textual.
    pub value: String,
    /// Unit of the value, if any.
    #[serde(default)]
    pub unit: Option<String>,
}

/// Parses a JSON array of characteristics.
///
/// # Errors
///
/// Returns [`ContractError::Json`] when the input is not a JSON array of
/// `{name, scale, value, unit?}` objects.
pub fn parse_characteristics(document: &str) -> Result<Vec<Characteristic>, ContractError> {
    Ok(serde_json::from_str(document)?)
}
