//! Typed directed edges between holons.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ParseError;

/// The kind of a directed edge between two holons.
///
/// Only [`RelationType::ComponentOf`] and [`RelationType::ConstituentOf`]
/// carry reliability dependency: the source depends on the target, so the
/// target's score caps the source's under weakest-link aggregation.
/// `memberOf` groups competing alternatives without propagating anything;
/// `selects` and `rejects` bind a decision record to its alternatives;
/// `supersededBy` chains replacement decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    /// Source system holon depends on target.
    ComponentOf,
    /// Source episteme holon depends on target.
    ConstituentOf,
    /// Source is a competing alternative grouped under target.
    MemberOf,
    /// A decision record selected the target as winner.
    Selects,
    /// A decision record rejected the target alternative.
    Rejects,
    /// Source refines target after a failed check.
    Refines,
    /// Target evidence verifies the source.
    VerifiedBy,
    /// Target actor performed the source work.
    PerformedBy,
    /// Source decision was replaced by target.
    SupersededBy,
}

impl RelationType {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComponentOf => "componentOf",
            Self::ConstituentOf => "constituentOf",
            Self::MemberOf => "memberOf",
            Self::Selects => "selects",
            Self::Rejects => "rejects",
            Self::Refines => "refines",
            Self::VerifiedBy => "verifiedBy",
            Self::PerformedBy => "performedBy",
            Self::SupersededBy => "supersededBy",
        }
    }

    /// Whether edges of this type carry reliability dependency.
    #[must_use]
    pub const fn is_dependency(self) -> bool {
        matches!(self, Self::ComponentOf | Self::ConstituentOf)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "componentOf" => Ok(Self::ComponentOf),
            "constituentOf" => Ok(Self::ConstituentOf),
            "memberOf" => Ok(Self::MemberOf),
            "selects" => Ok(Self::Selects),
            "rejects" => Ok(Self::Rejects),
            "refines" => Ok(Self::Refines),
            "verifiedBy" => Ok(Self::VerifiedBy),
            "performedBy" => Ok(Self::PerformedBy),
            "supersededBy" => Ok(Self::SupersededBy),
            _ => Err(ParseError::new("relation type", s)),
        }
    }
}

/// How well a dependency's context matches the dependant's.
///
/// CL3 is the same context, CL2 a similar one, CL1 a different one. The
/// level is applied as a multiplicative penalty on the dependency's score;
/// see [`congruence_penalty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CongruenceLevel {
    /// Different context.
    Cl1,
    /// Similar context.
    Cl2,
    /// Same context, no penalty.
    #[default]
    Cl3,
}

impl CongruenceLevel {
    /// Parses a level, rejecting values outside 1..=3.
    #[must_use]
    pub const fn new(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Cl1),
            2 => Some(Self::Cl2),
            3 => Some(Self::Cl3),
            _ => None,
        }
    }

    /// Parses a level, treating out-of-range values as CL3.
    #[must_use]
    pub const fn new_or_default(level: i64) -> Self {
        match Self::new(level) {
            Some(cl) => cl,
            None => Self::Cl3,
        }
    }

    /// Numeric value, 1 through 3.
    #[must_use]
    pub const fn value(self) -> i64 {
        match self {
            Self::Cl1 => 1,
            Self::Cl2 => 2,
            Self::Cl3 => 3,
        }
    }
}

impl fmt::Display for CongruenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CL{}", self.value())
    }
}

impl serde::Serialize for CongruenceLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

/// Multiplicative penalty for a congruence level.
///
/// Kept as a standalone function so the curve can be replaced without
/// touching the graph traversal.
#[must_use]
pub const fn congruence_penalty(level: CongruenceLevel) -> f64 {
    match level {
        CongruenceLevel::Cl3 => 1.0,
        CongruenceLevel::Cl2 => 0.9,
        CongruenceLevel::Cl1 => 0.7,
    }
}

/// A typed directed edge between two holons.
///
/// Identity is the `(source, target, type)` triple; duplicate edges are
/// rejected at insertion.
#[derive(Debug, Clone)]
pub struct Relation {
    /// The depending or referring holon.
    pub source_id: String,
    /// The depended-upon or referred-to holon.
    pub target_id: String,
    /// Edge type.
    pub relation_type: RelationType,
    /// Context congruence of the edge.
    pub congruence_level: CongruenceLevel,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Creates a relation with a fresh timestamp.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
        congruence_level: CongruenceLevel,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            congruence_level,
            created_at: Utc::now(),
        }
    }
}
