//! Holon records and their epistemic classification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ParseError;
use crate::relation::RelationType;

/// Epistemic layer of a holon.
///
/// Hypotheses enter at [`Layer::L0`] and are promoted one layer at a time as
/// verification and validation evidence accumulates. A failed check moves the
/// holon to [`Layer::Invalid`]; holons are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Conjecture: proposed, unverified.
    L0,
    /// Substantiated: logically verified.
    L1,
    /// Corroborated: empirically validated.
    L2,
    /// A finalized decision record.
    Drr,
    /// Invalidated by a failed or refined check.
    Invalid,
}

impl Layer {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::Drr => "DRR",
            Self::Invalid => "invalid",
        }
    }

    /// Human label for the layer, used in status reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::L0 => "Conjecture",
            Self::L1 => "Substantiated",
            Self::L2 => "Corroborated",
            Self::Drr => "Decision",
            Self::Invalid => "Invalidated",
        }
    }

    /// The next layer up the promotion ladder, if any.
    #[must_use]
    pub const fn promoted(self) -> Option<Self> {
        match self {
            Self::L0 => Some(Self::L1),
            Self::L1 => Some(Self::L2),
            Self::L2 | Self::Drr | Self::Invalid => None,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L0" => Ok(Self::L0),
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "DRR" => Ok(Self::Drr),
            "invalid" => Ok(Self::Invalid),
            _ => Err(ParseError::new("layer", s)),
        }
    }
}

/// Whether a holon is about the system being built or about how it is built.
///
/// The kind decides which dependency relation the holon participates in:
/// `componentOf` for system holons, `constituentOf` for epistemic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HolonKind {
    /// Code, architecture, runtime behaviour.
    #[default]
    System,
    /// Process, methodology, knowledge about knowledge.
    Episteme,
}

impl HolonKind {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Episteme => "episteme",
        }
    }

    /// The dependency relation this kind of holon creates.
    #[must_use]
    pub const fn dependency_relation(self) -> RelationType {
        match self {
            Self::System => RelationType::ComponentOf,
            Self::Episteme => RelationType::ConstituentOf,
        }
    }
}

impl fmt::Display for HolonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolonKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "episteme" => Ok(Self::Episteme),
            _ => Err(ParseError::new("kind", s)),
        }
    }
}

/// Structural type of a holon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HolonType {
    /// A competing claim moving through the layers.
    #[default]
    Hypothesis,
    /// A grouping parent for competing alternatives.
    Decision,
    /// A finalized design rationale record.
    Drr,
}

impl HolonType {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hypothesis => "hypothesis",
            Self::Decision => "decision",
            Self::Drr => "DRR",
        }
    }
}

impl fmt::Display for HolonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolonType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hypothesis" => Ok(Self::Hypothesis),
            "decision" => Ok(Self::Decision),
            "DRR" => Ok(Self::Drr),
            _ => Err(ParseError::new("holon type", s)),
        }
    }
}

/// A unit of knowledge.
#[derive(Debug, Clone)]
pub struct Holon {
    /// Stable identifier: a slug derived from the title, or a generated id.
    pub id: String,
    /// Structural type.
    pub holon_type: HolonType,
    /// System or episteme.
    pub kind: HolonKind,
    /// Current epistemic layer.
    pub layer: Layer,
    /// Short human title.
    pub title: String,
    /// Body text of the claim or decision.
    pub content: String,
    /// Project or workspace scope this holon belongs to.
    pub context_id: String,
    /// Where the claim applies.
    pub scope: String,
    /// Promotion lineage parent, if any.
    pub parent_id: Option<String>,
    /// Last computed effective reliability, cached for cheap listings.
    pub cached_r_score: f64,
    /// Set when a dependency or carrier change calls the holon into question.
    pub needs_reverification: bool,
    /// Why re-verification is needed.
    pub reverification_reason: Option<String>,
    /// When the re-verification flag was raised.
    pub reverification_at: Option<DateTime<Utc>>,
    /// Implementation contract, present on decision records only.
    pub contract: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Holon {
    /// Creates a holon with fresh timestamps and empty optional fields.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        holon_type: HolonType,
        kind: HolonKind,
        layer: Layer,
        title: impl Into<String>,
        content: impl Into<String>,
        context_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            holon_type,
            kind,
            layer,
            title: title.into(),
            content: content.into(),
            context_id: context_id.into(),
            scope: scope.into(),
            parent_id: None,
            cached_r_score: 0.0,
            needs_reverification: false,
            reverification_reason: None,
            reverification_at: None,
            contract: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the promotion lineage parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attaches an implementation contract document.
    #[must_use]
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// Whether this holon is a decision record.
    #[must_use]
    pub fn is_drr(&self) -> bool {
        self.holon_type == HolonType::Drr || self.layer == Layer::Drr
    }
}
