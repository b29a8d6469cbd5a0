//! Evidence records: time-bounded observations attached to holons.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ParseError;

/// Outcome of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The observation supports the claim.
    Pass,
    /// The observation contradicts the claim.
    Fail,
    /// The observation weakens the claim without refuting it.
    Degrade,
}

impl Verdict {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Degrade => "degrade",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "degrade" => Ok(Self::Degrade),
            _ => Err(ParseError::new("verdict", s)),
        }
    }
}

/// Kind of evidence.
///
/// The closed variants carry semantics in the engine: resolution types close
/// a decision record, external and research evidence carry a congruence
/// penalty in the calculator. Anything else is stored verbatim as
/// [`EvidenceType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvidenceType {
    /// Result of an empirical test run.
    TestResult,
    /// Result of a logic or consistency check.
    LogicCheck,
    /// Risk review before a decision.
    AuditReport,
    /// A decision was carried out.
    Implementation,
    /// A decision was given up.
    Abandonment,
    /// A decision was replaced by a newer one.
    Supersession,
    /// Externally sourced observation.
    External,
    /// Research-derived observation.
    Research,
    /// A stale/expired-evidence waiver marker.
    Waiver,
    /// Any other label.
    Other(String),
}

impl EvidenceType {
    /// Canonical storage form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TestResult => "test_result",
            Self::LogicCheck => "logic_check",
            Self::AuditReport => "audit_report",
            Self::Implementation => "implementation",
            Self::Abandonment => "abandonment",
            Self::Supersession => "supersession",
            Self::External => "external",
            Self::Research => "research",
            Self::Waiver => "waiver",
            Self::Other(s) => s,
        }
    }

    /// Whether this evidence closes a decision record.
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::Implementation | Self::Abandonment | Self::Supersession
        )
    }

    /// Whether this evidence is external or research-derived and therefore
    /// carries the calculator's congruence penalty.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External | Self::Research)
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EvidenceType {
    fn from(s: &str) -> Self {
        match s {
            "test_result" => Self::TestResult,
            "logic_check" => Self::LogicCheck,
            "audit_report" => Self::AuditReport,
            "implementation" => Self::Implementation,
            "abandonment" => Self::Abandonment,
            "supersession" => Self::Supersession,
            "external" => Self::External,
            "research" => Self::Research,
            "waiver" => Self::Waiver,
            other => Self::Other(other.to_string()),
        }
    }
}

/// How a decision record was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The decision was carried out.
    Implemented,
    /// The decision was given up.
    Abandoned,
    /// The decision was replaced.
    Superseded,
}

impl Resolution {
    /// Canonical form used in tool arguments and search filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Implemented => "implemented",
            Self::Abandoned => "abandoned",
            Self::Superseded => "superseded",
        }
    }

    /// The evidence type this resolution produces.
    #[must_use]
    pub const fn evidence_type(self) -> EvidenceType {
        match self {
            Self::Implemented => EvidenceType::Implementation,
            Self::Abandoned => EvidenceType::Abandonment,
            Self::Superseded => EvidenceType::Supersession,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "implemented" => Ok(Self::Implemented),
            "abandoned" => Ok(Self::Abandoned),
            "superseded" => Ok(Self::Superseded),
            _ => Err(ParseError::new("resolution", s)),
        }
    }
}

/// A time-bounded observation attached to a holon.
#[derive(Debug, Clone)]
pub struct Evidence {
    /// Stable identifier.
    pub id: String,
    /// The holon this observation is about.
    pub holon_id: String,
    /// Kind of evidence.
    pub evidence_type: EvidenceType,
    /// Body of the observation.
    pub content: String,
    /// Outcome.
    pub verdict: Verdict,
    /// Assurance level label the observation supports, e.g. `L1` or `L2`.
    pub assurance_level: Option<String>,
    /// The artefact the evidence is about: file paths, a commit, a URL.
    pub carrier_ref: Option<String>,
    /// Content hash of the carrier at observation time.
    pub carrier_hash: Option<String>,
    /// Version-control commit the carrier was observed at.
    pub carrier_commit: Option<String>,
    /// The observation decays after this instant.
    pub valid_until: Option<DateTime<Utc>>,
    /// Set when the carrier changed after the observation.
    pub is_stale: bool,
    /// Why the evidence was marked stale.
    pub stale_reason: Option<String>,
    /// When the evidence was marked stale.
    pub stale_marked_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    /// Creates an evidence record with a fresh timestamp and no carrier or
    /// validity bound.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        holon_id: impl Into<String>,
        evidence_type: EvidenceType,
        content: impl Into<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            id: id.into(),
            holon_id: holon_id.into(),
            evidence_type,
            content: content.into(),
            verdict,
            assurance_level: None,
            carrier_ref: None,
            carrier_hash: None,
            carrier_commit: None,
            valid_until: None,
            is_stale: false,
            stale_reason: None,
            stale_marked_at: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the assurance level label.
    #[must_use]
    pub fn with_assurance_level(mut self, level: impl Into<String>) -> Self {
        self.assurance_level = Some(level.into());
        self
    }

    /// Sets the carrier reference.
    #[must_use]
    pub fn with_carrier(mut self, carrier_ref: impl Into<String>) -> Self {
        self.carrier_ref = Some(carrier_ref.into());
        self
    }

    /// Sets the commit the carrier was observed at.
    #[must_use]
    pub fn with_carrier_commit(mut self, commit: impl Into<String>) -> Self {
        self.carrier_commit = Some(commit.into());
        self
    }

    /// Sets the validity horizon.
    #[must_use]
    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Whether the observation has decayed at the given instant.
    #[must_use]
    pub fn is_decayed(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }
}
