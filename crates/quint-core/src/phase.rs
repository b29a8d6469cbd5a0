//! Workflow phases of the knowledge cycle.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// The active phase of a knowledge cycle.
///
/// One phase is active per context at a time; it is persisted by the store
/// and advanced by the tools. The cycle runs Idle through Abduction,
/// Deduction, Induction and Decision, with an optional Audit stop before the
/// decision is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No cycle in progress.
    #[default]
    Idle,
    /// Hypotheses are being proposed (L0).
    Abduction,
    /// Hypotheses are being logically verified (L0 to L1).
    Deduction,
    /// Hypotheses are being empirically validated (L1 to L2).
    Induction,
    /// Risk review before a decision.
    Audit,
    /// A decision is being finalized.
    Decision,
}

impl Phase {
    /// Canonical upper-case name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Abduction => "ABDUCTION",
            Self::Deduction => "DEDUCTION",
            Self::Induction => "INDUCTION",
            Self::Audit => "AUDIT",
            Self::Decision => "DECISION",
        }
    }

    /// The role an agent plays while this phase is active.
    #[must_use]
    pub const fn role_name(self) -> &'static str {
        match self {
            Self::Idle => "Observer",
            Self::Abduction => "Abductor",
            Self::Deduction => "Deductor",
            Self::Induction => "Inductor",
            Self::Audit => "Auditor",
            Self::Decision => "Decider",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IDLE" | "" => Ok(Self::Idle),
            "ABDUCTION" => Ok(Self::Abduction),
            "DEDUCTION" => Ok(Self::Deduction),
            "INDUCTION" => Ok(Self::Induction),
            "AUDIT" => Ok(Self::Audit),
            "DECISION" => Ok(Self::Decision),
            _ => Err(ParseError::new("phase", s)),
        }
    }
}
