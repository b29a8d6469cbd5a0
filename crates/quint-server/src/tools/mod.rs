//! The operations the agent invokes.
//!
//! Tools share one uniform shape: arguments in, a textual report out, side
//! effects on the store and the workflow phase in between. The dispatcher in
//! [`crate::protocol`] owns precondition checks, transaction wrapping and
//! audit entries; the tool bodies here own the domain semantics.

mod assess;
mod decay;
mod decide;
mod evidence;
mod implement;
mod link;
mod propose;
mod resolve;
mod search;
mod session;

pub use decide::DecideInput;
pub use evidence::{AuditInput, TestInput, VerifyInput};
pub use link::LinkInput;
pub use propose::ProposeInput;
pub use resolve::ResolveInput;
pub use search::SearchInput;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use quint_core::{ContractError, ParseError};

use crate::assurance::CalculatorError;
use crate::mirror;
use crate::store::{Store, StoreError};

/// The actor name recorded for tool-driven mutations.
pub const ACTOR: &str = "agent";

/// Errors surfaced by tool bodies.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No store is open yet; the session has not been internalized.
    #[error("database not initialized. Run quint_internalize first")]
    StoreNotInitialized,

    /// A referenced entity does not exist.
    #[error("{what} '{id}' not found")]
    NotFound {
        /// What kind of entity was looked up.
        what: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// The target exists but is not a decision record.
    #[error("holon '{id}' is not a DRR")]
    NotADecision {
        /// The offending identifier.
        id: String,
    },

    /// A decision record has no implementation contract.
    #[error("DRR '{id}' has no implementation contract")]
    MissingContract {
        /// The offending identifier.
        id: String,
    },

    /// Malformed or out-of-range input.
    #[error("{0}")]
    InvalidArgument(String),

    /// Store failure underneath the tool body.
    #[error(transparent)]
    Store(StoreError),

    /// Calculator failure underneath the tool body.
    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    /// Contract document failure.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Mirror filesystem failure.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::HolonNotFound { id } => Self::NotFound { what: "holon", id },
            StoreError::EvidenceNotFound { id } => Self::NotFound {
                what: "evidence",
                id,
            },
            other => Self::Store(other),
        }
    }
}

impl From<ParseError> for ToolError {
    fn from(err: ParseError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// The tools layer: the store handle, the project root the mirror lives
/// under, and the context the workflow state is scoped to.
#[derive(Debug)]
pub struct Tools {
    root: PathBuf,
    context: String,
    commit: Option<String>,
    store: Option<Store>,
}

impl Tools {
    /// Creates a tools layer without opening a store. The store is created
    /// on the first `internalize` call.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, commit: Option<String>) -> Self {
        Self {
            root: root.into(),
            context: "default".to_string(),
            commit,
            store: None,
        }
    }

    /// Creates a tools layer, opening the store when the project was
    /// already initialized.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing database cannot be opened.
    pub fn open_existing(root: impl Into<PathBuf>, commit: Option<String>) -> Result<Self, ToolError> {
        let mut tools = Self::new(root, commit);
        if mirror::db_path(&tools.root).exists() {
            tools.ensure_store()?;
        }
        Ok(tools)
    }

    /// Creates a tools layer around an already open store. Used by tests.
    #[must_use]
    pub fn with_store(root: impl Into<PathBuf>, store: Store) -> Self {
        Self {
            root: root.into(),
            context: "default".to_string(),
            commit: None,
            store: Some(store),
        }
    }

    /// Sets the environment-supplied commit id.
    pub fn set_commit(&mut self, commit: Option<String>) {
        self.commit = commit;
    }

    /// The open store.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::StoreNotInitialized`] before the first
    /// `internalize`.
    pub fn store(&self) -> Result<&Store, ToolError> {
        self.store.as_ref().ok_or(ToolError::StoreNotInitialized)
    }

    /// Opens the store if it is not open yet, creating the database file
    /// and running migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened.
    pub fn ensure_store(&mut self) -> Result<(), ToolError> {
        if self.store.is_none() {
            let store = Store::open(&mirror::db_path(&self.root))?;
            self.store = Some(store);
        }
        Ok(())
    }

    /// The context id the workflow state is scoped to.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The environment-supplied commit id, if any.
    #[must_use]
    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub(crate) fn new_id(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }
}

/// Verdict of a verification or validation step as the agent reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckVerdict {
    /// The check passed; the hypothesis is promoted.
    Pass,
    /// The check failed; the hypothesis is invalidated.
    Fail,
    /// The hypothesis needs rework; it is invalidated pending a refined
    /// successor.
    Refine,
}

impl CheckVerdict {
    /// The evidence verdict this check outcome records.
    #[must_use]
    pub const fn evidence_verdict(self) -> quint_core::Verdict {
        match self {
            Self::Pass => quint_core::Verdict::Pass,
            Self::Fail => quint_core::Verdict::Fail,
            Self::Refine => quint_core::Verdict::Degrade,
        }
    }
}

impl FromStr for CheckVerdict {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            "REFINE" => Ok(Self::Refine),
            _ => Err(ParseError::new("verdict", s)),
        }
    }
}

/// Parses an agent-supplied timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS`, or
/// a bare `YYYY-MM-DD` date (taken as midnight UTC).
#[must_use]
pub fn parse_flexible_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0)?));
    }
    None
}


#[cfg(test)]
mod tests {
    use super::{parse_flexible_datetime, CheckVerdict};

    #[test]
    fn check_verdict_parses_case_insensitively() {
        assert_eq!("PASS".parse::<CheckVerdict>().unwrap(), CheckVerdict::Pass);
        assert_eq!("fail".parse::<CheckVerdict>().unwrap(), CheckVerdict::Fail);
        assert_eq!(
            "Refine".parse::<CheckVerdict>().unwrap(),
            CheckVerdict::Refine
        );
        assert!("MAYBE".parse::<CheckVerdict>().is_err());
    }

    #[test]
    fn flexible_datetime_accepts_three_forms() {
        assert!(parse_flexible_datetime("2099-12-31").is_some());
        assert!(parse_flexible_datetime("2099-12-31 10:30:00").is_some());
        assert!(parse_flexible_datetime("2099-12-31T10:30:00+00:00").is_some());
        assert!(parse_flexible_datetime("").is_none());
        assert!(parse_flexible_datetime("next tuesday").is_none());
    }
}
