//! Workflow preconditions.
//!
//! The active phase itself lives in the store (`fpf_state`); tools advance
//! it as part of their bodies. What this module owns is the gate in front of
//! a tool body: the data prerequisites that must hold before the dispatcher
//! lets the call run. A failed precondition is not an error in the tool
//! sense; the dispatcher records it as `BLOCKED` and tells the caller what
//! is missing.

use serde_json::Value;
use thiserror::Error;

use quint_core::{Contract, Layer};

use crate::store::{Store, StoreError};

/// Outcome of a failed precondition check.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// The prerequisite is not met; the message is shown to the caller.
    #[error("{0}")]
    Blocked(String),

    /// The store failed while checking.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks the data prerequisites of a tool call against the current store
/// snapshot. Tools without prerequisites pass through.
///
/// # Errors
///
/// Returns [`PreconditionError::Blocked`] with a caller-facing reason when a
/// prerequisite is not met, and propagates store failures.
pub fn check_preconditions(
    store: &Store,
    context_id: &str,
    tool: &str,
    args: &Value,
) -> Result<(), PreconditionError> {
    match tool {
        "quint_verify" => {
            if store.count_layer(context_id, Layer::L0)? == 0 {
                return Err(PreconditionError::Blocked(
                    "Blocked: no L0 hypotheses to verify. Propose one with quint_propose first."
                        .to_string(),
                ));
            }
        }
        "quint_test" => {
            if store.count_layer(context_id, Layer::L1)? == 0 {
                return Err(PreconditionError::Blocked(
                    "Blocked: no L1 hypotheses to test. Verify an L0 hypothesis with \
                     quint_verify first."
                        .to_string(),
                ));
            }
        }
        "quint_decide" => check_decide(store, args)?,
        "quint_resolve" => check_resolve(store, args)?,
        "quint_implement" => check_implement(store, args)?,
        _ => {}
    }
    Ok(())
}

fn arg_str<'v>(args: &'v Value, key: &str) -> Option<&'v str> {
    args.get(key).and_then(Value::as_str)
}

fn check_decide(store: &Store, args: &Value) -> Result<(), PreconditionError> {
    let Some(winner_id) = arg_str(args, "winner_id").filter(|id| !id.is_empty()) else {
        return Err(PreconditionError::Blocked(
            "Blocked: winner_id is required to finalize a decision.".to_string(),
        ));
    };
    match store.get_holon(winner_id) {
        Ok(winner) => {
            if !matches!(winner.layer, Layer::L1 | Layer::L2) {
                return Err(PreconditionError::Blocked(format!(
                    "Blocked: winner '{winner_id}' must be an L1 or L2 holon, found {}.",
                    winner.layer
                )));
            }
        }
        Err(StoreError::HolonNotFound { .. }) => {
            return Err(PreconditionError::Blocked(format!(
                "Blocked: winner '{winner_id}' not found."
            )));
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn check_resolve(store: &Store, args: &Value) -> Result<(), PreconditionError> {
    let Some(decision_id) = arg_str(args, "decision_id").filter(|id| !id.is_empty()) else {
        return Ok(()); // The tool body reports the missing argument.
    };
    let Ok(drr) = store.resolve_decision_id(decision_id) else {
        return Ok(()); // Missing decision is a not_found tool error.
    };
    if !drr.is_drr() {
        return Err(PreconditionError::Blocked(format!(
            "Blocked: '{decision_id}' is not a DRR; only decision records can be resolved."
        )));
    }

    // The acceptance-criteria gate: implementing a decision whose contract
    // names criteria requires an explicit confirmation flag.
    if arg_str(args, "resolution") == Some("implemented") {
        let verified = args
            .get("criteria_verified")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(message) = acceptance_gate(drr.contract.as_deref(), verified) {
            return Err(PreconditionError::Blocked(message));
        }
    }
    Ok(())
}

fn check_implement(store: &Store, args: &Value) -> Result<(), PreconditionError> {
    let Some(decision_id) = arg_str(args, "decision_id").filter(|id| !id.is_empty()) else {
        return Ok(());
    };
    let Ok(drr) = store.resolve_decision_id(decision_id) else {
        return Ok(());
    };
    if !drr.is_drr() {
        return Err(PreconditionError::Blocked(format!(
            "Blocked: '{decision_id}' is not a DRR; nothing to implement."
        )));
    }
    if drr
        .contract
        .as_deref()
        .map_or(true, |contract| contract.trim().is_empty())
    {
        return Err(PreconditionError::Blocked(format!(
            "Blocked: DRR '{decision_id}' has no implementation contract."
        )));
    }
    Ok(())
}

/// Returns the blocking message when acceptance criteria gate an
/// implementation resolution, or `None` when the resolution may proceed.
#[must_use]
pub fn acceptance_gate(contract: Option<&str>, criteria_verified: bool) -> Option<String> {
    let contract = Contract::parse(contract?).ok()?;
    if contract.acceptance_criteria.is_empty() || criteria_verified {
        return None;
    }
    let mut message = String::from(
        "Blocked: this decision carries acceptance criteria that must be verified before it \
         can be resolved as implemented:\n",
    );
    for (index, criterion) in contract.acceptance_criteria.iter().enumerate() {
        message.push_str(&format!("  {}. {criterion}\n", index + 1));
    }
    message.push_str("Verify each criterion, then call quint_resolve with criteria_verified=true.");
    Some(message)
}
