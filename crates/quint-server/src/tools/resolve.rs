//! Decision resolution.

use serde::Deserialize;

use quint_core::{CongruenceLevel, Evidence, RelationType, Resolution, Verdict};

use crate::fsm::acceptance_gate;
use crate::mirror::{self, DecisionSections};

use super::{parse_flexible_datetime, ToolError, Tools};

/// Arguments of `quint_resolve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveInput {
    /// The decision record to close.
    pub decision_id: String,
    /// `implemented`, `abandoned`, or `superseded`.
    pub resolution: String,
    /// Implementation reference, required for `implemented`: `commit:SHA`,
    /// `pr:NUM`, `file:PATH`.
    #[serde(default)]
    pub reference: String,
    /// Replacement decision, required for `superseded`.
    #[serde(default)]
    pub superseded_by: String,
    /// Explanation, required for `abandoned`.
    #[serde(default)]
    pub notes: String,
    /// Optional re-verification horizon for the implementation evidence.
    #[serde(default)]
    pub valid_until: String,
    /// Confirms the contract's acceptance criteria were verified.
    #[serde(default)]
    pub criteria_verified: bool,
}

impl Tools {
    /// Closes a decision record by appending resolution evidence. A
    /// superseded decision additionally gains a `supersededBy` edge to its
    /// replacement. Resolving an already-resolved decision is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown decision, an invalid resolution, a
    /// missing per-resolution argument, an unverified acceptance gate, or a
    /// store failure.
    pub fn resolve_decision(&self, input: &ResolveInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let drr = store
            .resolve_decision_id(&input.decision_id)
            .map_err(|_| ToolError::NotFound {
                what: "decision",
                id: input.decision_id.clone(),
            })?;
        if !drr.is_drr() {
            return Err(ToolError::NotADecision { id: drr.id });
        }

        let resolution: Resolution = input.resolution.parse().map_err(|_| {
            ToolError::InvalidArgument(format!(
                "resolution must be 'implemented', 'abandoned' or 'superseded', got '{}'",
                input.resolution
            ))
        })?;

        if let Some(existing) = store.resolution_of(&drr.id)? {
            return Err(ToolError::InvalidArgument(format!(
                "decision '{}' is already resolved ({existing})",
                drr.id
            )));
        }

        let (content, carrier) = match resolution {
            Resolution::Implemented => {
                if input.reference.trim().is_empty() {
                    return Err(ToolError::InvalidArgument(
                        "'reference' is required for resolution=implemented".to_string(),
                    ));
                }
                if let Some(message) =
                    acceptance_gate(drr.contract.as_deref(), input.criteria_verified)
                {
                    return Err(ToolError::InvalidArgument(message));
                }
                (
                    format!("Implemented: {}\n{}", input.reference, input.notes),
                    input.reference.clone(),
                )
            }
            Resolution::Abandoned => {
                if input.notes.trim().is_empty() {
                    return Err(ToolError::InvalidArgument(
                        "'notes' is required for resolution=abandoned".to_string(),
                    ));
                }
                (format!("Abandoned: {}", input.notes), String::new())
            }
            Resolution::Superseded => {
                if input.superseded_by.trim().is_empty() {
                    return Err(ToolError::InvalidArgument(
                        "'superseded_by' is required for resolution=superseded".to_string(),
                    ));
                }
                let replacement = store
                    .resolve_decision_id(&input.superseded_by)
                    .map_err(|_| ToolError::NotFound {
                        what: "replacement decision",
                        id: input.superseded_by.clone(),
                    })?;
                if !replacement.is_drr() {
                    return Err(ToolError::NotADecision { id: replacement.id });
                }
                store.create_relation(
                    &drr.id,
                    &replacement.id,
                    RelationType::SupersededBy,
                    CongruenceLevel::Cl3,
                )?;
                (
                    format!("Superseded by {}: {}", replacement.id, input.notes),
                    replacement.id,
                )
            }
        };

        let mut evidence = Evidence::new(
            Tools::new_id("ev"),
            &drr.id,
            resolution.evidence_type(),
            content,
            Verdict::Pass,
        )
        .with_assurance_level("L2");
        if !carrier.is_empty() {
            evidence = evidence.with_carrier(carrier.as_str());
        }
        if let Some(valid_until) = parse_flexible_datetime(&input.valid_until) {
            evidence = evidence.with_valid_until(valid_until);
        }
        store.add_evidence(&evidence)?;
        mirror::write_evidence(self.root(), &evidence)?;

        // Refresh the decision's mirror file with its closed status.
        let status_line = match resolution {
            Resolution::Implemented => format!("implemented ({})", input.reference),
            Resolution::Abandoned => "abandoned".to_string(),
            Resolution::Superseded => format!("superseded by {carrier}"),
        };
        let sections = DecisionSections {
            status: Some(&status_line),
            ..DecisionSections::default()
        };
        mirror::write_decision(self.root(), &drr, &sections)?;

        let mut out = vec![format!("✅ Decision '{}' resolved: {resolution}", drr.id)];
        match resolution {
            Resolution::Implemented => out.push(format!("Reference: {}", input.reference)),
            Resolution::Abandoned => out.push(format!("Notes: {}", input.notes)),
            Resolution::Superseded => out.push(format!("Superseded by: {carrier}")),
        }
        out.push("The decision and its alternatives now count as archived.".to_string());
        Ok(out.join("\n"))
    }
}
