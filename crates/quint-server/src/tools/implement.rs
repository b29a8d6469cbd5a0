//! Implementation directives.

use std::collections::HashSet;

use quint_core::{Contract, Holon, RelationType};

use super::{ToolError, Tools};

/// A constraint inherited from an upstream decision record.
#[derive(Debug, Clone)]
struct InheritedConstraints {
    drr_id: String,
    title: String,
    invariants: Vec<String>,
    anti_patterns: Vec<String>,
}

impl Tools {
    /// Turns a finalized decision into a textual implementation directive:
    /// the decision's own contract plus the constraints inherited from
    /// upstream decisions reachable through its winner's dependencies.
    ///
    /// Accepts either the stored decision id or the dated mirror-file form.
    ///
    /// # Errors
    ///
    /// Returns an error when the decision is missing, is not a DRR, or has
    /// no implementation contract.
    pub fn implementation_directive(&self, decision_id: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let drr = store
            .resolve_decision_id(decision_id)
            .map_err(|_| ToolError::NotFound {
                what: "decision",
                id: decision_id.to_string(),
            })?;
        if !drr.is_drr() {
            return Err(ToolError::NotADecision { id: drr.id });
        }
        let raw_contract = drr
            .contract
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::MissingContract { id: drr.id.clone() })?;
        let contract = Contract::parse(raw_contract)?;

        let inherited = self.collect_inherited(&drr)?;

        let mut out = String::from("# IMPLEMENTATION DIRECTIVE\n\n");
        out.push_str(&format!("## Task\n\n{} ({})\n", drr.title, drr.id));

        if !contract.invariants.is_empty() {
            out.push_str("\n## Invariants (MUST hold)\n\n");
            for (index, invariant) in contract.invariants.iter().enumerate() {
                out.push_str(&format!("{}. {invariant}\n", index + 1));
            }
        }
        if !contract.anti_patterns.is_empty() {
            out.push_str("\n## Anti-patterns (MUST NOT appear)\n\n");
            for anti_pattern in &contract.anti_patterns {
                out.push_str(&format!("- {anti_pattern}\n"));
            }
        }
        if !contract.acceptance_criteria.is_empty() {
            out.push_str("\n## Acceptance Criteria\n\n");
            for criterion in &contract.acceptance_criteria {
                out.push_str(&format!("- [ ] {criterion}\n"));
            }
        }
        if !contract.affected_scope.is_empty() {
            out.push_str("\n## Affected Scope\n\n");
            for scope in &contract.affected_scope {
                out.push_str(&format!("- {scope}\n"));
            }
        }

        if !inherited.is_empty() {
            out.push_str("\n## Inherited Constraints\n\n");
            out.push_str("These come from upstream decisions and still bind this work.\n");
            for source in &inherited {
                out.push_str(&format!("\nInherited from {} ({}):\n", source.drr_id, source.title));
                for invariant in &source.invariants {
                    out.push_str(&format!("  - invariant: {invariant}\n"));
                }
                for anti_pattern in &source.anti_patterns {
                    out.push_str(&format!("  - anti-pattern: {anti_pattern}\n"));
                }
            }
        }

        out.push_str(
            "\n---\nWhen the work is complete, call quint_resolve with \
             resolution=\"implemented\", reference=<commit, PR or file>, and \
             criteria_verified=true.\n",
        );
        Ok(out)
    }

    /// Walks `selects` edges from the decision into its winners, then the
    /// winners' dependency closure, collecting the contracts of every other
    /// decision record encountered. Duplicate constraint texts from the
    /// same source are dropped.
    fn collect_inherited(&self, drr: &Holon) -> Result<Vec<InheritedConstraints>, ToolError> {
        let store = self.store()?;
        let mut stack: Vec<String> = store
            .relations_from(&drr.id, RelationType::Selects)?
            .into_iter()
            .map(|r| r.target_id)
            .collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut sources: Vec<InheritedConstraints> = Vec::new();
        let mut seen_sources: HashSet<String> = HashSet::new();
        let mut seen_constraints: HashSet<(String, String)> = HashSet::new();

        let mut absorb = |holon: &Holon,
                          sources: &mut Vec<InheritedConstraints>,
                          seen_sources: &mut HashSet<String>,
                          seen_constraints: &mut HashSet<(String, String)>| {
            if holon.id == drr.id || !holon.is_drr() || !seen_sources.insert(holon.id.clone()) {
                return;
            }
            let Some(raw) = holon.contract.as_deref().filter(|c| !c.trim().is_empty()) else {
                return;
            };
            let Ok(contract) = Contract::parse(raw) else {
                return;
            };
            let mut inherited = InheritedConstraints {
                drr_id: holon.id.clone(),
                title: holon.title.clone(),
                invariants: Vec::new(),
                anti_patterns: Vec::new(),
            };
            for invariant in contract.invariants {
                if seen_constraints.insert((holon.id.clone(), invariant.clone())) {
                    inherited.invariants.push(invariant);
                }
            }
            for anti_pattern in contract.anti_patterns {
                if seen_constraints.insert((holon.id.clone(), anti_pattern.clone())) {
                    inherited.anti_patterns.push(anti_pattern);
                }
            }
            if !inherited.invariants.is_empty() || !inherited.anti_patterns.is_empty() {
                sources.push(inherited);
            }
        };

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id.clone()) {
                continue;
            }
            let Ok(node) = store.get_holon(&node_id) else {
                continue;
            };

            absorb(&node, &mut sources, &mut seen_sources, &mut seen_constraints);

            // Decisions carrying this node contribute their contracts too.
            for relation in store.relations_to(&node_id, RelationType::Selects)? {
                if let Ok(carrier) = store.get_holon(&relation.source_id) {
                    absorb(
                        &carrier,
                        &mut sources,
                        &mut seen_sources,
                        &mut seen_constraints,
                    );
                }
            }

            for relation in store.dependencies_of(&node_id)? {
                stack.push(relation.target_id);
            }
            if node.is_drr() {
                for relation in store.relations_from(&node_id, RelationType::Selects)? {
                    stack.push(relation.target_id);
                }
            }
        }

        sources.sort_by(|a, b| a.drr_id.cmp(&b.drr_id));
        Ok(sources)
    }
}
