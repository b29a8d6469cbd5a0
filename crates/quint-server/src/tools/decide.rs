//! Decision finalization.

use chrono::Utc;
use serde::Deserialize;

use quint_core::{
    parse_characteristics, slugify, CongruenceLevel, Contract, Holon, HolonType, Layer, Phase,
    RelationType,
};

use crate::assurance::Calculator;
use crate::mirror::{self, DecisionSections};

use super::{ToolError, Tools};

/// Arguments of `quint_decide`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecideInput {
    /// Decision title; the DRR id is derived from it.
    pub title: String,
    /// The winning L1/L2 holon.
    pub winner_id: String,
    /// Rejected alternatives.
    #[serde(default)]
    pub rejected_ids: Vec<String>,
    /// The problem context the decision was taken in.
    pub context: String,
    /// The decision itself.
    pub decision: String,
    /// Why this alternative won.
    pub rationale: String,
    /// What follows from the decision.
    pub consequences: String,
    /// JSON array of `{name, scale, value, unit?}` measurements.
    #[serde(default)]
    pub characteristics: String,
    /// JSON implementation contract.
    #[serde(default)]
    pub contract: String,
}

impl Tools {
    /// Creates a decision record: a DRR holon selecting the winner,
    /// rejecting the alternatives, promoting the winner to L2 and closing
    /// the cycle back to idle.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or ineligible winner, a malformed
    /// contract, or a store failure.
    pub fn finalize_decision(&self, input: &DecideInput) -> Result<String, ToolError> {
        let store = self.store()?;
        store.set_phase(self.context(), Phase::Decision)?;

        let winner = store
            .get_holon(&input.winner_id)
            .map_err(|_| ToolError::NotFound {
                what: "winner",
                id: input.winner_id.clone(),
            })?;
        if !matches!(winner.layer, Layer::L1 | Layer::L2) {
            return Err(ToolError::InvalidArgument(format!(
                "winner '{}' must be an L1 or L2 holon, found {}",
                winner.id, winner.layer
            )));
        }

        let contract = parse_contract(&input.contract)?;

        let drr_id = self.unique_drr_id(&input.title)?;
        let content = format!(
            "## Context\n\n{}\n\n## Decision\n\n{}\n\n## Rationale\n\n{}\n\n## Consequences\n\n{}",
            input.context, input.decision, input.rationale, input.consequences
        );
        let mut drr = Holon::new(
            &drr_id,
            HolonType::Drr,
            winner.kind,
            Layer::Drr,
            &input.title,
            content,
            self.context(),
            &winner.scope,
        );
        if let Some(raw) = normalized_contract(contract.as_ref()) {
            drr = drr.with_contract(raw);
        }
        store.create_holon(&drr)?;

        store.create_relation(&drr_id, &winner.id, RelationType::Selects, CongruenceLevel::Cl3)?;

        let mut out = vec![format!("✅ Decision recorded: {drr_id}")];

        let threshold = store
            .fpf_state(self.context())?
            .map_or(0.8, |state| state.assurance_threshold);
        let winner_report = Calculator::new(store).reliability(&winner.id)?;
        store.update_cached_score(&winner.id, winner_report.final_score)?;
        if winner_report.final_score < threshold {
            out.push(format!(
                "⚠️ Winner R_eff {:.2} is below the assurance threshold {threshold:.2}; \
                 consider more validation before relying on this decision.",
                winner_report.final_score
            ));
        }

        if winner.layer == Layer::L1 {
            self.move_layer(&winner, Layer::L2)?;
            out.push(format!("Winner {} promoted to L2", winner.id));
        } else {
            out.push(format!("Winner {} selected (already L2)", winner.id));
        }

        let mut rejected = Vec::new();
        for id in &input.rejected_ids {
            if !store.holon_exists(id)? {
                out.push(format!("⚠️ Skipped rejected alternative '{id}': holon not found"));
                continue;
            }
            store.create_relation(&drr_id, id, RelationType::Rejects, CongruenceLevel::Cl3)?;
            rejected.push(id.clone());
        }
        if !rejected.is_empty() {
            out.push(format!("Rejected: {}", rejected.join(", ")));
        }

        if !input.characteristics.trim().is_empty() {
            match parse_characteristics(&input.characteristics) {
                Ok(list) => {
                    for characteristic in &list {
                        store.add_characteristic(&drr_id, characteristic)?;
                    }
                    if !list.is_empty() {
                        out.push(format!("Characteristics recorded: {}", list.len()));
                    }
                }
                Err(_) => out.push(
                    "⚠️ characteristics was not a valid JSON array of measurements; skipped"
                        .to_string(),
                ),
            }
        }

        let sections = DecisionSections {
            context: &input.context,
            decision: &input.decision,
            rationale: &input.rationale,
            consequences: &input.consequences,
            characteristics: &input.characteristics,
            status: None,
        };
        let path = mirror::write_decision(self.root(), &drr, &sections)?;
        out.push(format!("File: {}", path.display()));

        store.set_phase(self.context(), Phase::Idle)?;
        out.push("Cycle complete; phase reset to IDLE.".to_string());
        out.push(format!(
            "Next: quint_implement(decision_id=\"{drr_id}\") to start the work, then \
             quint_resolve once it lands."
        ));
        Ok(out.join("\n"))
    }

    /// Derives a unique dated DRR id from a title.
    fn unique_drr_id(&self, title: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(ToolError::InvalidArgument(
                "decision title produces an empty identifier".to_string(),
            ));
        }
        let base = format!("DRR-{}-{slug}", Utc::now().format("%Y-%m-%d"));
        if !store.holon_exists(&base)? {
            return Ok(base);
        }
        Ok(Tools::new_id(&base))
    }
}

fn parse_contract(raw: &str) -> Result<Option<Contract>, ToolError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Contract::parse(raw)?))
}

fn normalized_contract(contract: Option<&Contract>) -> Option<String> {
    let contract = contract?;
    if contract.is_empty() {
        return None;
    }
    serde_json::to_string(contract).ok()
}

#[cfg(test)]
mod tests {
    use quint_core::{Holon, HolonKind, HolonType, Layer, Phase, RelationType};

    use crate::tools::testutil::tools_fixture;
    use crate::tools::{ToolError, Tools};

    use super::DecideInput;

    fn seed(tools: &Tools, id: &str, layer: Layer) {
        tools
            .store()
            .unwrap()
            .create_holon(&Holon::new(
                id,
                HolonType::Hypothesis,
                HolonKind::System,
                layer,
                format!("Holon {id}"),
                "Content",
                "default",
                "global",
            ))
            .unwrap();
    }

    fn input(winner: &str) -> DecideInput {
        DecideInput {
            title: "Final Project Decision".to_string(),
            winner_id: winner.to_string(),
            rejected_ids: Vec::new(),
            context: "Context".to_string(),
            decision: "The decision".to_string(),
            rationale: "Rationale".to_string(),
            consequences: "Consequences".to_string(),
            characteristics: String::new(),
            contract: String::new(),
        }
    }

    #[test]
    fn creates_a_dated_drr_and_promotes_the_winner() {
        let (tools, dir) = tools_fixture();
        seed(&tools, "final-winner", Layer::L1);

        let out = tools.finalize_decision(&input("final-winner")).unwrap();
        assert!(out.contains("✅ Decision recorded: DRR-"));
        assert!(out.contains("final-project-decision"));
        assert!(out.contains("Winner final-winner promoted to L2"));

        let store = tools.store().unwrap();
        assert_eq!(store.get_holon("final-winner").unwrap().layer, Layer::L2);
        assert_eq!(store.get_phase("default").unwrap(), Phase::Idle);

        let open = store.open_decisions("default").unwrap();
        assert_eq!(open.len(), 1);
        let drr = &open[0];
        assert!(drr.id.starts_with("DRR-"));
        assert!(drr.id.ends_with("final-project-decision"));
        assert!(store
            .relation_exists(&drr.id, "final-winner", RelationType::Selects)
            .unwrap());

        let decisions_dir = dir.path().join(".quint/decisions");
        let files: Vec<_> = std::fs::read_dir(decisions_dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("DRR-"))
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn rejected_alternatives_get_rejects_edges() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "winner", Layer::L2);
        seed(&tools, "loser-a", Layer::L2);
        seed(&tools, "loser-b", Layer::L1);

        let mut decide = input("winner");
        decide.rejected_ids = vec![
            "loser-a".to_string(),
            "loser-b".to_string(),
            "ghost".to_string(),
        ];
        let out = tools.finalize_decision(&decide).unwrap();
        assert!(out.contains("Rejected: loser-a, loser-b"));
        assert!(out.contains("Skipped rejected alternative 'ghost'"));

        let store = tools.store().unwrap();
        let drr = &store.open_decisions("default").unwrap()[0];
        assert!(store
            .relation_exists(&drr.id, "loser-a", RelationType::Rejects)
            .unwrap());
        assert!(store
            .relation_exists(&drr.id, "loser-b", RelationType::Rejects)
            .unwrap());
    }

    #[test]
    fn contract_is_stored_on_the_drr() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "winner", Layer::L2);

        let mut decide = input("winner");
        decide.contract = r#"{"invariants":["Cache must be transparent"],"acceptance_criteria":["Cache hit skips DB"]}"#.to_string();
        tools.finalize_decision(&decide).unwrap();

        let store = tools.store().unwrap();
        let drr = &store.open_decisions("default").unwrap()[0];
        let contract = drr.contract.as_deref().unwrap();
        assert!(contract.contains("Cache must be transparent"));
    }

    #[test]
    fn malformed_contract_is_an_error() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "winner", Layer::L2);

        let mut decide = input("winner");
        decide.contract = "not json".to_string();
        assert!(matches!(
            tools.finalize_decision(&decide),
            Err(ToolError::Contract(_))
        ));
    }

    #[test]
    fn characteristics_are_recorded_when_parseable() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "winner", Layer::L2);

        let mut decide = input("winner");
        decide.characteristics =
            r#"[{"name":"latency_p99","scale":"ratio","value":"12","unit":"ms"}]"#.to_string();
        let out = tools.finalize_decision(&decide).unwrap();
        assert!(out.contains("Characteristics recorded: 1"));

        let store = tools.store().unwrap();
        let drr = &store.open_decisions("default").unwrap()[0];
        let recorded = store.characteristics_for(&drr.id).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].name, "latency_p99");

        // Free-form text degrades to a warning, not a failure.
        seed(&tools, "winner-2", Layer::L2);
        let mut decide = input("winner-2");
        decide.title = "Second Decision".to_string();
        decide.characteristics = "fast enough".to_string();
        let out = tools.finalize_decision(&decide).unwrap();
        assert!(out.contains("skipped"));
    }

    #[test]
    fn unproven_winner_is_flagged_against_the_threshold() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "unproven", Layer::L1);

        let out = tools.finalize_decision(&input("unproven")).unwrap();
        assert!(out.contains("below the assurance threshold"));
    }

    #[test]
    fn winner_must_exist_and_be_promotable() {
        let (tools, _dir) = tools_fixture();
        assert!(matches!(
            tools.finalize_decision(&input("ghost")),
            Err(ToolError::NotFound { .. })
        ));

        seed(&tools, "too-early", Layer::L0);
        assert!(matches!(
            tools.finalize_decision(&input("too-early")),
            Err(ToolError::InvalidArgument(_))
        ));
    }
}
