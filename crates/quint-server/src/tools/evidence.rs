//! Verification, validation, and audit evidence.

use chrono::{Duration, Utc};
use serde::Deserialize;

use quint_core::{Evidence, EvidenceType, Holon, Layer, Phase, Verdict};

use crate::mirror;

use super::{CheckVerdict, ToolError, Tools};

/// Arguments of `quint_verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyInput {
    /// The L0 hypothesis under verification.
    pub hypothesis_id: String,
    /// JSON blob of the logic checks performed.
    pub checks_json: String,
    /// `PASS`, `FAIL`, or `REFINE`.
    pub verdict: String,
    /// Comma-separated files the verification is based on.
    #[serde(default)]
    pub carrier_files: String,
}

/// Arguments of `quint_test`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestInput {
    /// The L1 hypothesis under validation.
    pub hypothesis_id: String,
    /// `internal` (code under our control) or `external` (research, third
    /// parties); external evidence decays faster.
    pub test_type: String,
    /// Test output or findings.
    pub result: String,
    /// `PASS`, `FAIL`, or `REFINE`.
    pub verdict: String,
    /// Comma-separated files the test covered.
    #[serde(default)]
    pub carrier_files: String,
}

/// Arguments of `quint_audit`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditInput {
    /// The hypothesis under risk review.
    pub hypothesis_id: String,
    /// Risk analysis text.
    pub risks: String,
}

/// Validity horizon of internal test evidence.
const INTERNAL_VALIDITY_DAYS: i64 = 90;
/// Validity horizon of external test evidence.
const EXTERNAL_VALIDITY_DAYS: i64 = 60;

impl Tools {
    /// Records a logic check against a hypothesis, promoting it to L1 on a
    /// pass and invalidating it otherwise. A pass also clears staleness on
    /// the holon's prior evidence.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown hypothesis, an invalid verdict, or a
    /// store failure.
    pub fn verify_hypothesis(&self, input: &VerifyInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let verdict: CheckVerdict = input.verdict.parse()?;
        store.set_phase(self.context(), Phase::Deduction)?;

        let holon = self.lookup_hypothesis(&input.hypothesis_id)?;
        let evidence = Evidence::new(
            Tools::new_id("ev"),
            &holon.id,
            EvidenceType::LogicCheck,
            &input.checks_json,
            verdict.evidence_verdict(),
        )
        .with_assurance_level("L1")
        .with_carrier(carrier_or(&input.carrier_files, "internal-logic"));
        let evidence = self.stamp_commit(evidence);
        store.add_evidence(&evidence)?;
        mirror::write_evidence(self.root(), &evidence)?;

        match verdict {
            CheckVerdict::Pass => {
                store.clear_stale_for_holon(&holon.id)?;
                store.clear_needs_reverification(&holon.id)?;
                if holon.layer == Layer::L0 {
                    self.move_layer(&holon, Layer::L1)?;
                    Ok(format!(
                        "Hypothesis {} verified and promoted to L1",
                        holon.id
                    ))
                } else {
                    Ok(format!(
                        "Hypothesis {} verified (layer {} unchanged)",
                        holon.id, holon.layer
                    ))
                }
            }
            CheckVerdict::Fail | CheckVerdict::Refine => {
                self.move_layer(&holon, Layer::Invalid)?;
                Ok(format!("Hypothesis {} moved to invalid", holon.id))
            }
        }
    }

    /// Records an empirical validation against a hypothesis, promoting it
    /// to L2 on a pass and invalidating it otherwise. Staleness clears on a
    /// pass and is preserved on a failure.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown hypothesis, an invalid test type or
    /// verdict, or a store failure.
    pub fn test_hypothesis(&self, input: &TestInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let verdict: CheckVerdict = input.verdict.parse()?;
        let validity_days = match input.test_type.as_str() {
            "internal" => INTERNAL_VALIDITY_DAYS,
            "external" => EXTERNAL_VALIDITY_DAYS,
            other => {
                return Err(ToolError::InvalidArgument(format!(
                    "test_type must be 'internal' or 'external', got '{other}'"
                )));
            }
        };
        store.set_phase(self.context(), Phase::Induction)?;

        let holon = self.lookup_hypothesis(&input.hypothesis_id)?;
        let valid_until = Utc::now() + Duration::days(validity_days);
        let assurance = if verdict == CheckVerdict::Pass {
            "L2"
        } else {
            "L1"
        };
        let evidence = Evidence::new(
            Tools::new_id("ev"),
            &holon.id,
            EvidenceType::TestResult,
            &input.result,
            verdict.evidence_verdict(),
        )
        .with_assurance_level(assurance)
        .with_carrier(carrier_or(&input.carrier_files, "test-runner"))
        .with_valid_until(valid_until);
        let evidence = self.stamp_commit(evidence);
        store.add_evidence(&evidence)?;
        mirror::write_evidence(self.root(), &evidence)?;

        match verdict {
            CheckVerdict::Pass => {
                store.clear_stale_for_holon(&holon.id)?;
                store.clear_needs_reverification(&holon.id)?;
                if matches!(holon.layer, Layer::L0 | Layer::L1) {
                    self.move_layer(&holon, Layer::L2)?;
                }
                Ok(format!(
                    "Hypothesis {} validated and promoted to L2 (evidence valid until {})",
                    holon.id,
                    valid_until.format("%Y-%m-%d")
                ))
            }
            CheckVerdict::Fail | CheckVerdict::Refine => {
                self.move_layer(&holon, Layer::Invalid)?;
                Ok(format!("Hypothesis {} moved to invalid", holon.id))
            }
        }
    }

    /// Records a risk review as audit evidence. The layer never changes.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown hypothesis or a store failure.
    pub fn audit_evidence(&self, input: &AuditInput) -> Result<String, ToolError> {
        let store = self.store()?;
        store.set_phase(self.context(), Phase::Audit)?;

        let holon = store.get_holon(&input.hypothesis_id).map_err(|_| {
            ToolError::NotFound {
                what: "hypothesis",
                id: input.hypothesis_id.clone(),
            }
        })?;
        let evidence = Evidence::new(
            Tools::new_id("ev"),
            &holon.id,
            EvidenceType::AuditReport,
            &input.risks,
            Verdict::Pass,
        )
        .with_assurance_level("L2")
        .with_carrier("auditor");
        store.add_evidence(&evidence)?;
        mirror::write_evidence(self.root(), &evidence)?;

        Ok(format!("Audit recorded for {}", holon.id))
    }

    fn lookup_hypothesis(&self, id: &str) -> Result<Holon, ToolError> {
        let holon = self
            .store()?
            .get_holon(id)
            .map_err(|_| ToolError::NotFound {
                what: "hypothesis",
                id: id.to_string(),
            })?;
        if holon.is_drr() {
            return Err(ToolError::InvalidArgument(format!(
                "'{id}' is a DRR; decision records are resolved, not re-verified"
            )));
        }
        Ok(holon)
    }

    fn stamp_commit(&self, evidence: Evidence) -> Evidence {
        match self.commit() {
            Some(commit) => evidence.with_carrier_commit(commit),
            None => evidence,
        }
    }

    pub(crate) fn move_layer(&self, holon: &Holon, to: Layer) -> Result<(), ToolError> {
        let store = self.store()?;
        store.update_holon_layer(&holon.id, to)?;
        let mut moved = holon.clone();
        moved.layer = to;
        mirror::move_holon(self.root(), &moved, holon.layer)?;
        Ok(())
    }
}

fn carrier_or(carrier_files: &str, fallback: &str) -> String {
    let trimmed = carrier_files.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use quint_core::{Evidence, EvidenceType, Holon, HolonKind, HolonType, Layer, Verdict};

    use crate::mirror;
    use crate::tools::testutil::tools_fixture;
    use crate::tools::{ToolError, Tools};

    use super::{AuditInput, TestInput, VerifyInput};

    fn seed(tools: &Tools, id: &str, layer: Layer) {
        let holon = Holon::new(
            id,
            HolonType::Hypothesis,
            HolonKind::System,
            layer,
            format!("Holon {id}"),
            "Content",
            "default",
            "global",
        );
        tools.store().unwrap().create_holon(&holon).unwrap();
        mirror::write_holon(tools.root(), &holon, None).unwrap();
    }

    fn verify(tools: &Tools, id: &str, verdict: &str) -> Result<String, ToolError> {
        tools.verify_hypothesis(&VerifyInput {
            hypothesis_id: id.to_string(),
            checks_json: r#"{"check":"ok"}"#.to_string(),
            verdict: verdict.to_string(),
            carrier_files: String::new(),
        })
    }

    fn test_run(tools: &Tools, id: &str, test_type: &str, verdict: &str) -> Result<String, ToolError> {
        tools.test_hypothesis(&TestInput {
            hypothesis_id: id.to_string(),
            test_type: test_type.to_string(),
            result: "observed".to_string(),
            verdict: verdict.to_string(),
            carrier_files: "src/cache.rs,src/api.rs".to_string(),
        })
    }

    #[test]
    fn verify_pass_promotes_to_l1() {
        let (tools, dir) = tools_fixture();
        seed(&tools, "test-verify-hypo", Layer::L0);

        let msg = verify(&tools, "test-verify-hypo", "PASS").unwrap();
        assert!(msg.contains("promoted to L1"));

        let holon = tools.store().unwrap().get_holon("test-verify-hypo").unwrap();
        assert_eq!(holon.layer, Layer::L1);
        assert!(mirror::holon_path(dir.path(), Layer::L1, "test-verify-hypo").exists());
        assert!(!mirror::holon_path(dir.path(), Layer::L0, "test-verify-hypo").exists());

        let evidence = tools.store().unwrap().evidence_for("test-verify-hypo").unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].evidence_type, EvidenceType::LogicCheck);
        assert_eq!(evidence[0].verdict, Verdict::Pass);
    }

    #[test]
    fn verify_fail_and_refine_invalidate() {
        let (tools, dir) = tools_fixture();
        seed(&tools, "test-fail-hypo", Layer::L0);
        seed(&tools, "test-refine-hypo", Layer::L0);

        let msg = verify(&tools, "test-fail-hypo", "FAIL").unwrap();
        assert_eq!(msg, "Hypothesis test-fail-hypo moved to invalid");
        assert_eq!(
            tools.store().unwrap().get_holon("test-fail-hypo").unwrap().layer,
            Layer::Invalid
        );
        assert!(mirror::holon_path(dir.path(), Layer::Invalid, "test-fail-hypo").exists());

        verify(&tools, "test-refine-hypo", "REFINE").unwrap();
        assert_eq!(
            tools
                .store()
                .unwrap()
                .get_holon("test-refine-hypo")
                .unwrap()
                .layer,
            Layer::Invalid
        );
    }

    #[test]
    fn verify_pass_clears_prior_staleness() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "stale-hypo", Layer::L0);
        let store = tools.store().unwrap();
        store
            .add_evidence(&Evidence::new(
                "old-ev",
                "stale-hypo",
                EvidenceType::TestResult,
                "old",
                Verdict::Pass,
            ))
            .unwrap();
        store.mark_evidence_stale("old-ev", "carrier file changed").unwrap();

        verify(&tools, "stale-hypo", "PASS").unwrap();
        assert!(store.stale_evidence_for("stale-hypo").unwrap().is_empty());
    }

    #[test]
    fn verify_rejects_unknown_ids_and_decision_records() {
        let (tools, _dir) = tools_fixture();
        assert!(matches!(
            verify(&tools, "ghost", "PASS"),
            Err(ToolError::NotFound { .. })
        ));

        let drr = Holon::new(
            "drr-1",
            HolonType::Drr,
            HolonKind::System,
            Layer::Drr,
            "Decision",
            "",
            "default",
            "",
        );
        tools.store().unwrap().create_holon(&drr).unwrap();
        assert!(matches!(
            verify(&tools, "drr-1", "PASS"),
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pass_promotes_to_l2_with_validity_horizon() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "hypo-l1", Layer::L1);

        let msg = test_run(&tools, "hypo-l1", "internal", "PASS").unwrap();
        assert!(msg.contains("promoted to L2"));

        let store = tools.store().unwrap();
        assert_eq!(store.get_holon("hypo-l1").unwrap().layer, Layer::L2);

        let evidence = store.evidence_for("hypo-l1").unwrap();
        assert_eq!(evidence[0].evidence_type, EvidenceType::TestResult);
        assert_eq!(evidence[0].assurance_level.as_deref(), Some("L2"));
        assert_eq!(evidence[0].carrier_ref.as_deref(), Some("src/cache.rs,src/api.rs"));

        let valid_until = evidence[0].valid_until.unwrap();
        let lower = Utc::now() + Duration::days(85);
        let upper = Utc::now() + Duration::days(95);
        assert!(valid_until > lower && valid_until < upper);
    }

    #[test]
    fn external_tests_decay_faster() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "hypo-ext", Layer::L1);

        test_run(&tools, "hypo-ext", "external", "PASS").unwrap();
        let evidence = tools.store().unwrap().evidence_for("hypo-ext").unwrap();
        let valid_until = evidence[0].valid_until.unwrap();
        let lower = Utc::now() + Duration::days(55);
        let upper = Utc::now() + Duration::days(65);
        assert!(valid_until > lower && valid_until < upper);
    }

    #[test]
    fn test_fail_invalidates_and_preserves_staleness() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "hypo-fail", Layer::L1);
        let store = tools.store().unwrap();
        store
            .add_evidence(&Evidence::new(
                "stale-ev",
                "hypo-fail",
                EvidenceType::TestResult,
                "old",
                Verdict::Pass,
            ))
            .unwrap();
        store.mark_evidence_stale("stale-ev", "carrier file changed").unwrap();

        let msg = test_run(&tools, "hypo-fail", "internal", "FAIL").unwrap();
        assert_eq!(msg, "Hypothesis hypo-fail moved to invalid");
        assert_eq!(store.get_holon("hypo-fail").unwrap().layer, Layer::Invalid);
        assert_eq!(store.stale_evidence_for("hypo-fail").unwrap().len(), 1);

        let evidence = store.evidence_for("hypo-fail").unwrap();
        let fail_ev = evidence.iter().find(|e| e.verdict == Verdict::Fail).unwrap();
        assert_eq!(fail_ev.assurance_level.as_deref(), Some("L1"));
    }

    #[test]
    fn test_pass_clears_staleness() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "stale-test-hypo", Layer::L1);
        let store = tools.store().unwrap();
        store
            .add_evidence(&Evidence::new(
                "stale-evidence-1",
                "stale-test-hypo",
                EvidenceType::TestResult,
                "Old test result",
                Verdict::Pass,
            ))
            .unwrap();
        store
            .mark_evidence_stale("stale-evidence-1", "carrier file changed")
            .unwrap();
        assert_eq!(store.stale_evidence_for("stale-test-hypo").unwrap().len(), 1);

        test_run(&tools, "stale-test-hypo", "internal", "PASS").unwrap();
        assert!(store.stale_evidence_for("stale-test-hypo").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unknown_test_type() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "hypo-x", Layer::L1);
        assert!(matches!(
            test_run(&tools, "hypo-x", "vibes", "PASS"),
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn audit_records_evidence_without_layer_change() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "audit-hypo", Layer::L2);

        let msg = tools
            .audit_evidence(&AuditInput {
                hypothesis_id: "audit-hypo".to_string(),
                risks: "Risk analysis content".to_string(),
            })
            .unwrap();
        assert_eq!(msg, "Audit recorded for audit-hypo");

        let store = tools.store().unwrap();
        assert_eq!(store.get_holon("audit-hypo").unwrap().layer, Layer::L2);
        let evidence = store.evidence_for("audit-hypo").unwrap();
        assert_eq!(evidence[0].evidence_type, EvidenceType::AuditReport);
        assert_eq!(evidence[0].verdict, Verdict::Pass);
        assert_eq!(store.get_phase("default").unwrap(), quint_core::Phase::Audit);
    }
}
