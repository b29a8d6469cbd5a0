//! Evidence decay management: freshness reports, deprecation, waivers.
//!
//! This entry point is not part of the JSON-RPC catalogue; `internalize`
//! surfaces its report and the engine exposes the waiver and deprecation
//! paths to embedders and tests.

use std::fmt::Write as _;

use chrono::Utc;

use quint_core::Layer;

use crate::store::Waiver;

use super::{parse_flexible_datetime, ToolError, Tools, ACTOR};

impl Tools {
    /// Decay management. Exactly one of the argument groups applies:
    ///
    /// - `deprecate_id` set: moves an L2 holon back to L1 for
    ///   re-validation;
    /// - `waive_evidence_id` set: records a waiver (until `waive_until`,
    ///   with a mandatory rationale) that lets stale or expired evidence
    ///   count until the declared date;
    /// - neither set: reports expired, stale and waived evidence.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing holon or evidence record, a
    /// deprecation outside L2, or a waiver without date or rationale.
    pub fn check_decay(
        &self,
        deprecate_id: &str,
        waive_evidence_id: &str,
        waive_until: &str,
        rationale: &str,
    ) -> Result<String, ToolError> {
        if !deprecate_id.trim().is_empty() {
            return self.deprecate_holon(deprecate_id.trim());
        }
        if !waive_evidence_id.trim().is_empty() {
            return self.waive_evidence(waive_evidence_id.trim(), waive_until, rationale);
        }
        self.freshness_report()
    }

    fn deprecate_holon(&self, holon_id: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let holon = store.get_holon(holon_id)?;
        if holon.layer != Layer::L2 {
            return Err(ToolError::InvalidArgument(format!(
                "cannot deprecate {} holon '{holon_id}'; only L2 holons can be deprecated",
                holon.layer
            )));
        }
        self.move_layer(&holon, Layer::L1)?;
        store.mark_needs_reverification(holon_id, "deprecated pending re-validation")?;
        Ok(format!(
            "✅ Deprecated '{holon_id}': L2 → L1 (re-validate with quint_test)"
        ))
    }

    fn waive_evidence(
        &self,
        evidence_id: &str,
        waive_until: &str,
        rationale: &str,
    ) -> Result<String, ToolError> {
        let store = self.store()?;
        let Some(waived_until) = parse_flexible_datetime(waive_until) else {
            return Err(ToolError::InvalidArgument(
                "waive_until is required (YYYY-MM-DD) to record a waiver".to_string(),
            ));
        };
        if rationale.trim().is_empty() {
            return Err(ToolError::InvalidArgument(
                "a rationale is required to record a waiver".to_string(),
            ));
        }
        let evidence = store.get_evidence(evidence_id)?;

        store.insert_waiver(&Waiver {
            id: Tools::new_id("waiver"),
            evidence_id: evidence.id.clone(),
            waived_until,
            rationale: rationale.trim().to_string(),
            actor: ACTOR.to_string(),
            created_at: Utc::now(),
        })?;

        Ok(format!(
            "✅ Waiver recorded for evidence '{}' until {}\nRationale: {}",
            evidence.id,
            waived_until.format("%Y-%m-%d"),
            rationale.trim()
        ))
    }

    fn freshness_report(&self) -> Result<String, ToolError> {
        let store = self.store()?;
        let now = Utc::now();
        let expired = store.decayed_evidence(now)?;
        let stale = store.all_stale_evidence()?;

        if expired.is_empty() && stale.is_empty() {
            return Ok("All holons FRESH: no expired or stale evidence.".to_string());
        }

        let mut out = String::new();
        for item in &expired {
            let title = store.get_holon_title(&item.holon_id).unwrap_or_default();
            let until = item
                .valid_until
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "⚠️ EXPIRED: evidence {} on {} {title} (valid_until {until})",
                item.id, item.holon_id
            );
        }
        for item in &stale {
            if let Some(waiver) = store.active_waiver_for(&item.id, now)? {
                let _ = writeln!(
                    out,
                    "WAIVED: evidence {} on {} until {}",
                    item.id,
                    item.holon_id,
                    waiver.waived_until.format("%Y-%m-%d")
                );
            } else {
                let _ = writeln!(
                    out,
                    "⚠️ STALE: evidence {} on {}: {}",
                    item.id,
                    item.holon_id,
                    item.stale_reason.as_deref().unwrap_or("carrier changed")
                );
            }
        }
        out.push_str("Re-verify with quint_verify / quint_test, or record a waiver.");
        Ok(out)
    }
}
