//! Reliability reports and assurance-tree rendering.

use std::fmt::Write as _;

use quint_core::{congruence_penalty, CongruenceLevel, ReliabilityReport};

use crate::assurance::Calculator;

use super::{ToolError, Tools};

impl Tools {
    /// Computes a holon's effective reliability and formats the breakdown.
    /// The fresh score is persisted into the holon's cache.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown holon or a store failure.
    pub fn calculate_r(&self, holon_id: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let report = Calculator::new(store).reliability(holon_id)?;
        store.update_cached_score(holon_id, report.final_score)?;

        let title = store.get_holon_title(holon_id).unwrap_or_default();
        let mut out = String::new();
        let _ = writeln!(out, "Reliability Report for '{holon_id}' {title}");
        let _ = writeln!(out, "R_eff: {:.2}", report.final_score);
        let _ = writeln!(out, "Self score: {:.2}", report.self_score);
        let _ = writeln!(out, "Weakest link: {}", report.weakest_link);
        if report.stale_penalty > 0.0 {
            let _ = writeln!(out, "Stale penalty: {:.2}", report.stale_penalty);
        }
        if !report.stale_evidence.is_empty() {
            let _ = writeln!(out, "Stale evidence: {}", report.stale_evidence.join(", "));
        }
        if !report.factors.is_empty() {
            let _ = writeln!(out, "Factors:");
            for factor in &report.factors {
                let _ = writeln!(out, "  - {factor}");
            }
        }
        if !report.dependencies.is_empty() {
            let _ = writeln!(out, "Dependencies:");
            for dependency in &report.dependencies {
                let _ = writeln!(
                    out,
                    "  - {}: R {:.2} ({}, effective {:.2})",
                    dependency.report.holon_id,
                    dependency.report.final_score,
                    dependency.congruence_level,
                    dependency.penalised_score
                );
            }
        }
        Ok(out.trim_end().to_string())
    }

    /// Renders the dependency subtree of a holon with reliability
    /// annotations and congruence markers on each edge.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown holon or a store failure.
    pub fn audit_tree(&self, holon_id: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let report = Calculator::new(store).reliability(holon_id)?;
        store.update_cached_score(holon_id, report.final_score)?;

        let mut out = format!(
            "Assurance tree for '{holon_id}' (R_eff {:.2})\n",
            report.final_score
        );
        render_node(&mut out, &report, None, 0);
        Ok(out.trim_end().to_string())
    }
}

fn render_node(
    out: &mut String,
    report: &ReliabilityReport,
    edge: Option<CongruenceLevel>,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let marker = match edge {
        Some(congruence) if congruence_penalty(congruence) < 1.0 => {
            format!(" [{congruence} x{:.1}]", congruence_penalty(congruence))
        }
        Some(congruence) => format!(" [{congruence}]"),
        None => String::new(),
    };
    let stale = if report.stale_evidence.is_empty() {
        ""
    } else {
        " ⚠ stale"
    };
    let _ = writeln!(
        out,
        "{indent}└─ {} R: {:.2}{marker}{stale}",
        report.holon_id, report.final_score
    );
    for dependency in &report.dependencies {
        render_node(
            out,
            &dependency.report,
            Some(dependency.congruence_level),
            depth + 1,
        );
    }
}
