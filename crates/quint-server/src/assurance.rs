//! Effective-reliability (R_eff) calculator.
//!
//! The calculator is a pure function over the store: given a holon it walks
//! the dependency subgraph depth-first and aggregates scores under the
//! weakest-link discipline. Nothing here mutates state; callers persist the
//! resulting score into the holon's cache themselves.
//!
//! # Scoring
//!
//! The *self score* is the minimum over the holon's own evidence. Each item
//! scores 1.0 for a fresh pass (0.9 when the evidence is external or
//! research-derived), 0.5 for a degrade, 0.0 for a fail, 0.1 once decayed
//! past its validity horizon, and 0.2 when marked stale by a carrier change.
//! An active waiver overrides decay and staleness, counting the item as a
//! full pass until the declared date.
//!
//! The *dependency score* is the minimum over all outgoing `componentOf` and
//! `constituentOf` edges, each dependency's R_eff multiplied by its
//! congruence penalty. `memberOf`, `selects` and `rejects` edges are
//! ignored. R_eff is the minimum of both scores.
//!
//! # Cycles
//!
//! The traversal carries a path-scoped visited set. A dependency already on
//! the current path is skipped and recorded as a broken cycle; traversal
//! always terminates. Completed subtrees are memoised so shared
//! dependencies are evaluated once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use quint_core::{
    clamp_score, congruence_penalty, DependencyReport, Evidence, ReliabilityReport, Verdict,
};

use crate::store::{Store, StoreError};

/// Errors surfaced by a reliability computation.
#[derive(Debug, Error)]
pub enum CalculatorError {
    /// The requested holon does not exist.
    #[error("holon not found: {id}")]
    NotFound {
        /// The missing identifier.
        id: String,
    },

    /// The store failed underneath the traversal.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reliability calculator over a store snapshot.
#[derive(Debug)]
pub struct Calculator<'a> {
    store: &'a Store,
}

impl<'a> Calculator<'a> {
    /// Creates a calculator reading from the given store.
    #[must_use]
    pub const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Computes the effective reliability of a holon with a full breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`CalculatorError::NotFound`] for an unknown holon id and
    /// propagates store failures. Cycles in the dependency subgraph are
    /// never an error.
    pub fn reliability(&self, holon_id: &str) -> Result<ReliabilityReport, CalculatorError> {
        if !self.store.holon_exists(holon_id)? {
            return Err(CalculatorError::NotFound {
                id: holon_id.to_string(),
            });
        }
        let now = Utc::now();
        let mut path = HashSet::new();
        let mut memo = HashMap::new();
        self.evaluate(holon_id, now, &mut path, &mut memo)
    }

    fn evaluate(
        &self,
        holon_id: &str,
        now: DateTime<Utc>,
        path: &mut HashSet<String>,
        memo: &mut HashMap<String, ReliabilityReport>,
    ) -> Result<ReliabilityReport, CalculatorError> {
        if let Some(done) = memo.get(holon_id) {
            return Ok(done.clone());
        }
        path.insert(holon_id.to_string());

        let mut report = ReliabilityReport::empty(holon_id);
        let evidence = self.store.evidence_for(holon_id)?;
        let (self_score, stale_ids) = self.score_evidence(&evidence, now, &mut report.factors)?;
        report.self_score = self_score;
        report.stale_evidence = stale_ids;
        if !report.stale_evidence.is_empty() {
            report.stale_penalty = clamp_score(1.0 - self_score);
        }

        let mut weakest_dependency: Option<(String, f64)> = None;
        for relation in self.store.dependencies_of(holon_id)? {
            if path.contains(&relation.target_id) {
                report.factors.push(format!(
                    "Cycle broken at {} (already on the evaluation path)",
                    relation.target_id
                ));
                continue;
            }
            let sub = self.evaluate(&relation.target_id, now, path, memo)?;
            let penalty = congruence_penalty(relation.congruence_level);
            let penalised = clamp_score(sub.final_score * penalty);
            if penalty < 1.0 {
                report.factors.push(format!(
                    "{} penalty applied to dependency {}",
                    relation.congruence_level, relation.target_id
                ));
            }
            if weakest_dependency
                .as_ref()
                .map_or(true, |(_, weakest)| penalised < *weakest)
            {
                weakest_dependency = Some((relation.target_id.clone(), penalised));
            }
            report.dependencies.push(DependencyReport {
                congruence_level: relation.congruence_level,
                penalised_score: penalised,
                report: sub,
            });
        }

        match weakest_dependency {
            Some((target, dependency_score)) if dependency_score < self_score => {
                report.final_score = dependency_score;
                report.weakest_link = target;
            }
            _ => {
                report.final_score = self_score;
                report.weakest_link = holon_id.to_string();
            }
        }
        report.final_score = clamp_score(report.final_score);

        path.remove(holon_id);
        debug!(
            holon = holon_id,
            score = report.final_score,
            weakest = %report.weakest_link,
            "reliability evaluated"
        );
        memo.insert(holon_id.to_string(), report.clone());
        Ok(report)
    }

    /// Weakest-link score over one holon's evidence. Returns the score and
    /// the ids of stale items that contributed to it.
    fn score_evidence(
        &self,
        evidence: &[Evidence],
        now: DateTime<Utc>,
        factors: &mut Vec<String>,
    ) -> Result<(f64, Vec<String>), CalculatorError> {
        if evidence.is_empty() {
            factors.push("No evidence".to_string());
            return Ok((0.0, Vec::new()));
        }

        let mut minimum = f64::MAX;
        let mut stale_ids = Vec::new();
        for item in evidence {
            let score = if let Some(waiver) = self.store.active_waiver_for(&item.id, now)? {
                factors.push(format!(
                    "Evidence {} waived until {}",
                    item.id,
                    waiver.waived_until.format("%Y-%m-%d")
                ));
                1.0
            } else if item.is_stale {
                stale_ids.push(item.id.clone());
                factors.push(format!(
                    "Evidence stale: {}",
                    item.stale_reason.as_deref().unwrap_or("carrier changed")
                ));
                0.2
            } else if item.is_decayed(now) {
                let until = item
                    .valid_until
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                factors.push(format!("Evidence decayed past {until}"));
                0.1
            } else {
                match item.verdict {
                    Verdict::Fail => {
                        factors.push("Evidence fail".to_string());
                        0.0
                    }
                    Verdict::Degrade => 0.5,
                    Verdict::Pass => {
                        if item.evidence_type.is_external() {
                            factors.push("External evidence CL2 penalty applied".to_string());
                            0.9
                        } else {
                            1.0
                        }
                    }
                }
            };
            minimum = minimum.min(clamp_score(score));
        }
        Ok((clamp_score(minimum), stale_ids))
    }
}
