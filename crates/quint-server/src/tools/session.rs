//! Session entry and cycle reset.

use std::fmt::Write as _;

use chrono::Utc;

use quint_core::{Layer, Phase};

use crate::mirror;
use crate::store::LayerCounts;

use super::{ToolError, Tools};

/// Session status reported by `quint_internalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    /// First call: project structure and store were just created.
    Initialized,
    /// Context is fresh; nothing changed since the last session.
    Ready,
    /// The workspace moved to a new commit since the last session.
    Updated,
}

impl SessionStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "INITIALIZED",
            Self::Ready => "READY",
            Self::Updated => "UPDATED",
        }
    }
}

impl Tools {
    /// Idempotent session entry point. The first call scaffolds the
    /// `.quint` layout, opens the store (running migrations) and starts the
    /// cycle in abduction; later calls report the knowledge state and
    /// whether the workspace moved underneath it.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be opened or queried.
    pub fn internalize(&mut self) -> Result<String, ToolError> {
        mirror::ensure_layout(self.root())?;
        self.ensure_store()?;
        let context = self.context().to_string();
        let commit = self.commit().map(str::to_string);
        let store = self.store()?;

        let state = store.fpf_state(&context)?;
        let (status, phase) = match state {
            None => {
                store.set_phase(&context, Phase::Abduction)?;
                store.set_session_id(&context, &Tools::new_id("session"))?;
                if let Some(commit) = &commit {
                    store.set_last_commit(&context, commit)?;
                }
                (SessionStatus::Initialized, Phase::Abduction)
            }
            Some(state) => {
                let status = match (&commit, &state.last_commit) {
                    (Some(current), Some(previous)) if current != previous => {
                        store.set_last_commit(&context, current)?;
                        SessionStatus::Updated
                    }
                    (Some(current), None) => {
                        store.set_last_commit(&context, current)?;
                        SessionStatus::Ready
                    }
                    _ => SessionStatus::Ready,
                };
                (status, state.phase)
            }
        };

        let counts = store.count_active_by_layer(&context)?;
        let archived = store.count_archived(&context)?;
        let recent = store.recent_holons(&context, 5)?;
        let open = store.open_decisions(&context)?;
        let resolved = store.resolved_decisions(&context, None, 3)?;
        let now = Utc::now();
        let decaying = store.decayed_evidence(now)?;
        let stale = store.all_stale_evidence()?;

        let mut out = String::new();
        let _ = writeln!(out, "Status: {}", status.as_str());
        let _ = writeln!(out, "Phase: {phase}");
        let _ = writeln!(out, "Role: {}", phase.role_name());
        if status == SessionStatus::Updated {
            let _ = writeln!(
                out,
                "Workspace moved to a new commit; re-check evidence whose carriers changed."
            );
        }

        let _ = writeln!(out, "\nKnowledge state:");
        write_layer_counts(&mut out, counts);
        if archived > 0 {
            let _ = writeln!(out, "  Archived: {archived} holons in resolved decisions");
        }

        if !recent.is_empty() {
            let _ = writeln!(out, "\nRecent holons:");
            for holon in &recent {
                let _ = writeln!(
                    out,
                    "  - {} [{}] R: {:.2} {}",
                    holon.id, holon.layer, holon.cached_r_score, holon.title
                );
            }
        }

        if !open.is_empty() {
            let _ = writeln!(out, "\nOpen Decisions:");
            for decision in &open {
                let _ = writeln!(out, "  - {}: {}", decision.id, decision.title);
            }
        }

        if !resolved.is_empty() {
            let _ = writeln!(out, "\nRecent resolutions:");
            for (decision, resolution) in &resolved {
                let _ = writeln!(out, "  - {}: {resolution}", decision.id);
            }
        }

        if !decaying.is_empty() {
            let _ = writeln!(out, "\nDecaying evidence:");
            for item in &decaying {
                let until = item
                    .valid_until
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                let _ = writeln!(out, "  - {} on {} (expired {until})", item.id, item.holon_id);
            }
        }
        if !stale.is_empty() {
            let _ = writeln!(out, "\nStale evidence:");
            for item in &stale {
                let _ = writeln!(
                    out,
                    "  - {} on {}: {}",
                    item.id,
                    item.holon_id,
                    item.stale_reason.as_deref().unwrap_or("carrier changed")
                );
            }
        }

        let _ = writeln!(out, "\nNext: {}", next_action_hint(phase));
        Ok(out.trim_end().to_string())
    }

    /// Resets the cycle to idle without touching holons or evidence. Never
    /// creates a decision record.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is not open or fails.
    pub fn reset_cycle(&self, reason: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let context = self.context();
        let reason = if reason.trim().is_empty() {
            "user requested reset"
        } else {
            reason.trim()
        };

        let previous = store.get_phase(context)?;
        store.set_phase(context, Phase::Idle)?;

        let counts = store.count_active_by_layer(context)?;
        let open = store.open_decisions(context)?;

        let mut out = String::new();
        let _ = writeln!(out, "✅ Cycle reset to IDLE");
        let _ = writeln!(out, "Previous phase: {previous}");
        let _ = writeln!(out, "Reason: {reason}");
        let _ = writeln!(out, "\nKnowledge state:");
        let _ = writeln!(out, "  L0: {}", counts.l0);
        let _ = writeln!(out, "  L1: {}", counts.l1);
        let _ = writeln!(out, "  L2: {}", counts.l2);
        let _ = writeln!(out, "  Invalid: {}", counts.invalid);
        if open.is_empty() {
            let _ = writeln!(out, "Open decisions: none");
        } else {
            let _ = writeln!(out, "Open decisions:");
            for decision in &open {
                let _ = writeln!(out, "  - {}: {}", decision.id, decision.title);
            }
        }
        Ok(out.trim_end().to_string())
    }
}

fn write_layer_counts(out: &mut String, counts: LayerCounts) {
    for (layer, count) in [
        (Layer::L0, counts.l0),
        (Layer::L1, counts.l1),
        (Layer::L2, counts.l2),
    ] {
        let _ = writeln!(out, "  {} ({}): {count}", layer, layer.description());
    }
    if counts.invalid > 0 {
        let _ = writeln!(out, "  invalid: {}", counts.invalid);
    }
}

fn next_action_hint(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "start a cycle by proposing a hypothesis with quint_propose.",
        Phase::Abduction => {
            "propose competing hypotheses with quint_propose, then verify one with quint_verify."
        }
        Phase::Deduction => "verify L0 hypotheses with quint_verify.",
        Phase::Induction => "validate L1 hypotheses with quint_test.",
        Phase::Audit => "review risks with quint_audit, then finalize with quint_decide.",
        Phase::Decision => "finalize with quint_decide, or reset the cycle with quint_reset.",
    }
}
