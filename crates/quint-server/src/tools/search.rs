//! Full-text search over the knowledge base.

use serde::Deserialize;

use quint_core::{Contract, Layer, Resolution};

use crate::store::{EvidenceHit, HolonHit};

use super::{ToolError, Tools};

/// Arguments of `quint_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    /// Search terms.
    pub query: String,
    /// `holons`, `evidence`, or `all` (the default).
    #[serde(default)]
    pub scope: String,
    /// Restrict holon hits to one layer.
    #[serde(default)]
    pub layer_filter: String,
    /// Restrict decision hits by resolution status: `open`, `implemented`,
    /// `abandoned`, or `superseded`.
    #[serde(default)]
    pub status_filter: String,
    /// Restrict decision hits to those whose contract affects a path.
    #[serde(default)]
    pub affected_scope_filter: String,
    /// Maximum results, clamped to 1..=50.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchScope {
    Holons,
    Evidence,
    All,
}

impl Tools {
    /// Searches holons and evidence, applying the optional layer, status
    /// and affected-scope filters.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty query or invalid filter values, and
    /// propagates store failures.
    pub fn search(&self, input: &SearchInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let query = input.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }

        let scope = match input.scope.as_str() {
            "" | "all" => SearchScope::All,
            "holons" => SearchScope::Holons,
            "evidence" => SearchScope::Evidence,
            other => {
                return Err(ToolError::InvalidArgument(format!(
                    "scope must be 'holons', 'evidence' or 'all', got '{other}'"
                )));
            }
        };
        let layer = match input.layer_filter.as_str() {
            "" => None,
            raw => Some(raw.parse::<Layer>()?),
        };
        let status = match input.status_filter.as_str() {
            "" => None,
            "open" => Some(None),
            raw => Some(Some(raw.parse::<Resolution>()?)),
        };
        let limit = input.limit.clamp(1, 50);

        let mut holon_hits: Vec<HolonHit> = Vec::new();
        if scope != SearchScope::Evidence {
            holon_hits = store.search_holons(query, layer, limit)?;
            if let Some(wanted) = &status {
                let mut filtered = Vec::new();
                for hit in holon_hits {
                    if hit.holon_type != quint_core::HolonType::Drr && hit.layer != Layer::Drr {
                        continue;
                    }
                    if store.resolution_of(&hit.id)? == *wanted {
                        filtered.push(hit);
                    }
                }
                holon_hits = filtered;
            }
            if !input.affected_scope_filter.trim().is_empty() {
                let needle = input.affected_scope_filter.trim();
                let mut filtered = Vec::new();
                for hit in holon_hits {
                    if self.affects_scope(&hit.id, needle)? {
                        filtered.push(hit);
                    }
                }
                holon_hits = filtered;
            }
        }

        let evidence_hits: Vec<EvidenceHit> = if scope == SearchScope::Holons {
            Vec::new()
        } else {
            store.search_evidence(query, limit)?
        };

        if holon_hits.is_empty() && evidence_hits.is_empty() {
            return Ok(format!("No results found for '{query}'"));
        }

        let mut out = vec![format!(
            "Search results for '{query}' ({} found):",
            holon_hits.len() + evidence_hits.len()
        )];
        if !holon_hits.is_empty() {
            out.push(String::new());
            out.push("Holons:".to_string());
            for (index, hit) in holon_hits.iter().enumerate() {
                out.push(format!(
                    "{}. [{}] {} ({}) R: {:.2}",
                    index + 1,
                    hit.layer,
                    hit.title,
                    hit.id,
                    hit.cached_r_score
                ));
                let snippet = hit.snippet.trim();
                if !snippet.is_empty() {
                    out.push(format!("   {snippet}"));
                }
            }
        }
        if !evidence_hits.is_empty() {
            out.push(String::new());
            out.push("Evidence:".to_string());
            for (index, hit) in evidence_hits.iter().enumerate() {
                out.push(format!(
                    "{}. [{}] on {} (verdict: {})",
                    index + 1,
                    hit.evidence_type,
                    hit.holon_id,
                    hit.verdict
                ));
                let snippet = hit.snippet.trim();
                if !snippet.is_empty() {
                    out.push(format!("   {snippet}"));
                }
            }
        }
        Ok(out.join("\n"))
    }

    /// Whether a decision's contract names a scope pattern matching the
    /// filter, by substring in either direction or by `*` glob.
    fn affects_scope(&self, holon_id: &str, needle: &str) -> Result<bool, ToolError> {
        let holon = self.store()?.get_holon(holon_id)?;
        let Some(raw) = holon.contract.as_deref() else {
            return Ok(false);
        };
        let Ok(contract) = Contract::parse(raw) else {
            return Ok(false);
        };
        Ok(contract
            .affected_scope
            .iter()
            .any(|pattern| scope_matches(pattern, needle)))
    }
}

/// Matches a contract scope pattern against a path filter. Patterns with
/// `*` are treated as globs; plain patterns match by substring in either
/// direction.
fn scope_matches(pattern: &str, needle: &str) -> bool {
    if pattern.contains('*') {
        glob_match(pattern, needle)
    } else {
        pattern.contains(needle) || needle.contains(pattern)
    }
}

/// Minimal `*`-only glob matcher.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut position = 0;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match text[position..].find(part) {
            Some(found) => {
                // Without a leading `*` the first part must anchor at the
                // start; without a trailing `*` the last part must anchor
                // at the end.
                if index == 0 && found != 0 {
                    return false;
                }
                position += found + part.len();
            }
            None => return false,
        }
    }
    if !pattern.ends_with('*') {
        if let Some(last) = parts.last().filter(|p| !p.is_empty()) {
            return text.ends_with(last) && position <= text.len();
        }
    }
    true
}
