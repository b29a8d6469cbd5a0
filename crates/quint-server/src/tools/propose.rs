//! Hypothesis proposal.

use serde::Deserialize;

use quint_core::{
    slugify, CongruenceLevel, Holon, HolonKind, HolonType, Layer, Phase, RelationType,
};

use crate::mirror;

use super::{ToolError, Tools};

/// Arguments of `quint_propose`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposeInput {
    /// Hypothesis title; the identifier slug is derived from it.
    pub title: String,
    /// Body of the claim.
    pub content: String,
    /// Where the claim applies.
    pub scope: String,
    /// `system` or `episteme`.
    pub kind: String,
    /// Why the hypothesis is being proposed.
    pub rationale: String,
    /// Parent decision id grouping competing alternatives.
    #[serde(default)]
    pub decision_context: String,
    /// Holons this hypothesis requires to work.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Congruence level for the dependency edges.
    #[serde(default = "default_dependency_cl")]
    pub dependency_cl: i64,
}

const fn default_dependency_cl() -> i64 {
    3
}

impl Tools {
    /// Creates an L0 hypothesis, links its declared dependencies, and
    /// surfaces potential dependencies detected by full-text search.
    ///
    /// Missing dependency targets and cycle-creating edges are skipped with
    /// a warning line; they never fail the proposal.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid kind or congruence level, and
    /// propagates store and mirror failures.
    pub fn propose_hypothesis(&self, input: &ProposeInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let kind: HolonKind = input.kind.parse().map_err(|_| {
            ToolError::InvalidArgument(format!(
                "kind must be 'system' or 'episteme', got '{}'",
                input.kind
            ))
        })?;
        let Some(dependency_cl) = CongruenceLevel::new(input.dependency_cl) else {
            return Err(ToolError::InvalidArgument(format!(
                "dependency_cl must be between 1 and 3, got {}",
                input.dependency_cl
            )));
        };

        store.set_phase(self.context(), Phase::Abduction)?;

        let id = self.unique_holon_id(&input.title)?;
        let holon = Holon::new(
            &id,
            HolonType::Hypothesis,
            kind,
            Layer::L0,
            &input.title,
            &input.content,
            self.context(),
            &input.scope,
        );
        store.create_holon(&holon)?;
        let path = mirror::write_holon(self.root(), &holon, Some(&input.rationale))?;

        let mut out = vec![
            format!("✅ Hypothesis created: {id}"),
            format!("Layer: L0 ({})", Layer::L0.description()),
            format!("File: {}", path.display()),
        ];

        let relation = kind.dependency_relation();
        for dependency in &input.depends_on {
            if !store.holon_exists(dependency)? {
                out.push(format!(
                    "⚠️ Skipped dependency '{dependency}': holon not found"
                ));
                continue;
            }
            if store.relation_exists(&id, dependency, relation)? {
                out.push(format!(
                    "⚠️ Skipped dependency '{dependency}': relation already exists"
                ));
                continue;
            }
            if store.would_create_cycle(&id, dependency)? {
                out.push(format!(
                    "⚠️ Skipped dependency '{dependency}': would create a dependency cycle"
                ));
                continue;
            }
            store.create_relation(&id, dependency, relation, dependency_cl)?;
            out.push(format!(
                "Linked dependency: {id} -[{relation} {dependency_cl}]-> {dependency}"
            ));
        }

        if !input.decision_context.is_empty() {
            if store.holon_exists(&input.decision_context)? {
                store.create_relation(
                    &id,
                    &input.decision_context,
                    RelationType::MemberOf,
                    CongruenceLevel::Cl3,
                )?;
                out.push(format!(
                    "Grouped under decision context '{}' (memberOf; does not affect R_eff)",
                    input.decision_context
                ));
            } else {
                out.push(format!(
                    "⚠️ Skipped decision context '{}': holon not found",
                    input.decision_context
                ));
            }
        }

        if input.depends_on.is_empty() {
            let advisory = self.dependency_advisory(&id, &input.title, &input.content)?;
            out.extend(advisory);
        }

        Ok(out.join("\n"))
    }

    /// Looks for existing holons the new hypothesis might depend on, using
    /// the same full-text index the search tool queries.
    fn dependency_advisory(
        &self,
        new_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Vec<String>, ToolError> {
        let store = self.store()?;
        let query = format!("{title} {content}");
        let hits: Vec<_> = store
            .suggest_holons(&query, 6)?
            .into_iter()
            .filter(|hit| hit.id != new_id)
            .take(5)
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines = vec![
            String::new(),
            "⚠️ POTENTIAL DEPENDENCIES DETECTED (ranked by relevance):".to_string(),
        ];
        for hit in hits {
            lines.push(format!("  - {} [{}] {}", hit.id, hit.layer, hit.title));
            lines.push(format!(
                "    quint_link(source_id=\"{new_id}\", target_id=\"{}\")",
                hit.id
            ));
        }
        lines.push(
            "If this hypothesis requires any of these to work, link them so WLNK applies."
                .to_string(),
        );
        Ok(lines)
    }

    /// Derives a unique holon id: the title slug when free, a generated id
    /// otherwise.
    fn unique_holon_id(&self, title: &str) -> Result<String, ToolError> {
        let store = self.store()?;
        let slug = slugify(title);
        if !slug.is_empty() && !store.holon_exists(&slug)? {
            return Ok(slug);
        }
        Ok(Tools::new_id("holon"))
    }
}
