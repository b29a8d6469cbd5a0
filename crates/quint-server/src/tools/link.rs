//! Dependency linking between existing holons.

use serde::Deserialize;

use quint_core::{congruence_penalty, CongruenceLevel};

use super::{ToolError, Tools};

/// Arguments of `quint_link`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkInput {
    /// The holon that depends on the target.
    pub source_id: String,
    /// The holon being depended upon.
    pub target_id: String,
    /// Congruence level of the edge; out-of-range values fall back to CL3.
    #[serde(default = "default_cl")]
    pub congruence_level: i64,
}

const fn default_cl() -> i64 {
    3
}

impl Tools {
    /// Adds a dependency edge from source to target, typed by the source's
    /// kind. The new edge immediately caps the source's effective
    /// reliability under weakest-link aggregation.
    ///
    /// # Errors
    ///
    /// Returns an error when either holon is missing, the edge would close
    /// a dependency cycle, or the edge already exists.
    pub fn link_holons(&self, input: &LinkInput) -> Result<String, ToolError> {
        let store = self.store()?;
        let source = store
            .get_holon(&input.source_id)
            .map_err(|_| ToolError::NotFound {
                what: "source holon",
                id: input.source_id.clone(),
            })?;
        let target = store
            .get_holon(&input.target_id)
            .map_err(|_| ToolError::NotFound {
                what: "target holon",
                id: input.target_id.clone(),
            })?;

        let congruence = CongruenceLevel::new_or_default(input.congruence_level);
        let relation = source.kind.dependency_relation();
        store.create_relation(&source.id, &target.id, relation, congruence)?;

        let penalty = congruence_penalty(congruence);
        Ok(format!(
            "✅ Linked {} -[{relation} {congruence}]-> {}\n\
             WLNK now applies: R_eff({}) ≤ {penalty:.1} × R_eff({}). A weak dependency caps \
             this holon's score.",
            source.id, target.id, source.id, target.id
        ))
    }
}

#[cfg(test)]
mod tests {
    use quint_core::{CongruenceLevel, Holon, HolonKind, HolonType, Layer, RelationType};

    use crate::tools::testutil::tools_fixture;
    use crate::tools::{ToolError, Tools};

    use super::LinkInput;

    fn seed(tools: &Tools, id: &str, kind: HolonKind) {
        tools
            .store()
            .unwrap()
            .create_holon(&Holon::new(
                id,
                HolonType::Hypothesis,
                kind,
                Layer::L0,
                format!("Holon {id}"),
                "content",
                "default",
                "",
            ))
            .unwrap();
    }

    fn link(tools: &Tools, source: &str, target: &str, cl: i64) -> Result<String, ToolError> {
        tools.link_holons(&LinkInput {
            source_id: source.to_string(),
            target_id: target.to_string(),
            congruence_level: cl,
        })
    }

    #[test]
    fn links_with_component_edge_for_system_kind() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "source", HolonKind::System);
        seed(&tools, "target", HolonKind::System);

        let out = link(&tools, "source", "target", 3).unwrap();
        assert!(out.contains("✅ Linked"));
        assert!(out.contains("componentOf"));
        assert!(out.contains("WLNK now applies"));

        let deps = tools.store().unwrap().dependencies_of("source").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target_id, "target");
        assert_eq!(deps[0].congruence_level, CongruenceLevel::Cl3);
    }

    #[test]
    fn episteme_kind_links_with_constituent_edge() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "claim", HolonKind::Episteme);
        seed(&tools, "target", HolonKind::System);

        let out = link(&tools, "claim", "target", 3).unwrap();
        assert!(out.contains("constituentOf"));

        let deps = tools.store().unwrap().dependencies_of("claim").unwrap();
        assert_eq!(deps[0].relation_type, RelationType::ConstituentOf);
    }

    #[test]
    fn missing_endpoints_are_named_in_the_error() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "present", HolonKind::System);

        let err = link(&tools, "ghost", "present", 3).unwrap_err();
        assert!(err.to_string().contains("source holon"));

        let err = link(&tools, "present", "ghost", 3).unwrap_err();
        assert!(err.to_string().contains("target holon"));
    }

    #[test]
    fn cycles_are_rejected() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "a", HolonKind::System);
        seed(&tools, "b", HolonKind::System);

        link(&tools, "a", "b", 3).unwrap();
        let err = link(&tools, "b", "a", 3).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "a", HolonKind::System);
        seed(&tools, "b", HolonKind::System);

        link(&tools, "a", "b", 3).unwrap();
        let err = link(&tools, "a", "b", 3).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn out_of_range_congruence_defaults_to_cl3() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "a", HolonKind::System);
        seed(&tools, "b", HolonKind::System);

        link(&tools, "a", "b", 0).unwrap();
        let deps = tools.store().unwrap().dependencies_of("a").unwrap();
        assert_eq!(deps[0].congruence_level, CongruenceLevel::Cl3);
    }

    #[test]
    fn cl2_penalty_is_explained() {
        let (tools, _dir) = tools_fixture();
        seed(&tools, "a", HolonKind::System);
        seed(&tools, "b", HolonKind::System);

        let out = link(&tools, "a", "b", 2).unwrap();
        assert!(out.contains("CL2"));
        assert!(out.contains("0.9"));
    }
}
