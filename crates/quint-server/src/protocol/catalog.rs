//! The tool catalogue answered by `tools/list`.

use serde::Serialize;
use serde_json::{json, Value};

/// One catalogue entry: name, human description, input schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Tool name as dispatched by `tools/call`.
    pub name: &'static str,
    /// Human description shown to the agent.
    pub description: &'static str,
    /// JSON schema of the arguments object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The full tool catalogue.
#[must_use]
pub fn tool_catalogue() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "quint_internalize",
            description: "Unified entry point for FPF sessions. Initializes the project if \
                needed, checks for stale context, loads knowledge state, surfaces decaying \
                evidence, and provides phase-appropriate guidance. Call this at the start of \
                every session.",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSpec {
            name: "quint_search",
            description: "Full-text search across the knowledge base. Search holons and \
                evidence by keywords.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search terms"},
                    "scope": {"type": "string", "description": "Scope: 'holons', 'evidence', 'all' (default: 'all')"},
                    "layer_filter": {"type": "string", "description": "Filter by layer: 'L0', 'L1', 'L2', or empty for all"},
                    "status_filter": {"type": "string", "description": "Filter decisions by status: 'open', 'implemented', 'abandoned', 'superseded'"},
                    "affected_scope_filter": {"type": "string", "description": "Filter DRRs by affected file path (matches against affected_scope patterns)"},
                    "limit": {"type": "integer", "description": "Max results (default: 10, max: 50)"}
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: "quint_resolve",
            description: "Resolve a decision (DRR) by recording its outcome: implemented, \
                abandoned, or superseded.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "decision_id": {"type": "string", "description": "ID of the decision holon to resolve"},
                    "resolution": {"type": "string", "enum": ["implemented", "abandoned", "superseded"], "description": "Resolution type"},
                    "reference": {"type": "string", "description": "Implementation reference (required for 'implemented'): commit:SHA, pr:NUM, file:PATH"},
                    "superseded_by": {"type": "string", "description": "ID of replacing decision (required for 'superseded')"},
                    "notes": {"type": "string", "description": "Explanation or description (required for 'abandoned')"},
                    "valid_until": {"type": "string", "description": "Optional: when to re-verify implementation (RFC3339 format)"},
                    "criteria_verified": {"type": "boolean", "description": "Set to true to confirm acceptance criteria are verified (required when DRR has acceptance_criteria)", "default": false}
                },
                "required": ["decision_id", "resolution"]
            }),
        },
        ToolSpec {
            name: "quint_implement",
            description: "Transform a finalized DRR into an implementation directive. Returns \
                a structured prompt that programs your internal planning capabilities with \
                invariants, constraints, and acceptance criteria from the decision and its \
                dependencies.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "decision_id": {"type": "string", "description": "ID of the DRR to implement"}
                },
                "required": ["decision_id"]
            }),
        },
        ToolSpec {
            name: "quint_link",
            description: "Add dependency between existing holons. Use after creating a \
                hypothesis to link it to existing decisions/hypotheses. Creates ComponentOf \
                (system) or ConstituentOf (episteme) relation. WLNK applies after linking.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "source_id": {"type": "string", "description": "ID of the holon that DEPENDS on target"},
                    "target_id": {"type": "string", "description": "ID of the holon being depended upon"},
                    "congruence_level": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 3,
                        "default": 3,
                        "description": "CL3=same context, CL2=similar, CL1=different"
                    }
                },
                "required": ["source_id", "target_id"]
            }),
        },
        ToolSpec {
            name: "quint_propose",
            description: "Propose a new hypothesis (L0). IMPORTANT: Consider depends_on for \
                dependencies and decision_context for grouping alternatives.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Title"},
                    "content": {"type": "string", "description": "Description"},
                    "scope": {"type": "string", "description": "Scope (G) - where this hypothesis applies"},
                    "kind": {"type": "string", "enum": ["system", "episteme"], "description": "system=code/architecture, episteme=process/methodology"},
                    "rationale": {"type": "string", "description": "JSON: {anomaly, approach, alternatives_rejected}"},
                    "decision_context": {
                        "type": "string",
                        "description": "Parent decision ID to GROUP competing alternatives. Does NOT affect R_eff. Use when multiple hypotheses solve the same problem. Example: 'caching-decision' groups 'redis-caching' and 'cdn-edge'. Creates MemberOf relation."
                    },
                    "depends_on": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "IDs of holons this hypothesis REQUIRES to work. CRITICAL: Affects R_eff via WLNK - if dependency has low R, this inherits that ceiling. Use when: (1) builds on another hypothesis, (2) needs another to function, (3) dependency failure invalidates this. Leave empty for independent hypotheses. Creates ComponentOf/ConstituentOf."
                    },
                    "dependency_cl": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 3,
                        "default": 3,
                        "description": "Congruence level for dependencies. CL3=same context (no penalty), CL2=similar (10% penalty), CL1=different (30% penalty)."
                    }
                },
                "required": ["title", "content", "scope", "kind", "rationale"]
            }),
        },
        ToolSpec {
            name: "quint_verify",
            description: "Record verification results (L0 -> L1).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hypothesis_id": {"type": "string"},
                    "checks_json": {"type": "string", "description": "JSON of checks"},
                    "verdict": {"type": "string", "enum": ["PASS", "FAIL", "REFINE"]},
                    "carrier_files": {"type": "string", "description": "Comma-separated file paths (relative to repo root) that this verification is based on. These files will be tracked for changes - if they change, the evidence becomes stale. Example: 'src/cache.rs,src/api/routes.rs'"}
                },
                "required": ["hypothesis_id", "checks_json", "verdict"]
            }),
        },
        ToolSpec {
            name: "quint_test",
            description: "Record validation results (L1 -> L2).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hypothesis_id": {"type": "string"},
                    "test_type": {"type": "string", "description": "internal or external"},
                    "result": {"type": "string", "description": "Test output/findings"},
                    "verdict": {"type": "string", "enum": ["PASS", "FAIL", "REFINE"]},
                    "carrier_files": {"type": "string", "description": "Comma-separated file paths (relative to repo root) that were tested. These files will be tracked for changes - if they change, the evidence becomes stale. For internal tests: files covered by tests. For external research: leave empty or use source URL."}
                },
                "required": ["hypothesis_id", "test_type", "result", "verdict"]
            }),
        },
        ToolSpec {
            name: "quint_audit",
            description: "Record audit/trust score (R_eff).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hypothesis_id": {"type": "string"},
                    "risks": {"type": "string", "description": "Risk analysis"}
                },
                "required": ["hypothesis_id", "risks"]
            }),
        },
        ToolSpec {
            name: "quint_decide",
            description: "Finalize decision (DRR).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "winner_id": {"type": "string"},
                    "rejected_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "IDs of rejected L2 alternatives"
                    },
                    "context": {"type": "string"},
                    "decision": {"type": "string"},
                    "rationale": {"type": "string"},
                    "consequences": {"type": "string"},
                    "characteristics": {"type": "string"},
                    "contract": {
                        "type": "string",
                        "description": "JSON object with implementation contract: {invariants: [], anti_patterns: [], acceptance_criteria: [], affected_scope: []}"
                    }
                },
                "required": ["title", "winner_id", "context", "decision", "rationale", "consequences"]
            }),
        },
        ToolSpec {
            name: "quint_audit_tree",
            description: "Visualize the assurance tree for a holon, showing R scores, \
                dependencies, and CL penalties.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "holon_id": {"type": "string", "description": "ID of the holon to audit"}
                },
                "required": ["holon_id"]
            }),
        },
        ToolSpec {
            name: "quint_calculate_r",
            description: "Calculate the effective reliability (R_eff) for a holon with \
                detailed breakdown.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "holon_id": {"type": "string", "description": "ID of the holon"}
                },
                "required": ["holon_id"]
            }),
        },
        ToolSpec {
            name: "quint_reset",
            description: "Reset FPF cycle to IDLE state. Records session end in audit log \
                without creating DRR. Use when ending a session without making a decision.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why the cycle is being reset (e.g., 'pivoting to different problem', 'session complete')"}
                },
                "required": []
            }),
        },
    ]
}
