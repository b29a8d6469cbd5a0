use chrono::{Duration, Utc};
use tempfile::TempDir;

use quint_core::{
    CongruenceLevel, Evidence, EvidenceType, Holon, HolonKind, HolonType, Layer, Phase,
    RelationType, Resolution, Verdict,
};

use super::{AuditEntry, AuditResult, Store, StoreError, Waiver, WorkRecord};

fn hypothesis(id: &str, layer: Layer) -> Holon {
    Holon::new(
        id,
        HolonType::Hypothesis,
        HolonKind::System,
        layer,
        format!("Holon {id}"),
        "Content here",
        "default",
        "global",
    )
}

fn drr(id: &str) -> Holon {
    Holon::new(
        id,
        HolonType::Drr,
        HolonKind::System,
        Layer::Drr,
        format!("Decision {id}"),
        "Decision content",
        "default",
        "global",
    )
}

fn passing_evidence(id: &str, holon_id: &str) -> Evidence {
    Evidence::new(
        id,
        holon_id,
        EvidenceType::TestResult,
        "All tests pass",
        Verdict::Pass,
    )
    .with_assurance_level("L1")
    .with_carrier("internal-logic")
}

#[test]
fn holon_crud() {
    let store = Store::open_in_memory().unwrap();

    store.create_holon(&hypothesis("h1", Layer::L0)).unwrap();

    let holon = store.get_holon("h1").unwrap();
    assert_eq!(holon.id, "h1");
    assert_eq!(holon.kind, HolonKind::System);
    assert_eq!(holon.layer, Layer::L0);

    store.update_holon_layer("h1", Layer::L1).unwrap();
    assert_eq!(store.get_holon("h1").unwrap().layer, Layer::L1);

    assert_eq!(store.get_holon_title("h1").unwrap(), "Holon h1");
    assert_eq!(store.list_holon_ids().unwrap(), vec!["h1".to_string()]);

    assert!(matches!(
        store.get_holon("ghost"),
        Err(StoreError::HolonNotFound { .. })
    ));
}

#[test]
fn evidence_crud() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L0)).unwrap();

    store.add_evidence(&passing_evidence("e1", "h1")).unwrap();

    let evidence = store.evidence_for("h1").unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].verdict, Verdict::Pass);
    assert_eq!(evidence[0].assurance_level.as_deref(), Some("L1"));

    let with_carrier = store.evidence_with_carrier().unwrap();
    assert_eq!(with_carrier.len(), 1);
}

#[test]
fn relations_crud_and_cycle_rejection() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("parent", Layer::L1)).unwrap();
    store.create_holon(&hypothesis("child", Layer::L0)).unwrap();

    store
        .create_relation(
            "child",
            "parent",
            RelationType::ComponentOf,
            CongruenceLevel::Cl3,
        )
        .unwrap();

    let components = store.components_of("parent").unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].source_id, "child");

    let deps = store.dependencies_of("child").unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target_id, "parent");

    // Duplicate triple.
    assert!(matches!(
        store.create_relation(
            "child",
            "parent",
            RelationType::ComponentOf,
            CongruenceLevel::Cl3,
        ),
        Err(StoreError::DuplicateRelation { .. })
    ));

    // Reverse edge closes a loop.
    assert!(matches!(
        store.create_relation(
            "parent",
            "child",
            RelationType::ComponentOf,
            CongruenceLevel::Cl3,
        ),
        Err(StoreError::DependencyCycle { .. })
    ));

    // memberOf is exempt from the acyclicity check.
    store
        .create_relation(
            "parent",
            "child",
            RelationType::MemberOf,
            CongruenceLevel::Cl3,
        )
        .unwrap();
}

#[test]
fn relation_endpoints_must_exist() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L0)).unwrap();

    assert!(matches!(
        store.create_relation("h1", "ghost", RelationType::ComponentOf, CongruenceLevel::Cl3),
        Err(StoreError::HolonNotFound { .. })
    ));
}

#[test]
fn work_records_append() {
    let store = Store::open_in_memory().unwrap();
    let started = Utc::now();
    store
        .record_work(&WorkRecord {
            id: "w1".into(),
            method_ref: "quint_test".into(),
            performer_ref: "agent".into(),
            started_at: started,
            ended_at: Some(started + Duration::seconds(1)),
            resource_ledger: Some(r#"{"duration_ms": 1000}"#.into()),
        })
        .unwrap();
}

#[test]
fn parent_chain_and_lineage() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("l0-hypo", Layer::L0)).unwrap();
    store
        .create_holon(&hypothesis("l1-hypo", Layer::L1).with_parent("l0-hypo"))
        .unwrap();
    store
        .create_holon(&hypothesis("l2-hypo", Layer::L2).with_parent("l1-hypo"))
        .unwrap();

    let children = store.holons_by_parent("l0-hypo").unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "l1-hypo");

    let lineage = store.holon_lineage("l2-hypo").unwrap();
    let ids: Vec<_> = lineage.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["l0-hypo", "l1-hypo", "l2-hypo"]);
}

#[test]
fn audit_log_queries() {
    let store = Store::open_in_memory().unwrap();
    let entry = |id: &str, tool: &str, hash: &str| AuditEntry {
        id: id.into(),
        tool_name: tool.into(),
        operation: "op".into(),
        actor: "agent".into(),
        target_id: Some("hypo-1".into()),
        input_hash: Some(hash.into()),
        result: AuditResult::Success,
        details: None,
        context_id: "default".into(),
        created_at: Utc::now(),
    };

    store.insert_audit(&entry("log-1", "quint_propose", "abc123")).unwrap();
    store.insert_audit(&entry("log-2", "quint_verify", "def456")).unwrap();

    assert_eq!(store.audit_by_context("default").unwrap().len(), 2);
    assert_eq!(store.audit_by_target("hypo-1").unwrap().len(), 2);
    assert_eq!(store.recent_audit(1).unwrap().len(), 1);
}

#[test]
fn stale_mark_and_clear() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L1)).unwrap();
    store.add_evidence(&passing_evidence("e1", "h1")).unwrap();
    store.add_evidence(&passing_evidence("e2", "h1")).unwrap();

    store.mark_evidence_stale("e1", "carrier file changed").unwrap();
    store.mark_evidence_stale("e2", "carrier file changed").unwrap();
    assert_eq!(store.stale_evidence_for("h1").unwrap().len(), 2);
    assert_eq!(store.all_stale_evidence().unwrap().len(), 2);

    store.clear_evidence_stale("e1").unwrap();
    assert_eq!(store.stale_evidence_for("h1").unwrap().len(), 1);

    store.clear_stale_for_holon("h1").unwrap();
    assert_eq!(store.stale_evidence_for("h1").unwrap().len(), 0);
}

#[test]
fn reverification_flag_round_trip() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L2)).unwrap();

    store
        .mark_needs_reverification("h1", "dependency stale")
        .unwrap();
    let holon = store.get_holon("h1").unwrap();
    assert!(holon.needs_reverification);
    assert_eq!(holon.reverification_reason.as_deref(), Some("dependency stale"));

    store.clear_needs_reverification("h1").unwrap();
    assert!(!store.get_holon("h1").unwrap().needs_reverification);
}

#[test]
fn commit_tracking() {
    let store = Store::open_in_memory().unwrap();

    store.set_phase("test-ctx", Phase::Idle).unwrap();
    store.set_last_commit("test-ctx", "abc123def456").unwrap();

    let (commit, at) = store.get_last_commit("test-ctx").unwrap().unwrap();
    assert_eq!(commit, "abc123def456");
    assert!(at <= Utc::now());
}

#[test]
fn phase_round_trip_defaults_to_idle() {
    let store = Store::open_in_memory().unwrap();
    assert_eq!(store.get_phase("default").unwrap(), Phase::Idle);

    store.set_phase("default", Phase::Abduction).unwrap();
    assert_eq!(store.get_phase("default").unwrap(), Phase::Abduction);

    let state = store.fpf_state("default").unwrap().unwrap();
    assert!((state.assurance_threshold - 0.8).abs() < f64::EPSILON);
}

#[test]
fn waiver_lookup_respects_expiry() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L2)).unwrap();
    store.add_evidence(&passing_evidence("e1", "h1")).unwrap();

    let now = Utc::now();
    store
        .insert_waiver(&Waiver {
            id: "w1".into(),
            evidence_id: "e1".into(),
            waived_until: now + Duration::days(30),
            rationale: "accepted risk".into(),
            actor: "agent".into(),
            created_at: now,
        })
        .unwrap();

    assert!(store.active_waiver_for("e1", now).unwrap().is_some());
    assert!(store
        .active_waiver_for("e1", now + Duration::days(31))
        .unwrap()
        .is_none());
    assert!(store.active_waiver_for("other", now).unwrap().is_none());
}

#[test]
fn decayed_evidence_excludes_waived_and_stale() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L2)).unwrap();
    let now = Utc::now();

    let expired = |id: &str| {
        passing_evidence(id, "h1").with_valid_until(now - Duration::days(1))
    };
    store.add_evidence(&expired("e-plain")).unwrap();
    store.add_evidence(&expired("e-waived")).unwrap();
    store.add_evidence(&expired("e-stale")).unwrap();

    store
        .insert_waiver(&Waiver {
            id: "w1".into(),
            evidence_id: "e-waived".into(),
            waived_until: now + Duration::days(30),
            rationale: "accepted".into(),
            actor: "agent".into(),
            created_at: now,
        })
        .unwrap();
    store.mark_evidence_stale("e-stale", "file changed").unwrap();

    let decayed = store.decayed_evidence(now).unwrap();
    let ids: Vec<_> = decayed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e-plain"]);
}

#[test]
fn active_view_partitions_holons() {
    let store = Store::open_in_memory().unwrap();

    store.create_holon(&drr("DRR-archive-test")).unwrap();
    store.create_holon(&hypothesis("archived-hypo", Layer::L2)).unwrap();
    store.create_holon(&hypothesis("active-hypo", Layer::L0)).unwrap();
    store
        .create_relation(
            "DRR-archive-test",
            "archived-hypo",
            RelationType::Selects,
            CongruenceLevel::Cl3,
        )
        .unwrap();

    // Decision still open: the selected holon stays active.
    let counts = store.count_active_by_layer("default").unwrap();
    assert_eq!(counts.l2, 1);
    assert_eq!(counts.l0, 1);
    assert_eq!(store.count_archived("default").unwrap(), 0);

    // Resolving the decision archives both the decision and its target.
    store
        .add_evidence(&Evidence::new(
            "resolve-evidence",
            "DRR-archive-test",
            EvidenceType::Implementation,
            "Implemented via commit:abc123",
            Verdict::Pass,
        ))
        .unwrap();

    let counts = store.count_active_by_layer("default").unwrap();
    assert_eq!(counts.l2, 0);
    assert_eq!(counts.l0, 1);
    assert_eq!(store.count_archived("default").unwrap(), 2);
}

#[test]
fn open_and_resolved_decision_queries() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&drr("DRR-open")).unwrap();
    store.create_holon(&drr("DRR-done")).unwrap();
    store
        .add_evidence(&Evidence::new(
            "impl-1",
            "DRR-done",
            EvidenceType::Implementation,
            "Done",
            Verdict::Pass,
        ))
        .unwrap();

    let open = store.open_decisions("default").unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "DRR-open");

    let resolved = store
        .resolved_decisions("default", Some(Resolution::Implemented), 10)
        .unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].0.id, "DRR-done");
    assert_eq!(resolved[0].1, Resolution::Implemented);

    assert_eq!(store.resolution_of("DRR-open").unwrap(), None);
    assert_eq!(
        store.resolution_of("DRR-done").unwrap(),
        Some(Resolution::Implemented)
    );
}

#[test]
fn decision_id_resolution_accepts_both_forms() {
    let store = Store::open_in_memory().unwrap();

    // Dated id stored, bare slug handed in.
    store.create_holon(&drr("DRR-2026-08-02-redis-cache")).unwrap();
    assert_eq!(
        store.resolve_decision_id("redis-cache").unwrap().id,
        "DRR-2026-08-02-redis-cache"
    );
    assert_eq!(
        store
            .resolve_decision_id("DRR-2026-08-02-redis-cache")
            .unwrap()
            .id,
        "DRR-2026-08-02-redis-cache"
    );

    // Bare slug stored, dated filename handed in.
    store.create_holon(&drr("edge-caching")).unwrap();
    assert_eq!(
        store
            .resolve_decision_id("DRR-2025-12-24-edge-caching")
            .unwrap()
            .id,
        "edge-caching"
    );

    assert!(matches!(
        store.resolve_decision_id("DRR-2026-01-01-missing"),
        Err(StoreError::HolonNotFound { .. })
    ));
}

#[test]
fn search_is_tolerant_of_special_characters() {
    let store = Store::open_in_memory().unwrap();
    let mut holon = hypothesis("special-char-holon", Layer::L0);
    holon.title = "Redis-backed Cache Strategy".into();
    holon.content = "Use redis-cluster for caching".into();
    store.create_holon(&holon).unwrap();

    let hits = store.search_holons("redis-backed", None, 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "special-char-holon");

    // Operators and quotes must not produce an FTS parse error.
    assert!(store.search_holons("\"redis AND (cache\"", None, 10).is_ok());
    assert!(store.search_holons("- - -", None, 10).unwrap().is_empty());
}

#[test]
fn search_layer_filter() {
    let store = Store::open_in_memory().unwrap();
    let mut l0 = hypothesis("l0-holon", Layer::L0);
    l0.title = "L0 Test Holon".into();
    store.create_holon(&l0).unwrap();
    let mut l2 = hypothesis("l2-holon", Layer::L2);
    l2.title = "L2 Test Holon".into();
    store.create_holon(&l2).unwrap();

    let hits = store
        .search_holons("Test Holon", Some(Layer::L2), 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "l2-holon");
}

#[test]
fn evidence_search_matches_bodies() {
    let store = Store::open_in_memory().unwrap();
    store.create_holon(&hypothesis("h1", Layer::L1)).unwrap();
    store
        .add_evidence(&Evidence::new(
            "e1",
            "h1",
            EvidenceType::LogicCheck,
            "latency checked against budget",
            Verdict::Pass,
        ))
        .unwrap();

    let hits = store.search_evidence("latency budget", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].holon_id, "h1");
}

#[test]
fn reopening_a_database_file_preserves_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quint.db");

    {
        let store = Store::open(&path).unwrap();
        store.create_holon(&hypothesis("h1", Layer::L0)).unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert!(store.holon_exists("h1").unwrap());
    assert!(path.exists());
}
