//! Property-style checks for the reliability calculus and the derived
//! active/archived classification, exercised over many small store shapes.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use quint_core::{
    CongruenceLevel, Evidence, EvidenceType, Holon, HolonKind, HolonType, Layer, RelationType,
    Verdict,
};
use quint_server::assurance::Calculator;
use quint_server::store::Store;

fn store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("quint.db")).unwrap();
    (store, dir)
}

fn holon(store: &Store, id: &str, layer: Layer) {
    let holon_type = if layer == Layer::Drr {
        HolonType::Drr
    } else {
        HolonType::Hypothesis
    };
    store
        .create_holon(&Holon::new(
            id,
            holon_type,
            HolonKind::System,
            layer,
            format!("Holon {id}"),
            "Content",
            "default",
            "",
        ))
        .unwrap();
}

fn evidence(store: &Store, id: &str, holon_id: &str, verdict: Verdict, hours_valid: i64) {
    store
        .add_evidence(
            &Evidence::new(id, holon_id, EvidenceType::TestResult, "obs", verdict)
                .with_valid_until(Utc::now() + Duration::hours(hours_valid)),
        )
        .unwrap();
}

/// Scores stay within [0, 1] across every evidence shape.
#[test]
fn scores_are_always_bounded() {
    let (store, _dir) = store();
    let verdicts = [Verdict::Pass, Verdict::Fail, Verdict::Degrade];
    let horizons = [-48i64, 48];
    let stale_flags = [false, true];

    let mut index = 0;
    for verdict in verdicts {
        for horizon in horizons {
            for stale in stale_flags {
                let id = format!("holon-{index}");
                holon(&store, &id, Layer::L1);
                let evidence_id = format!("ev-{index}");
                evidence(&store, &evidence_id, &id, verdict, horizon);
                if stale {
                    store.mark_evidence_stale(&evidence_id, "carrier moved").unwrap();
                }
                index += 1;

                let report = Calculator::new(&store).reliability(&id).unwrap();
                assert!(
                    (0.0..=1.0).contains(&report.final_score),
                    "{id} scored {}",
                    report.final_score
                );
                assert!((0.0..=1.0).contains(&report.self_score));
            }
        }
    }
}

/// Weakest-link aggregation: a dependant never scores above its weakest
/// CL3 dependency or its own evidence.
#[test]
fn dependants_are_capped_by_their_dependencies() {
    let (store, _dir) = store();
    holon(&store, "a", Layer::L2);
    holon(&store, "b", Layer::L2);
    holon(&store, "c", Layer::L2);
    evidence(&store, "ea", "a", Verdict::Pass, 48);
    evidence(&store, "eb", "b", Verdict::Degrade, 48);
    evidence(&store, "ec", "c", Verdict::Pass, 48);
    store
        .create_relation("a", "b", RelationType::ComponentOf, CongruenceLevel::Cl3)
        .unwrap();
    store
        .create_relation("a", "c", RelationType::ComponentOf, CongruenceLevel::Cl3)
        .unwrap();

    let calc = Calculator::new(&store);
    let a = calc.reliability("a").unwrap();
    let b = calc.reliability("b").unwrap();
    let c = calc.reliability("c").unwrap();

    let ceiling = a.self_score.min(b.final_score).min(c.final_score);
    assert!(a.final_score <= ceiling + 1e-12);
    assert_eq!(a.weakest_link, "b");
}

/// Chains propagate the weakest score all the way up, with penalties
/// compounding per edge.
#[test]
fn chained_penalties_compound() {
    let (store, _dir) = store();
    for id in ["top", "mid", "bottom"] {
        holon(&store, id, Layer::L2);
        evidence(&store, &format!("ev-{id}"), id, Verdict::Pass, 48);
    }
    store
        .create_relation("top", "mid", RelationType::ComponentOf, CongruenceLevel::Cl2)
        .unwrap();
    store
        .create_relation("mid", "bottom", RelationType::ComponentOf, CongruenceLevel::Cl2)
        .unwrap();

    let report = Calculator::new(&store).reliability("top").unwrap();
    // bottom 1.0, mid = min(1.0, 1.0 * 0.9) = 0.9, top = min(1.0, 0.9 * 0.9).
    assert!((report.final_score - 0.81).abs() < 1e-9);
}

/// Grouping edges carry no reliability; only dependency edges do.
#[test]
fn non_dependency_edges_never_propagate() {
    let (store, _dir) = store();
    holon(&store, "strong", Layer::L2);
    holon(&store, "weak", Layer::L2);
    evidence(&store, "es", "strong", Verdict::Pass, 48);
    evidence(&store, "ew", "weak", Verdict::Fail, 48);

    for relation in [
        RelationType::MemberOf,
        RelationType::Selects,
        RelationType::Rejects,
        RelationType::SupersededBy,
    ] {
        store
            .create_relation("strong", "weak", relation, CongruenceLevel::Cl3)
            .unwrap();
    }

    let report = Calculator::new(&store).reliability("strong").unwrap();
    assert!((report.final_score - 1.0).abs() < f64::EPSILON);
    assert!(report.dependencies.is_empty());
}

/// Every holon lands in exactly one bucket of the derived view: active,
/// archived, or invalidated.
#[test]
fn active_view_is_a_partition() {
    let (store, _dir) = store();

    holon(&store, "live-l0", Layer::L0);
    holon(&store, "live-l2", Layer::L2);
    holon(&store, "dead", Layer::Invalid);
    holon(&store, "drr-open", Layer::Drr);
    holon(&store, "drr-done", Layer::Drr);
    holon(&store, "chosen", Layer::L2);
    holon(&store, "dismissed", Layer::L2);

    store
        .create_relation("drr-done", "chosen", RelationType::Selects, CongruenceLevel::Cl3)
        .unwrap();
    store
        .create_relation(
            "drr-done",
            "dismissed",
            RelationType::Rejects,
            CongruenceLevel::Cl3,
        )
        .unwrap();
    store
        .add_evidence(&Evidence::new(
            "impl",
            "drr-done",
            EvidenceType::Implementation,
            "shipped",
            Verdict::Pass,
        ))
        .unwrap();

    let counts = store.count_active_by_layer("default").unwrap();
    let active_hypotheses = counts.l0 + counts.l1 + counts.l2;
    let active_decisions = store.open_decisions("default").unwrap().len() as i64;
    let archived = store.count_archived("default").unwrap();
    let total = store.list_holon_ids().unwrap().len() as i64;

    assert_eq!(counts.l0, 1);
    assert_eq!(counts.l2, 1); // live-l2 only; chosen and dismissed archived
    assert_eq!(counts.invalid, 1);
    assert_eq!(active_decisions, 1); // drr-open
    assert_eq!(archived, 3); // drr-done, chosen, dismissed

    assert_eq!(
        active_hypotheses + active_decisions + archived + counts.invalid,
        total
    );
}

/// Resolution evidence is the only thing that closes a decision; other
/// evidence types leave it open.
#[test]
fn only_resolution_evidence_closes_decisions() {
    let (store, _dir) = store();
    holon(&store, "drr", Layer::Drr);

    store
        .add_evidence(&Evidence::new(
            "audit",
            "drr",
            EvidenceType::AuditReport,
            "risks reviewed",
            Verdict::Pass,
        ))
        .unwrap();
    assert_eq!(store.open_decisions("default").unwrap().len(), 1);
    assert_eq!(store.resolution_of("drr").unwrap(), None);

    store
        .add_evidence(&Evidence::new(
            "closure",
            "drr",
            EvidenceType::Abandonment,
            "gave up",
            Verdict::Pass,
        ))
        .unwrap();
    assert!(store.open_decisions("default").unwrap().is_empty());
}
