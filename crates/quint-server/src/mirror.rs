//! Markdown mirror of the knowledge store.
//!
//! The database is authoritative; the mirror under `.quint/` exists for
//! human inspection. Holons live in `knowledge/<layer>/<id>.md`, decisions
//! in `decisions/<id>.md`, evidence notes in `evidence/`. Every write
//! regenerates the whole file from the database row, so a file that
//! diverged (for example after a crash between the two writes) heals on the
//! next operation that touches its holon.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use quint_core::{Evidence, Holon, Layer};

/// Name of the engine's state directory under the project root.
pub const QUINT_DIR: &str = ".quint";

/// Name of the database file inside the state directory.
pub const DB_FILE: &str = "quint.db";

/// The engine's state directory for a project root.
#[must_use]
pub fn quint_dir(root: &Path) -> PathBuf {
    root.join(QUINT_DIR)
}

/// The database path for a project root.
#[must_use]
pub fn db_path(root: &Path) -> PathBuf {
    quint_dir(root).join(DB_FILE)
}

/// The knowledge directory for one layer.
#[must_use]
pub fn layer_dir(root: &Path, layer: Layer) -> PathBuf {
    quint_dir(root).join("knowledge").join(layer.as_str())
}

/// The mirror path of a holon at a layer.
#[must_use]
pub fn holon_path(root: &Path, layer: Layer, id: &str) -> PathBuf {
    layer_dir(root, layer).join(format!("{id}.md"))
}

/// The mirror path of a decision record.
#[must_use]
pub fn decision_path(root: &Path, id: &str) -> PathBuf {
    quint_dir(root).join("decisions").join(format!("{id}.md"))
}

/// Creates the `.quint` directory layout, dropping a `.gitkeep` into each
/// leaf directory so empty directories survive version control.
///
/// # Errors
///
/// Returns an error when a directory or marker file cannot be created.
pub fn ensure_layout(root: &Path) -> io::Result<()> {
    let base = quint_dir(root);
    for sub in [
        "knowledge/L0",
        "knowledge/L1",
        "knowledge/L2",
        "knowledge/invalid",
        "decisions",
        "sessions",
        "evidence",
    ] {
        let dir = base.join(sub);
        fs::create_dir_all(&dir)?;
        let gitkeep = dir.join(".gitkeep");
        if !gitkeep.exists() {
            fs::write(&gitkeep, "")?;
        }
    }
    Ok(())
}

fn content_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Writes (or rewrites) a holon's mirror file at its current layer.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_holon(root: &Path, holon: &Holon, rationale: Option<&str>) -> io::Result<PathBuf> {
    let mut body = format!(
        "# Hypothesis: {}\n\n{}\n",
        holon.title,
        holon.content.trim_end()
    );
    if let Some(rationale) = rationale.filter(|r| !r.trim().is_empty()) {
        body.push_str(&format!("\n## Rationale\n\n{}\n", rationale.trim_end()));
    }

    let document = format!(
        "---\ntitle: {}\nlayer: {}\nkind: {}\nscope: {}\ncreated: {}\ncontent_hash: {}\n---\n\n{}",
        holon.title,
        holon.layer,
        holon.kind,
        holon.scope,
        holon.created_at.to_rfc3339(),
        content_hash(&body),
        body
    );

    let path = holon_path(root, holon.layer, &holon.id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, document)?;
    Ok(path)
}

/// Moves a holon's mirror file after a layer change, rewriting it at the
/// new location from the database row.
///
/// # Errors
///
/// Returns an error when the new file cannot be written or the old one
/// cannot be removed.
pub fn move_holon(root: &Path, holon: &Holon, from: Layer) -> io::Result<PathBuf> {
    let path = write_holon(root, holon, None)?;
    if from != holon.layer {
        let old = holon_path(root, from, &holon.id);
        if old.exists() {
            fs::remove_file(old)?;
        }
    }
    Ok(path)
}

/// Sections of a decision record's mirror document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionSections<'a> {
    /// The problem context the decision was taken in.
    pub context: &'a str,
    /// The decision itself.
    pub decision: &'a str,
    /// Why this alternative won.
    pub rationale: &'a str,
    /// What follows from the decision.
    pub consequences: &'a str,
    /// Free-form characteristics note.
    pub characteristics: &'a str,
    /// Resolution line, present once the decision is closed.
    pub status: Option<&'a str>,
}

/// Writes (or rewrites) a decision record's mirror file.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_decision(
    root: &Path,
    drr: &Holon,
    sections: &DecisionSections<'_>,
) -> io::Result<PathBuf> {
    let mut body = format!("# Decision: {}\n", drr.title);
    if let Some(status) = sections.status {
        body.push_str(&format!("\nStatus: {status}\n"));
    }
    let named_sections = [
        ("Context", sections.context),
        ("Decision", sections.decision),
        ("Rationale", sections.rationale),
        ("Consequences", sections.consequences),
        ("Characteristics", sections.characteristics),
    ];
    if named_sections.iter().all(|(_, text)| text.trim().is_empty()) {
        // Rewrites that only carry a status keep the body from the
        // authoritative database row.
        if !drr.content.trim().is_empty() {
            body.push_str(&format!("\n{}\n", drr.content.trim_end()));
        }
    } else {
        for (heading, text) in named_sections {
            if !text.trim().is_empty() {
                body.push_str(&format!("\n## {heading}\n\n{}\n", text.trim_end()));
            }
        }
    }

    let contract_line = drr
        .contract
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("contract: {c}\n"))
        .unwrap_or_default();
    let document = format!(
        "---\ntitle: {}\nlayer: {}\n{}created: {}\ncontent_hash: {}\n---\n\n{}",
        drr.title,
        drr.layer,
        contract_line,
        drr.created_at.to_rfc3339(),
        content_hash(&body),
        body
    );

    let path = decision_path(root, &drr.id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, document)?;
    Ok(path)
}

/// Writes an evidence note into the mirror.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_evidence(root: &Path, evidence: &Evidence) -> io::Result<PathBuf> {
    let valid_until = evidence
        .valid_until
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unbounded".to_string());
    let document = format!(
        "---\nholon: {}\ntype: {}\nverdict: {}\nvalid_until: {}\ncarrier: {}\ncreated: {}\n---\n\n{}\n",
        evidence.holon_id,
        evidence.evidence_type,
        evidence.verdict,
        valid_until,
        evidence.carrier_ref.as_deref().unwrap_or(""),
        evidence.created_at.to_rfc3339(),
        evidence.content.trim_end()
    );

    let path = quint_dir(root)
        .join("evidence")
        .join(format!("{}.md", evidence.id));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, document)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use quint_core::{Evidence, EvidenceType, Holon, HolonKind, HolonType, Layer, Verdict};
    use tempfile::TempDir;

    use super::*;

    fn sample_holon(layer: Layer) -> Holon {
        Holon::new(
            "my-first-hypothesis",
            HolonType::Hypothesis,
            HolonKind::System,
            layer,
            "My First Hypothesis",
            "This is the content.",
            "default",
            "global",
        )
    }

    #[test]
    fn layout_creates_all_directories() {
        let dir = TempDir::new().unwrap();
        ensure_layout(dir.path()).unwrap();

        for sub in [
            "evidence",
            "decisions",
            "sessions",
            "knowledge/L0",
            "knowledge/L1",
            "knowledge/L2",
            "knowledge/invalid",
        ] {
            let path = quint_dir(dir.path()).join(sub);
            assert!(path.is_dir(), "missing {sub}");
            assert!(path.join(".gitkeep").exists(), "missing .gitkeep in {sub}");
        }
    }

    #[test]
    fn holon_file_carries_frontmatter_and_sections() {
        let dir = TempDir::new().unwrap();
        ensure_layout(dir.path()).unwrap();

        let path = write_holon(dir.path(), &sample_holon(Layer::L0), Some("Because.")).unwrap();
        assert_eq!(
            path,
            holon_path(dir.path(), Layer::L0, "my-first-hypothesis")
        );

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("scope: global"));
        assert!(text.contains("kind: system"));
        assert!(text.contains("content_hash:"));
        assert!(text.contains("# Hypothesis: My First Hypothesis"));
        assert!(text.contains("This is the content."));
        assert!(text.contains("## Rationale"));
    }

    #[test]
    fn layer_moves_relocate_the_file() {
        let dir = TempDir::new().unwrap();
        ensure_layout(dir.path()).unwrap();

        let mut holon = sample_holon(Layer::L0);
        write_holon(dir.path(), &holon, None).unwrap();

        holon.layer = Layer::L1;
        move_holon(dir.path(), &holon, Layer::L0).unwrap();

        assert!(!holon_path(dir.path(), Layer::L0, &holon.id).exists());
        assert!(holon_path(dir.path(), Layer::L1, &holon.id).exists());
    }

    #[test]
    fn decision_file_embeds_contract_in_frontmatter() {
        let dir = TempDir::new().unwrap();
        ensure_layout(dir.path()).unwrap();

        let drr = Holon::new(
            "DRR-2026-08-02-pick-redis",
            HolonType::Drr,
            HolonKind::System,
            Layer::Drr,
            "Pick Redis",
            "",
            "default",
            "",
        )
        .with_contract(r#"{"invariants":["cache transparent"]}"#);

        let sections = DecisionSections {
            context: "Caching needed",
            decision: "Use Redis",
            rationale: "Fastest option",
            consequences: "New dependency",
            ..DecisionSections::default()
        };
        let path = write_decision(dir.path(), &drr, &sections).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("contract: {\"invariants\":[\"cache transparent\"]}"));
        assert!(text.contains("# Decision: Pick Redis"));
        assert!(text.contains("## Consequences"));
    }

    #[test]
    fn evidence_note_is_written() {
        let dir = TempDir::new().unwrap();
        ensure_layout(dir.path()).unwrap();

        let evidence = Evidence::new(
            "ev-1",
            "my-first-hypothesis",
            EvidenceType::TestResult,
            "All green.",
            Verdict::Pass,
        )
        .with_carrier("src/cache.rs");
        let path = write_evidence(dir.path(), &evidence).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("holon: my-first-hypothesis"));
        assert!(text.contains("verdict: pass"));
        assert!(text.contains("carrier: src/cache.rs"));
    }
}
