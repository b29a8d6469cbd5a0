//! Durable store for holons, evidence, relations, and the audit ledger.
//!
//! The store wraps a single `SQLite` connection in WAL mode. The engine is
//! single-threaded and single-writer, so no lock wraps the connection; tool
//! bodies run inside one transaction obtained from [`Store::begin`] so that
//! evidence appends, layer changes and the audit entry commit atomically.
//!
//! # Schema
//!
//! The bootstrap schema creates the current full shape; the migration ladder
//! in [`migrations`] upgrades databases created by older releases and is a
//! tolerated no-op on fresh ones. Schema versions live in `schema_version`.
//!
//! Full-text search is backed by two external-content FTS5 tables
//! (`holons_fts`, `evidence_fts`) kept in sync by triggers.

mod migrations;
#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use thiserror::Error;
use tracing::debug;

use quint_core::{
    Characteristic, CongruenceLevel, Evidence, EvidenceType, Holon, HolonKind, HolonType, Layer,
    Phase, Relation, RelationType, Resolution, Scale, Verdict,
};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced holon does not exist.
    #[error("holon not found: {id}")]
    HolonNotFound {
        /// The missing identifier.
        id: String,
    },

    /// A referenced evidence record does not exist.
    #[error("evidence not found: {id}")]
    EvidenceNotFound {
        /// The missing identifier.
        id: String,
    },

    /// The `(source, target, type)` triple already exists.
    #[error("relation {source_id} -[{relation}]-> {target} already exists")]
    DuplicateRelation {
        /// Edge source.
        source_id: String,
        /// Edge target.
        target: String,
        /// Edge type.
        relation: String,
    },

    /// Inserting the edge would close a loop in the dependency subgraph.
    #[error("linking {source_id} -> {target} would create a dependency cycle")]
    DependencyCycle {
        /// Edge source.
        source_id: String,
        /// Edge target.
        target: String,
    },

    /// A migration step failed for a reason other than a duplicate column.
    #[error("migration {version} ({description}) failed: {source}")]
    MigrationFailed {
        /// Migration number.
        version: i64,
        /// Migration description.
        description: String,
        /// Underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Filesystem error while creating the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Counts of active holons per epistemic layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerCounts {
    /// Active L0 holons.
    pub l0: i64,
    /// Active L1 holons.
    pub l1: i64,
    /// Active L2 holons.
    pub l2: i64,
    /// Invalidated holons.
    pub invalid: i64,
}

/// Persisted workflow state for one context.
#[derive(Debug, Clone)]
pub struct FpfState {
    /// Context identifier.
    pub context_id: String,
    /// Active phase.
    pub phase: Phase,
    /// Session identifier assigned at initialization.
    pub session_id: Option<String>,
    /// Last observed version-control commit.
    pub last_commit: Option<String>,
    /// When the last commit was observed.
    pub last_commit_at: Option<DateTime<Utc>>,
    /// Minimum acceptable reliability for decisions.
    pub assurance_threshold: f64,
}

/// One appended audit ledger entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Entry identifier.
    pub id: String,
    /// Tool that was invoked.
    pub tool_name: String,
    /// Operation label of the invocation.
    pub operation: String,
    /// Who invoked the tool.
    pub actor: String,
    /// Primary target holon, if any.
    pub target_id: Option<String>,
    /// Hash of the request arguments.
    pub input_hash: Option<String>,
    /// Outcome of the invocation.
    pub result: AuditResult,
    /// Free-form detail blob.
    pub details: Option<String>,
    /// Context the invocation belonged to.
    pub context_id: String,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// Outcome recorded in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResult {
    /// The tool body completed.
    Success,
    /// A precondition rejected the call before the body ran.
    Blocked,
    /// The tool body failed.
    Error,
}

impl AuditResult {
    /// Canonical storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Blocked => "BLOCKED",
            Self::Error => "ERROR",
        }
    }
}

/// A recorded unit of performed work.
#[derive(Debug, Clone)]
pub struct WorkRecord {
    /// Record identifier.
    pub id: String,
    /// What was performed.
    pub method_ref: String,
    /// Who performed it.
    pub performer_ref: String,
    /// Start of the work.
    pub started_at: DateTime<Utc>,
    /// End of the work, if finished.
    pub ended_at: Option<DateTime<Utc>>,
    /// Resource ledger blob, JSON.
    pub resource_ledger: Option<String>,
}

/// An accepted override that lets stale or expired evidence count.
#[derive(Debug, Clone)]
pub struct Waiver {
    /// Waiver identifier.
    pub id: String,
    /// The waived evidence.
    pub evidence_id: String,
    /// The waiver expires at this instant.
    pub waived_until: DateTime<Utc>,
    /// Mandatory justification.
    pub rationale: String,
    /// Who accepted the risk.
    pub actor: String,
    /// When the waiver was recorded.
    pub created_at: DateTime<Utc>,
}

/// A full-text match against the holon corpus.
#[derive(Debug, Clone)]
pub struct HolonHit {
    /// Matched holon id.
    pub id: String,
    /// Matched holon title.
    pub title: String,
    /// Current layer.
    pub layer: Layer,
    /// Structural type.
    pub holon_type: HolonType,
    /// Cached reliability score.
    pub cached_r_score: f64,
    /// Leading slice of the body.
    pub snippet: String,
}

/// A full-text match against the evidence corpus.
#[derive(Debug, Clone)]
pub struct EvidenceHit {
    /// Matched evidence id.
    pub id: String,
    /// The holon the evidence belongs to.
    pub holon_id: String,
    /// Evidence type label.
    pub evidence_type: String,
    /// Recorded verdict.
    pub verdict: String,
    /// Leading slice of the body.
    pub snippet: String,
}

/// Predicate selecting active holons.
///
/// A holon is active when it is not invalidated, is not itself a resolved
/// decision record, and is not the selected or rejected target of a resolved
/// decision record. Everything else is archived.
const ACTIVE_HOLON_PREDICATE: &str = "
    h.layer != 'invalid'
    AND NOT (
        (h.type = 'DRR' OR h.layer = 'DRR')
        AND EXISTS (
            SELECT 1 FROM evidence e
            WHERE e.holon_id = h.id
              AND e.type IN ('implementation', 'abandonment', 'supersession')
        )
    )
    AND NOT EXISTS (
        SELECT 1 FROM relations r
        JOIN evidence de ON de.holon_id = r.source_id
        WHERE r.target_id = h.id
          AND r.relation_type IN ('selects', 'rejects')
          AND de.type IN ('implementation', 'abandonment', 'supersession')
    )
";

const HOLON_COLUMNS: &str = "h.id, h.type, h.kind, h.layer, h.title, h.content, h.context_id, \
     h.scope, h.parent_id, h.cached_r_score, h.needs_reverification, h.reverification_reason, \
     h.reverification_at, h.contract, h.created_at, h.updated_at";

const EVIDENCE_COLUMNS: &str = "id, holon_id, type, content, verdict, assurance_level, \
     carrier_ref, carrier_hash, carrier_commit, valid_until, is_stale, stale_reason, \
     stale_marked_at, created_at";

const BOOTSTRAP_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS holons (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        kind TEXT,
        layer TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        context_id TEXT NOT NULL,
        scope TEXT,
        parent_id TEXT REFERENCES holons(id),
        cached_r_score REAL DEFAULT 0.0 CHECK(cached_r_score BETWEEN 0.0 AND 1.0),
        needs_reverification INTEGER DEFAULT 0,
        reverification_reason TEXT,
        reverification_at TEXT,
        contract TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_holons_context ON holons(context_id);
    CREATE INDEX IF NOT EXISTS idx_holons_parent ON holons(parent_id);

    CREATE TABLE IF NOT EXISTS evidence (
        id TEXT PRIMARY KEY,
        holon_id TEXT NOT NULL,
        type TEXT NOT NULL,
        content TEXT NOT NULL,
        verdict TEXT NOT NULL,
        assurance_level TEXT,
        carrier_ref TEXT,
        carrier_hash TEXT,
        carrier_commit TEXT,
        valid_until TEXT,
        is_stale INTEGER DEFAULT 0,
        stale_reason TEXT,
        stale_marked_at TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_evidence_holon ON evidence(holon_id);

    CREATE TABLE IF NOT EXISTS relations (
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        relation_type TEXT NOT NULL,
        congruence_level INTEGER DEFAULT 3 CHECK(congruence_level BETWEEN 1 AND 3),
        created_at TEXT NOT NULL,
        PRIMARY KEY (source_id, target_id, relation_type)
    );
    CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_id);
    CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_id);

    CREATE TABLE IF NOT EXISTS work_records (
        id TEXT PRIMARY KEY,
        method_ref TEXT NOT NULL,
        performer_ref TEXT NOT NULL,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        resource_ledger TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        tool_name TEXT NOT NULL,
        operation TEXT NOT NULL,
        actor TEXT NOT NULL,
        target_id TEXT,
        input_hash TEXT,
        result TEXT NOT NULL,
        details TEXT,
        context_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audit_context ON audit_log(context_id);
    CREATE INDEX IF NOT EXISTS idx_audit_target ON audit_log(target_id);

    CREATE TABLE IF NOT EXISTS fpf_state (
        context_id TEXT PRIMARY KEY,
        active_role TEXT,
        active_session_id TEXT,
        active_role_context TEXT,
        last_commit TEXT,
        last_commit_at TEXT,
        assurance_threshold REAL DEFAULT 0.8
            CHECK(assurance_threshold BETWEEN 0.0 AND 1.0),
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS waivers (
        id TEXT PRIMARY KEY,
        evidence_id TEXT NOT NULL,
        waived_until TEXT NOT NULL,
        rationale TEXT NOT NULL,
        actor TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_waivers_evidence ON waivers(evidence_id);

    CREATE TABLE IF NOT EXISTS characteristics (
        holon_id TEXT NOT NULL,
        name TEXT NOT NULL,
        scale TEXT NOT NULL,
        value TEXT NOT NULL,
        unit TEXT,
        created_at TEXT NOT NULL,
        PRIMARY KEY (holon_id, name)
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS holons_fts USING fts5(
        id, title, content, content='holons', content_rowid='rowid'
    );
    CREATE VIRTUAL TABLE IF NOT EXISTS evidence_fts USING fts5(
        id, content, content='evidence', content_rowid='rowid'
    );

    DROP TRIGGER IF EXISTS holons_ai;
    CREATE TRIGGER holons_ai AFTER INSERT ON holons BEGIN
        INSERT INTO holons_fts(rowid, id, title, content)
        VALUES (new.rowid, new.id, new.title, new.content);
    END;
    DROP TRIGGER IF EXISTS holons_ad;
    CREATE TRIGGER holons_ad AFTER DELETE ON holons BEGIN
        INSERT INTO holons_fts(holons_fts, rowid, id, title, content)
        VALUES('delete', old.rowid, old.id, old.title, old.content);
    END;
    DROP TRIGGER IF EXISTS holons_au;
    CREATE TRIGGER holons_au AFTER UPDATE ON holons BEGIN
        INSERT INTO holons_fts(holons_fts, rowid, id, title, content)
        VALUES('delete', old.rowid, old.id, old.title, old.content);
        INSERT INTO holons_fts(rowid, id, title, content)
        VALUES (new.rowid, new.id, new.title, new.content);
    END;

    DROP TRIGGER IF EXISTS evidence_ai;
    CREATE TRIGGER evidence_ai AFTER INSERT ON evidence BEGIN
        INSERT INTO evidence_fts(rowid, id, content)
        VALUES (new.rowid, new.id, new.content);
    END;
    DROP TRIGGER IF EXISTS evidence_ad;
    CREATE TRIGGER evidence_ad AFTER DELETE ON evidence BEGIN
        INSERT INTO evidence_fts(evidence_fts, rowid, id, content)
        VALUES('delete', old.rowid, old.id, old.content);
    END;
    DROP TRIGGER IF EXISTS evidence_au;
    CREATE TRIGGER evidence_au AFTER UPDATE ON evidence BEGIN
        INSERT INTO evidence_fts(evidence_fts, rowid, id, content)
        VALUES('delete', old.rowid, old.id, old.content);
        INSERT INTO evidence_fts(rowid, id, content)
        VALUES (new.rowid, new.id, new.content);
    END;
";

/// Durable store backed by a single `SQLite` connection.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) the database at `path`, bootstrapping the
    /// schema and applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened or a migration
    /// fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::bootstrap(conn)
    }

    /// Opens a throwaway in-memory store. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error when schema bootstrap fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(BOOTSTRAP_SCHEMA)?;
        migrations::run(&conn)?;
        Ok(Self { conn })
    }

    /// Starts a transaction spanning subsequent store calls on this
    /// connection. Dropping the transaction without committing rolls back.
    ///
    /// # Errors
    ///
    /// Returns an error when `SQLite` cannot begin a transaction.
    pub fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.unchecked_transaction()?)
    }

    // ------------------------------------------------------------------
    // Holons
    // ------------------------------------------------------------------

    /// Inserts a new holon.
    ///
    /// # Errors
    ///
    /// Returns an error on constraint violation or storage failure.
    pub fn create_holon(&self, holon: &Holon) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO holons (id, type, kind, layer, title, content, context_id, scope, \
             parent_id, cached_r_score, needs_reverification, reverification_reason, \
             reverification_at, contract, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                holon.id,
                holon.holon_type.as_str(),
                holon.kind.as_str(),
                holon.layer.as_str(),
                holon.title,
                holon.content,
                holon.context_id,
                holon.scope,
                holon.parent_id,
                holon.cached_r_score,
                i64::from(holon.needs_reverification),
                holon.reverification_reason,
                holon.reverification_at,
                holon.contract,
                holon.created_at,
                holon.updated_at,
            ],
        )?;
        debug!(id = %holon.id, layer = %holon.layer, "holon created");
        Ok(())
    }

    /// Fetches a holon by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when no row matches.
    pub fn get_holon(&self, id: &str) -> Result<Holon, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {HOLON_COLUMNS} FROM holons h WHERE h.id = ?1"),
                [id],
                holon_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::HolonNotFound { id: id.to_string() })
    }

    /// Whether a holon with this id exists.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn holon_exists(&self, id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM holons WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Fetches a holon's title.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when no row matches.
    pub fn get_holon_title(&self, id: &str) -> Result<String, StoreError> {
        self.conn
            .query_row("SELECT title FROM holons WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StoreError::HolonNotFound { id: id.to_string() })
    }

    /// Lists all holon ids.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn list_holon_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id FROM holons ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Moves a holon to a new layer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when no row matches.
    pub fn update_holon_layer(&self, id: &str, layer: Layer) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE holons SET layer = ?1, updated_at = ?2 WHERE id = ?3",
            params![layer.as_str(), Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::HolonNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Caches a freshly computed reliability score on the holon row.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn update_cached_score(&self, id: &str, score: f64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE holons SET cached_r_score = ?1, updated_at = ?2 WHERE id = ?3",
            params![score.clamp(0.0, 1.0), Utc::now(), id],
        )?;
        Ok(())
    }

    /// Stores an implementation contract on a decision record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when no row matches.
    pub fn set_holon_contract(&self, id: &str, contract: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE holons SET contract = ?1, updated_at = ?2 WHERE id = ?3",
            params![contract, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::HolonNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// One-hop promotion children of a holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn holons_by_parent(&self, parent_id: &str) -> Result<Vec<Holon>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOLON_COLUMNS} FROM holons h WHERE h.parent_id = ?1 ORDER BY h.id"
        ))?;
        let rows = stmt.query_map([parent_id], holon_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Full promotion chain of a holon, root first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when the starting holon is
    /// missing.
    pub fn holon_lineage(&self, id: &str) -> Result<Vec<Holon>, StoreError> {
        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            if !seen.insert(current.clone()) {
                break;
            }
            let holon = self.get_holon(&current)?;
            cursor = holon.parent_id.clone();
            lineage.push(holon);
        }
        lineage.reverse();
        Ok(lineage)
    }

    /// Flags a holon as needing re-verification.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when no row matches.
    pub fn mark_needs_reverification(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE holons SET needs_reverification = 1, reverification_reason = ?1, \
             reverification_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![reason, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::HolonNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Clears the re-verification flag.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn clear_needs_reverification(&self, id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE holons SET needs_reverification = 0, reverification_reason = NULL, \
             reverification_at = NULL, updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    /// Counts active holons per layer for a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn count_active_by_layer(&self, context_id: &str) -> Result<LayerCounts, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT h.layer, COUNT(*) FROM holons h
             WHERE h.context_id = ?1 AND ({ACTIVE_HOLON_PREDICATE})
             GROUP BY h.layer"
        ))?;
        let rows = stmt.query_map([context_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = LayerCounts::default();
        for row in rows {
            let (layer, count) = row?;
            match layer.as_str() {
                "L0" => counts.l0 = count,
                "L1" => counts.l1 = count,
                "L2" => counts.l2 = count,
                _ => {}
            }
        }
        counts.invalid = self.conn.query_row(
            "SELECT COUNT(*) FROM holons WHERE context_id = ?1 AND layer = 'invalid'",
            [context_id],
            |row| row.get(0),
        )?;
        Ok(counts)
    }

    /// Counts active holons of one layer for a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn count_layer(&self, context_id: &str, layer: Layer) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM holons h
                 WHERE h.context_id = ?1 AND h.layer = ?2 AND ({ACTIVE_HOLON_PREDICATE})"
            ),
            params![context_id, layer.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Counts holons archived by resolved decisions in a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn count_archived(&self, context_id: &str) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM holons h
                 WHERE h.context_id = ?1 AND h.layer != 'invalid'
                   AND NOT ({ACTIVE_HOLON_PREDICATE})"
            ),
            [context_id],
            |row| row.get(0),
        )?)
    }

    /// Most recently updated active holons in a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn recent_holons(&self, context_id: &str, limit: i64) -> Result<Vec<Holon>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOLON_COLUMNS} FROM holons h
             WHERE h.context_id = ?1 AND ({ACTIVE_HOLON_PREDICATE})
             ORDER BY h.updated_at DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![context_id, limit], holon_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Resolves a decision identifier given either the stored id or the
    /// dated mirror-file form `DRR-YYYY-MM-DD-<slug>`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when neither form matches.
    pub fn resolve_decision_id(&self, id: &str) -> Result<Holon, StoreError> {
        if let Ok(holon) = self.get_holon(id) {
            return Ok(holon);
        }
        // Dated filename handed in, bare slug stored.
        if let Some(slug) = strip_drr_date_prefix(id) {
            if let Ok(holon) = self.get_holon(slug) {
                return Ok(holon);
            }
        }
        // Bare slug handed in, dated id stored.
        let pattern = format!("DRR-____-__-__-{}", escape_like(id));
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT {HOLON_COLUMNS} FROM holons h
                     WHERE h.id LIKE ?1 ESCAPE '\\' ORDER BY h.created_at DESC LIMIT 1"
                ),
                [pattern],
                holon_from_row,
            )
            .optional()?;
        found.ok_or_else(|| StoreError::HolonNotFound { id: id.to_string() })
    }

    // ------------------------------------------------------------------
    // Evidence
    // ------------------------------------------------------------------

    /// Appends an evidence record.
    ///
    /// # Errors
    ///
    /// Returns an error on constraint violation or storage failure.
    pub fn add_evidence(&self, evidence: &Evidence) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO evidence (id, holon_id, type, content, verdict, assurance_level, \
             carrier_ref, carrier_hash, carrier_commit, valid_until, is_stale, stale_reason, \
             stale_marked_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                evidence.id,
                evidence.holon_id,
                evidence.evidence_type.as_str(),
                evidence.content,
                evidence.verdict.as_str(),
                evidence.assurance_level,
                evidence.carrier_ref,
                evidence.carrier_hash,
                evidence.carrier_commit,
                evidence.valid_until,
                i64::from(evidence.is_stale),
                evidence.stale_reason,
                evidence.stale_marked_at,
                evidence.created_at,
            ],
        )?;
        Ok(())
    }

    /// Fetches an evidence record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EvidenceNotFound`] when no row matches.
    pub fn get_evidence(&self, id: &str) -> Result<Evidence, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE id = ?1"),
                [id],
                evidence_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::EvidenceNotFound { id: id.to_string() })
    }

    /// All evidence attached to a holon, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn evidence_for(&self, holon_id: &str) -> Result<Vec<Evidence>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE holon_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([holon_id], evidence_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Evidence that carries a carrier reference, across all holons.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn evidence_with_carrier(&self) -> Result<Vec<Evidence>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence
             WHERE carrier_ref IS NOT NULL AND carrier_ref != '' ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], evidence_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Marks one evidence record stale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EvidenceNotFound`] when no row matches.
    pub fn mark_evidence_stale(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE evidence SET is_stale = 1, stale_reason = ?1, stale_marked_at = ?2
             WHERE id = ?3",
            params![reason, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::EvidenceNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Clears the stale flag on one evidence record.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn clear_evidence_stale(&self, id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE evidence SET is_stale = 0, stale_reason = NULL, stale_marked_at = NULL
             WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    /// Clears the stale flag on all of a holon's evidence.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn clear_stale_for_holon(&self, holon_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE evidence SET is_stale = 0, stale_reason = NULL, stale_marked_at = NULL
             WHERE holon_id = ?1",
            [holon_id],
        )?;
        Ok(())
    }

    /// Stale evidence attached to one holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn stale_evidence_for(&self, holon_id: &str) -> Result<Vec<Evidence>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence
             WHERE holon_id = ?1 AND is_stale = 1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([holon_id], evidence_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All stale evidence across the store.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn all_stale_evidence(&self) -> Result<Vec<Evidence>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE is_stale = 1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], evidence_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Evidence whose validity horizon has passed, excluding stale records
    /// and records covered by an active waiver.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn decayed_evidence(&self, now: DateTime<Utc>) -> Result<Vec<Evidence>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence ev
             WHERE ev.valid_until IS NOT NULL AND ev.valid_until < ?1 AND ev.is_stale = 0
               AND NOT EXISTS (
                   SELECT 1 FROM waivers w
                   WHERE w.evidence_id = ev.id AND w.waived_until >= ?1
               )
             ORDER BY ev.valid_until, ev.id"
        ))?;
        let rows = stmt.query_map([now], evidence_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Inserts a typed edge between two existing holons.
    ///
    /// Dependency edges are checked against the acyclicity invariant before
    /// insertion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HolonNotFound`] when either endpoint is
    /// missing, [`StoreError::DependencyCycle`] when a dependency edge would
    /// close a loop, and [`StoreError::DuplicateRelation`] when the triple
    /// already exists.
    pub fn create_relation(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        congruence_level: CongruenceLevel,
    ) -> Result<(), StoreError> {
        if !self.holon_exists(source_id)? {
            return Err(StoreError::HolonNotFound {
                id: source_id.to_string(),
            });
        }
        if !self.holon_exists(target_id)? {
            return Err(StoreError::HolonNotFound {
                id: target_id.to_string(),
            });
        }
        if relation_type.is_dependency() && self.would_create_cycle(source_id, target_id)? {
            return Err(StoreError::DependencyCycle {
                source_id: source_id.to_string(),
                target: target_id.to_string(),
            });
        }

        let inserted = self.conn.execute(
            "INSERT INTO relations (source_id, target_id, relation_type, congruence_level, \
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_id, target_id, relation_type) DO NOTHING",
            params![
                source_id,
                target_id,
                relation_type.as_str(),
                congruence_level.value(),
                Utc::now(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateRelation {
                source_id: source_id.to_string(),
                target: target_id.to_string(),
                relation: relation_type.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Whether the `(source, target, type)` triple exists.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn relation_exists(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
    ) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM relations
                 WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3",
                params![source_id, target_id, relation_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether adding the dependency edge `source -> target` would close a
    /// loop in the dependency subgraph.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn would_create_cycle(&self, source_id: &str, target_id: &str) -> Result<bool, StoreError> {
        let mut stack = vec![target_id.to_string()];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == source_id {
                return Ok(true);
            }
            if !seen.insert(node.clone()) {
                continue;
            }
            for relation in self.dependencies_of(&node)? {
                stack.push(relation.target_id);
            }
        }
        Ok(false)
    }

    /// Outgoing dependency edges of a holon, ordered by target id.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn dependencies_of(&self, source_id: &str) -> Result<Vec<Relation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relation_type, congruence_level, created_at
             FROM relations
             WHERE source_id = ?1 AND relation_type IN ('componentOf', 'constituentOf')
             ORDER BY target_id",
        )?;
        let rows = stmt.query_map([source_id], relation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Incoming dependency edges of a holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn components_of(&self, target_id: &str) -> Result<Vec<Relation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relation_type, congruence_level, created_at
             FROM relations
             WHERE target_id = ?1 AND relation_type IN ('componentOf', 'constituentOf')
             ORDER BY source_id",
        )?;
        let rows = stmt.query_map([target_id], relation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Outgoing edges of one type from a holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn relations_from(
        &self,
        source_id: &str,
        relation_type: RelationType,
    ) -> Result<Vec<Relation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relation_type, congruence_level, created_at
             FROM relations
             WHERE source_id = ?1 AND relation_type = ?2 ORDER BY target_id",
        )?;
        let rows = stmt.query_map(params![source_id, relation_type.as_str()], relation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Incoming edges of one type to a holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn relations_to(
        &self,
        target_id: &str,
        relation_type: RelationType,
    ) -> Result<Vec<Relation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relation_type, congruence_level, created_at
             FROM relations
             WHERE target_id = ?1 AND relation_type = ?2 ORDER BY source_id",
        )?;
        let rows = stmt.query_map(params![target_id, relation_type.as_str()], relation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ------------------------------------------------------------------
    // Work records & audit ledger
    // ------------------------------------------------------------------

    /// Appends a work record.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn record_work(&self, record: &WorkRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO work_records (id, method_ref, performer_ref, started_at, ended_at, \
             resource_ledger, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.method_ref,
                record.performer_ref,
                record.started_at,
                record.ended_at,
                record.resource_ledger,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Appends an audit entry. The ledger is append-only; nothing updates
    /// or deletes rows.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn insert_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO audit_log (id, tool_name, operation, actor, target_id, input_hash, \
             result, details, context_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.tool_name,
                entry.operation,
                entry.actor,
                entry.target_id,
                entry.input_hash,
                entry.result.as_str(),
                entry.details,
                entry.context_id,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// Audit entries for a context, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn audit_by_context(&self, context_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tool_name, operation, actor, target_id, input_hash, result, details, \
             context_id, created_at
             FROM audit_log WHERE context_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([context_id], audit_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Audit entries about a target holon, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn audit_by_target(&self, target_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tool_name, operation, actor, target_id, input_hash, result, details, \
             context_id, created_at
             FROM audit_log WHERE target_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([target_id], audit_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Most recent audit entries.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tool_name, operation, actor, target_id, input_hash, result, details, \
             context_id, created_at
             FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], audit_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ------------------------------------------------------------------
    // Workflow state
    // ------------------------------------------------------------------

    /// Reads the persisted workflow state of a context, if initialized.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn fpf_state(&self, context_id: &str) -> Result<Option<FpfState>, StoreError> {
        let state = self
            .conn
            .query_row(
                "SELECT context_id, active_role, active_session_id, last_commit, \
                 last_commit_at, assurance_threshold
                 FROM fpf_state WHERE context_id = ?1",
                [context_id],
                |row| {
                    let phase_raw: Option<String> = row.get(1)?;
                    let phase = phase_raw
                        .as_deref()
                        .unwrap_or("")
                        .parse::<Phase>()
                        .map_err(|e| conversion_error(1, e))?;
                    Ok(FpfState {
                        context_id: row.get(0)?,
                        phase,
                        session_id: row.get(2)?,
                        last_commit: row.get(3)?,
                        last_commit_at: row.get(4)?,
                        assurance_threshold: row.get::<_, Option<f64>>(5)?.unwrap_or(0.8),
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    /// Current phase of a context, defaulting to idle when uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn get_phase(&self, context_id: &str) -> Result<Phase, StoreError> {
        Ok(self
            .fpf_state(context_id)?
            .map_or(Phase::Idle, |state| state.phase))
    }

    /// Persists the active phase for a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn set_phase(&self, context_id: &str, phase: Phase) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO fpf_state (context_id, active_role, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(context_id) DO UPDATE SET
                 active_role = excluded.active_role,
                 updated_at = excluded.updated_at",
            params![context_id, phase.as_str(), Utc::now()],
        )?;
        Ok(())
    }

    /// Persists the session id for a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn set_session_id(&self, context_id: &str, session_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO fpf_state (context_id, active_session_id, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(context_id) DO UPDATE SET
                 active_session_id = excluded.active_session_id,
                 updated_at = excluded.updated_at",
            params![context_id, session_id, Utc::now()],
        )?;
        Ok(())
    }

    /// Reads the last observed commit of a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn get_last_commit(
        &self,
        context_id: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, StoreError> {
        let state = self.fpf_state(context_id)?;
        Ok(state.and_then(|s| match (s.last_commit, s.last_commit_at) {
            (Some(commit), Some(at)) => Some((commit, at)),
            _ => None,
        }))
    }

    /// Persists the last observed commit for a context.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn set_last_commit(&self, context_id: &str, commit: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO fpf_state (context_id, last_commit, last_commit_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(context_id) DO UPDATE SET
                 last_commit = excluded.last_commit,
                 last_commit_at = excluded.last_commit_at,
                 updated_at = excluded.updated_at",
            params![context_id, commit, Utc::now()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Waivers & characteristics
    // ------------------------------------------------------------------

    /// Records a waiver for an evidence record.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn insert_waiver(&self, waiver: &Waiver) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO waivers (id, evidence_id, waived_until, rationale, actor, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                waiver.id,
                waiver.evidence_id,
                waiver.waived_until,
                waiver.rationale,
                waiver.actor,
                waiver.created_at,
            ],
        )?;
        Ok(())
    }

    /// The longest-lived waiver still covering an evidence record at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn active_waiver_for(
        &self,
        evidence_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Waiver>, StoreError> {
        let waiver = self
            .conn
            .query_row(
                "SELECT id, evidence_id, waived_until, rationale, actor, created_at
                 FROM waivers
                 WHERE evidence_id = ?1 AND waived_until >= ?2
                 ORDER BY waived_until DESC LIMIT 1",
                params![evidence_id, now],
                |row| {
                    Ok(Waiver {
                        id: row.get(0)?,
                        evidence_id: row.get(1)?,
                        waived_until: row.get(2)?,
                        rationale: row.get(3)?,
                        actor: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(waiver)
    }

    /// Records a characteristic measurement on a holon. Measurements are
    /// read-only once written; re-recording the same name fails.
    ///
    /// # Errors
    ///
    /// Returns an error on constraint violation or storage failure.
    pub fn add_characteristic(
        &self,
        holon_id: &str,
        characteristic: &Characteristic,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO characteristics (holon_id, name, scale, value, unit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                holon_id,
                characteristic.name,
                characteristic.scale.as_str(),
                characteristic.value,
                characteristic.unit,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Characteristics recorded on a holon.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn characteristics_for(&self, holon_id: &str) -> Result<Vec<Characteristic>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, scale, value, unit FROM characteristics
             WHERE holon_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map([holon_id], |row| {
            let scale_raw: String = row.get(1)?;
            let scale = scale_raw
                .parse::<Scale>()
                .map_err(|e| conversion_error(1, e))?;
            Ok(Characteristic {
                name: row.get(0)?,
                scale,
                value: row.get(2)?,
                unit: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// How a decision record was resolved, if it was.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn resolution_of(&self, drr_id: &str) -> Result<Option<Resolution>, StoreError> {
        let evidence_type: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM evidence
                 WHERE holon_id = ?1
                   AND type IN ('implementation', 'abandonment', 'supersession')
                 ORDER BY created_at LIMIT 1",
                [drr_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(evidence_type.map(|t| match EvidenceType::from(t.as_str()) {
            EvidenceType::Abandonment => Resolution::Abandoned,
            EvidenceType::Supersession => Resolution::Superseded,
            _ => Resolution::Implemented,
        }))
    }

    /// Decision records in a context without resolution evidence.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn open_decisions(&self, context_id: &str) -> Result<Vec<Holon>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOLON_COLUMNS} FROM holons h
             WHERE h.context_id = ?1 AND (h.type = 'DRR' OR h.layer = 'DRR')
               AND NOT EXISTS (
                   SELECT 1 FROM evidence e
                   WHERE e.holon_id = h.id
                     AND e.type IN ('implementation', 'abandonment', 'supersession')
               )
             ORDER BY h.created_at DESC"
        ))?;
        let rows = stmt.query_map([context_id], holon_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Resolved decision records, newest first, optionally filtered by
    /// resolution kind.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn resolved_decisions(
        &self,
        context_id: &str,
        resolution: Option<Resolution>,
        limit: i64,
    ) -> Result<Vec<(Holon, Resolution)>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOLON_COLUMNS} FROM holons h
             WHERE h.context_id = ?1 AND (h.type = 'DRR' OR h.layer = 'DRR')
               AND EXISTS (
                   SELECT 1 FROM evidence e
                   WHERE e.holon_id = h.id
                     AND e.type IN ('implementation', 'abandonment', 'supersession')
               )
             ORDER BY h.updated_at DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![context_id, limit], holon_from_row)?;

        let mut decisions = Vec::new();
        for row in rows {
            let holon = row?;
            let Some(found) = self.resolution_of(&holon.id)? else {
                continue;
            };
            if resolution.is_none() || resolution == Some(found) {
                decisions.push((holon, found));
            }
        }
        Ok(decisions)
    }

    // ------------------------------------------------------------------
    // Full-text search
    // ------------------------------------------------------------------

    /// Full-text search over holon titles and bodies.
    ///
    /// The query is tokenised and each token quoted, so reserved FTS5
    /// operators in user input cannot produce a parse error.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn search_holons(
        &self,
        query: &str,
        layer: Option<Layer>,
        limit: i64,
    ) -> Result<Vec<HolonHit>, StoreError> {
        let expr = fts_match_expr(query);
        if expr.is_empty() {
            return Ok(Vec::new());
        }

        let map = |row: &Row<'_>| -> rusqlite::Result<HolonHit> {
            let layer_raw: String = row.get(2)?;
            let type_raw: String = row.get(3)?;
            Ok(HolonHit {
                id: row.get(0)?,
                title: row.get(1)?,
                layer: layer_raw
                    .parse::<Layer>()
                    .map_err(|e| conversion_error(2, e))?,
                holon_type: type_raw
                    .parse::<HolonType>()
                    .map_err(|e| conversion_error(3, e))?,
                cached_r_score: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                snippet: row.get(5)?,
            })
        };

        let hits = if let Some(layer) = layer {
            let mut stmt = self.conn.prepare(
                "SELECT h.id, h.title, h.layer, h.type, h.cached_r_score, \
                 substr(h.content, 1, 160)
                 FROM holons_fts JOIN holons h ON h.id = holons_fts.id
                 WHERE holons_fts MATCH ?1 AND h.layer = ?2
                 ORDER BY rank LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![expr, layer.as_str(), limit], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = self.conn.prepare(
                "SELECT h.id, h.title, h.layer, h.type, h.cached_r_score, \
                 substr(h.content, 1, 160)
                 FROM holons_fts JOIN holons h ON h.id = holons_fts.id
                 WHERE holons_fts MATCH ?1
                 ORDER BY rank LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![expr, limit], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(hits)
    }

    /// Relevance-ranked holons matching *any* substantial token of the
    /// query. Used to surface potential dependencies during a proposal,
    /// where requiring every token (as [`Store::search_holons`] does) would
    /// hide partial overlaps.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn suggest_holons(&self, query: &str, limit: i64) -> Result<Vec<HolonHit>, StoreError> {
        let expr = fts_match_expr_any(query);
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT h.id, h.title, h.layer, h.type, h.cached_r_score, \
             substr(h.content, 1, 160)
             FROM holons_fts JOIN holons h ON h.id = holons_fts.id
             WHERE holons_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![expr, limit], |row: &Row<'_>| {
            let layer_raw: String = row.get(2)?;
            let type_raw: String = row.get(3)?;
            Ok(HolonHit {
                id: row.get(0)?,
                title: row.get(1)?,
                layer: layer_raw
                    .parse::<Layer>()
                    .map_err(|e| conversion_error(2, e))?,
                holon_type: type_raw
                    .parse::<HolonType>()
                    .map_err(|e| conversion_error(3, e))?,
                cached_r_score: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                snippet: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Full-text search over evidence bodies.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn search_evidence(&self, query: &str, limit: i64) -> Result<Vec<EvidenceHit>, StoreError> {
        let expr = fts_match_expr(query);
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.holon_id, e.type, e.verdict, substr(e.content, 1, 160)
             FROM evidence_fts JOIN evidence e ON e.id = evidence_fts.id
             WHERE evidence_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![expr, limit], |row| {
            Ok(EvidenceHit {
                id: row.get(0)?,
                holon_id: row.get(1)?,
                evidence_type: row.get(2)?,
                verdict: row.get(3)?,
                snippet: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Builds a safe FTS5 match expression: every token is double-quoted so
/// hyphens and other reserved operators in user input stay literal. Tokens
/// are joined by FTS5's implicit AND.
fn fts_match_expr(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like [`fts_match_expr`] but matches documents containing *any* token.
/// Short tokens drown everything in noise and are dropped.
fn fts_match_expr_any(query: &str) -> String {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.len() >= 3)
        .map(str::to_lowercase)
        .filter(|token| seen.insert(token.clone()))
        .take(12)
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Strips a `DRR-YYYY-MM-DD-` prefix, returning the bare slug.
fn strip_drr_date_prefix(id: &str) -> Option<&str> {
    let rest = id.strip_prefix("DRR-")?;
    if rest.len() > 11 && rest.as_bytes().get(10) == Some(&b'-') {
        let (date, slug) = rest.split_at(10);
        if date.chars().enumerate().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        }) {
            return Some(&slug[1..]);
        }
    }
    None
}

/// Escapes `LIKE` wildcards in a literal fragment.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn conversion_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn holon_from_row(row: &Row<'_>) -> rusqlite::Result<Holon> {
    let type_raw: String = row.get(1)?;
    let kind_raw: Option<String> = row.get(2)?;
    let layer_raw: String = row.get(3)?;
    Ok(Holon {
        id: row.get(0)?,
        holon_type: type_raw
            .parse::<HolonType>()
            .map_err(|e| conversion_error(1, e))?,
        kind: kind_raw
            .as_deref()
            .map(str::parse::<HolonKind>)
            .transpose()
            .map_err(|e| conversion_error(2, e))?
            .unwrap_or_default(),
        layer: layer_raw
            .parse::<Layer>()
            .map_err(|e| conversion_error(3, e))?,
        title: row.get(4)?,
        content: row.get(5)?,
        context_id: row.get(6)?,
        scope: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        parent_id: row.get(8)?,
        cached_r_score: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        needs_reverification: row.get::<_, Option<i64>>(10)?.unwrap_or(0) != 0,
        reverification_reason: row.get(11)?,
        reverification_at: row.get(12)?,
        contract: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<Evidence> {
    let type_raw: String = row.get(2)?;
    let verdict_raw: String = row.get(4)?;
    Ok(Evidence {
        id: row.get(0)?,
        holon_id: row.get(1)?,
        evidence_type: EvidenceType::from(type_raw.as_str()),
        content: row.get(3)?,
        verdict: verdict_raw
            .parse::<Verdict>()
            .map_err(|e| conversion_error(4, e))?,
        assurance_level: row.get(5)?,
        carrier_ref: row.get(6)?,
        carrier_hash: row.get(7)?,
        carrier_commit: row.get(8)?,
        valid_until: row.get(9)?,
        is_stale: row.get::<_, Option<i64>>(10)?.unwrap_or(0) != 0,
        stale_reason: row.get(11)?,
        stale_marked_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<Relation> {
    let type_raw: String = row.get(2)?;
    Ok(Relation {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        relation_type: type_raw
            .parse::<RelationType>()
            .map_err(|e| conversion_error(2, e))?,
        congruence_level: CongruenceLevel::new_or_default(
            row.get::<_, Option<i64>>(3)?.unwrap_or(3),
        ),
        created_at: row.get(4)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let result_raw: String = row.get(6)?;
    let result = match result_raw.as_str() {
        "BLOCKED" => AuditResult::Blocked,
        "ERROR" => AuditResult::Error,
        _ => AuditResult::Success,
    };
    Ok(AuditEntry {
        id: row.get(0)?,
        tool_name: row.get(1)?,
        operation: row.get(2)?,
        actor: row.get(3)?,
        target_id: row.get(4)?,
        input_hash: row.get(5)?,
        result,
        details: row.get(7)?,
        context_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}
