//! Schema migration ladder.
//!
//! Migrations are applied sequentially to existing databases and recorded in
//! the `schema_version` table. New migrations are appended to the end of the
//! list; released migrations are never edited or reordered. The bootstrap
//! schema creates the current full shape, so on a fresh database every step
//! below is a tolerated no-op: `ADD COLUMN` statements fail with a duplicate
//! column error (tolerated), everything else is `IF NOT EXISTS`.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::StoreError;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Add parent_id to holons for L0->L1->L2 chain tracking",
        sql: "ALTER TABLE holons ADD COLUMN parent_id TEXT REFERENCES holons(id)",
    },
    Migration {
        version: 2,
        description: "Add cached_r_score to holons for the trust calculus",
        sql: "ALTER TABLE holons ADD COLUMN cached_r_score REAL DEFAULT 0.0",
    },
    Migration {
        version: 3,
        description: "Add fpf_state table for persisted workflow state",
        sql: "CREATE TABLE IF NOT EXISTS fpf_state (
            context_id TEXT PRIMARY KEY,
            active_role TEXT,
            active_session_id TEXT,
            active_role_context TEXT,
            last_commit TEXT,
            last_commit_at TEXT,
            assurance_threshold REAL DEFAULT 0.8
                CHECK(assurance_threshold BETWEEN 0.0 AND 1.0),
            updated_at TEXT
        )",
    },
    Migration {
        version: 4,
        description: "Add FTS5 tables for full-text search over holons and evidence",
        sql: "
            CREATE VIRTUAL TABLE IF NOT EXISTS holons_fts USING fts5(
                id,
                title,
                content,
                content='holons',
                content_rowid='rowid'
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS evidence_fts USING fts5(
                id,
                content,
                content='evidence',
                content_rowid='rowid'
            );

            INSERT INTO holons_fts(holons_fts) VALUES('rebuild');
            INSERT INTO evidence_fts(evidence_fts) VALUES('rebuild');

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
        ",
    },
    Migration {
        version: 5,
        description: "Add carrier change tracking: staleness and reverification columns",
        sql: "ALTER TABLE evidence ADD COLUMN is_stale INTEGER DEFAULT 0",
    },
    Migration {
        version: 6,
        description: "Add waivers table and the contract column on holons",
        sql: "CREATE TABLE IF NOT EXISTS waivers (
            id TEXT PRIMARY KEY,
            evidence_id TEXT NOT NULL,
            waived_until TEXT NOT NULL,
            rationale TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
];

/// Applies all pending migrations, recording each in `schema_version`.
pub(crate) fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    for migration in MIGRATIONS {
        let applied: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM schema_version WHERE version = ?1",
                [migration.version],
                |row| row.get(0),
            )
            .optional()?;
        if applied.is_some() {
            continue;
        }

        if let Err(err) = conn.execute_batch(migration.sql) {
            if is_duplicate_column_error(&err) {
                debug!(
                    version = migration.version,
                    "migration is a no-op: column already present"
                );
            } else {
                return Err(StoreError::MigrationFailed {
                    version: migration.version,
                    description: migration.description.to_string(),
                    source: err,
                });
            }
        } else {
            info!(
                version = migration.version,
                description = migration.description,
                "applied migration"
            );
        }

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )?;
    }

    Ok(())
}

/// SQLite reports an `ADD COLUMN` against an existing column as a generic
/// error whose message names the duplicate column. That is the expected
/// outcome on a database bootstrapped from the current schema.
fn is_duplicate_column_error(err: &rusqlite::Error) -> bool {
    err.to_string().contains("duplicate column")
}
