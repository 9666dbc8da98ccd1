//! Schema definitions and migration runner for SurrealDB.
//!
//! Both tables are SCHEMAFULL. Keys are stored as strings: the session
//! id and the user id become record ids of `session` and `last_enter`
//! respectively, and `session.user_id` holds the owner key.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: fn() -> String,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: schema_v1,
}];

// -----------------------------------------------------------------------
// Schema v1 — tables
// -----------------------------------------------------------------------

const TABLES_V1: &str = "\
-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD secret ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD ip ON TABLE session TYPE array<string> DEFAULT [];
DEFINE FIELD last_usage ON TABLE session TYPE datetime;
DEFINE FIELD user_agent ON TABLE session TYPE string;
DEFINE FIELD auth_method ON TABLE session TYPE string;
DEFINE FIELD tokens ON TABLE session TYPE object FLEXIBLE DEFAULT {};

-- =======================================================================
-- Last enter (one record per user)
-- =======================================================================
DEFINE TABLE last_enter SCHEMAFULL;
DEFINE FIELD last_enter ON TABLE last_enter TYPE datetime;
DEFINE FIELD ip ON TABLE last_enter TYPE array<string> DEFAULT [];
";

// -----------------------------------------------------------------------
// Schema v1 — indexes
// -----------------------------------------------------------------------

/// An index definition, rendered to DDL when the schema is built.
#[derive(Debug, Clone, Copy)]
struct IndexSpec {
    name: &'static str,
    table: &'static str,
    columns: &'static [&'static str],
    unique: bool,
}

impl IndexSpec {
    const fn unique(name: &'static str, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            table,
            columns,
            unique: true,
        }
    }

    const fn lookup(name: &'static str, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            table,
            columns,
            unique: false,
        }
    }

    fn ddl(&self) -> String {
        let mut ddl = format!(
            "DEFINE INDEX {} ON TABLE {} COLUMNS {}",
            self.name,
            self.table,
            self.columns.join(", ")
        );
        if self.unique {
            ddl.push_str(" UNIQUE");
        }
        ddl.push(';');
        ddl
    }
}

fn session_indexes() -> [IndexSpec; 2] {
    [
        IndexSpec::unique("idx_session_secret", "session", &["secret"]),
        IndexSpec::lookup("idx_session_user", "session", &["user_id"]),
    ]
}

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query((migration.sql)()).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the full schema DDL for version 1: tables, then indexes.
pub fn schema_v1() -> String {
    let mut sql = String::from(TABLES_V1);
    for index in session_indexes() {
        sql.push_str(&index.ddl());
        sql.push('\n');
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn unique_index_ddl() {
        let ddl = IndexSpec::unique("idx_session_secret", "session", &["secret"]).ddl();
        assert_eq!(
            ddl,
            "DEFINE INDEX idx_session_secret ON TABLE session COLUMNS secret UNIQUE;"
        );
    }

    #[test]
    fn lookup_index_is_not_unique() {
        let ddl = IndexSpec::lookup("idx_session_user", "session", &["user_id"]).ddl();
        assert!(!ddl.contains("UNIQUE"));
    }

    #[test]
    fn schema_defines_both_tables_and_indexes() {
        let sql = schema_v1();
        assert!(sql.contains("DEFINE TABLE session"));
        assert!(sql.contains("DEFINE TABLE last_enter"));
        assert!(sql.contains("idx_session_secret"));
        assert!(sql.contains("idx_session_user"));
    }
}
