use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Highest schema version this build knows how to create.
pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (users, pings)");
        apply(
            conn,
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                real_name   TEXT NOT NULL DEFAULT '',
                blurb       TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE pings (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                timestamp   TEXT NOT NULL DEFAULT (datetime('now')),
                content     TEXT NOT NULL,
                likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
                echoes      INTEGER NOT NULL DEFAULT 0 CHECK (echoes >= 0)
            );

            CREATE INDEX idx_pings_user_timestamp
                ON pings(user_id, timestamp DESC);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (auth_tokens)");
        apply(
            conn,
            "
            CREATE TABLE auth_tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                timestamp   TEXT NOT NULL DEFAULT (datetime('now')),
                key         TEXT NOT NULL
            );

            CREATE UNIQUE INDEX idx_auth_tokens_key ON auth_tokens(key);
            CREATE UNIQUE INDEX idx_auth_tokens_user ON auth_tokens(user_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", LATEST_VERSION);
    Ok(())
}

/// Run one migration's DDL inside a transaction. A failing statement rolls
/// back everything before it, including the `schema_version` row.
fn apply(conn: &Connection, sql: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.commit()?;
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, LATEST_VERSION);
    }

    #[test]
    fn v1_database_is_upgraded() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch("DROP TABLE auth_tokens; DELETE FROM schema_version WHERE version = 2;")
            .unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        run(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 2);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'auth_tokens'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn failed_migration_leaves_nothing_behind() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "DROP TABLE auth_tokens;
             DELETE FROM schema_version WHERE version = 2;
             CREATE TABLE idx_auth_tokens_user (x INTEGER);",
        )
        .unwrap();

        // The second unique index collides with the table above.
        assert!(run(&conn).is_err());

        assert!(conn.is_autocommit());
        assert_eq!(current_version(&conn).unwrap(), 1);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('auth_tokens', 'idx_auth_tokens_key')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);

        conn.execute_batch("DROP TABLE idx_auth_tokens_user;").unwrap();
        run(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }
}
