use crate::Database;
use crate::models::{PingCounter, PingRow, TokenRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};
use tracing::debug;

const USER_COLUMNS: &str = "id, username, password, real_name, blurb";

const PING_SELECT: &str = "SELECT p.id, p.user_id, u.username, p.timestamp, p.content, p.likes, p.echoes
     FROM pings p
     JOIN users u ON p.user_id = u.id";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` if the username is already taken.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        real_name: &str,
        blurb: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password, real_name, blurb) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO NOTHING",
                (username, password_hash, real_name, blurb),
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            let id = conn.last_insert_rowid();
            debug!("Inserted user {} ({})", username, id);

            query_user_by_id(conn, id)?
                .map(Some)
                .ok_or_else(|| anyhow!("User {} vanished after insert", id))
        })
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Update whichever profile fields are given; `None` leaves a field alone.
    /// Returns `None` if the user does not exist.
    pub fn update_profile(
        &self,
        user_id: i64,
        real_name: Option<&str>,
        blurb: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET real_name = COALESCE(?2, real_name),
                     blurb = COALESCE(?3, blurb)
                 WHERE id = ?1",
                rusqlite::params![user_id, real_name, blurb],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, user_id)
        })
    }

    // -- Pings --

    /// Insert a ping. Content length is the caller's business; the only thing
    /// enforced here is that `user_id` refers to a real user.
    pub fn insert_ping(&self, user_id: i64, content: &str) -> Result<PingRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO pings (user_id, content) VALUES (?1, ?2)",
                rusqlite::params![user_id, content],
            )?;
            let id = conn.last_insert_rowid();

            query_ping(conn, id)?.ok_or_else(|| anyhow!("Ping {} vanished after insert", id))
        })
    }

    pub fn get_ping(&self, id: i64) -> Result<Option<PingRow>> {
        self.with_conn(|conn| query_ping(conn, id))
    }

    /// Newest-first pings for one user. `before` is the id of the last ping of
    /// the previous page; only strictly older pings are returned.
    pub fn get_pings_by_user(
        &self,
        user_id: i64,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<PingRow>> {
        self.with_conn(|conn| query_pings_by_user(conn, user_id, limit, before))
    }

    pub fn add_like(&self, ping_id: i64) -> Result<Option<PingRow>> {
        self.adjust_counter(ping_id, PingCounter::Likes, true)
    }

    pub fn remove_like(&self, ping_id: i64) -> Result<Option<PingRow>> {
        self.adjust_counter(ping_id, PingCounter::Likes, false)
    }

    pub fn add_echo(&self, ping_id: i64) -> Result<Option<PingRow>> {
        self.adjust_counter(ping_id, PingCounter::Echoes, true)
    }

    pub fn remove_echo(&self, ping_id: i64) -> Result<Option<PingRow>> {
        self.adjust_counter(ping_id, PingCounter::Echoes, false)
    }

    /// Bump a counter up or down by one. Decrements stop at zero.
    /// Returns the updated ping, or `None` if there is no such ping.
    fn adjust_counter(
        &self,
        ping_id: i64,
        counter: PingCounter,
        increment: bool,
    ) -> Result<Option<PingRow>> {
        let column = counter.column();
        let sql = if increment {
            format!("UPDATE pings SET {column} = {column} + 1 WHERE id = ?1")
        } else {
            format!("UPDATE pings SET {column} = {column} - 1 WHERE id = ?1 AND {column} > 0")
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(&sql, [ping_id])?;
            let ping = query_ping(&tx, ping_id)?;
            tx.commit()?;
            Ok(ping)
        })
    }

    // -- Tokens --

    /// Store `key` as the user's token, replacing any key they already had.
    pub fn upsert_token(&self, user_id: i64, key: &str) -> Result<TokenRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (user_id, key) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE
                 SET key = excluded.key, timestamp = datetime('now')",
                rusqlite::params![user_id, key],
            )?;

            query_token_by_key(conn, key)?
                .ok_or_else(|| anyhow!("Token for user {} vanished after upsert", user_id))
        })
    }

    pub fn get_token_by_key(&self, key: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| query_token_by_key(conn, key))
    }

    /// Resolve a token key straight to its owner.
    pub fn get_user_by_token(&self, key: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.password, u.real_name, u.blurb
                 FROM auth_tokens t
                 JOIN users u ON t.user_id = u.id
                 WHERE t.key = ?1",
            )?;
            stmt.query_row([key], user_from_row).optional()
        })
    }

    /// Returns whether a token was actually removed.
    pub fn delete_token_for_user(&self, user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", [user_id])?;
            Ok(removed > 0)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        real_name: row.get(3)?,
        blurb: row.get(4)?,
    })
}

fn ping_from_row(row: &Row<'_>) -> rusqlite::Result<PingRow> {
    Ok(PingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        timestamp: row.get(3)?,
        content: row.get(4)?,
        likes: row.get(5)?,
        echoes: row.get(6)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))?;
    stmt.query_row([username], user_from_row).optional()
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    stmt.query_row([id], user_from_row).optional()
}

fn query_ping(conn: &Connection, id: i64) -> Result<Option<PingRow>> {
    let mut stmt = conn.prepare(&format!("{PING_SELECT} WHERE p.id = ?1"))?;
    stmt.query_row([id], ping_from_row).optional()
}

fn query_pings_by_user(
    conn: &Connection,
    user_id: i64,
    limit: u32,
    before: Option<i64>,
) -> Result<Vec<PingRow>> {
    // Several pings can share a second, so id breaks timestamp ties both in
    // the ordering and in the cursor comparison.
    let mut stmt = conn.prepare(&format!(
        "{PING_SELECT}
         WHERE p.user_id = ?1
           AND (?3 IS NULL OR (p.timestamp, p.id) <
                (SELECT c.timestamp, c.id FROM pings c WHERE c.id = ?3))
         ORDER BY p.timestamp DESC, p.id DESC
         LIMIT ?2"
    ))?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, limit, before], ping_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_token_by_key(conn: &Connection, key: &str) -> Result<Option<TokenRow>> {
    let mut stmt =
        conn.prepare("SELECT id, user_id, timestamp, key FROM auth_tokens WHERE key = ?1")?;

    stmt.query_row([key], |row| {
        Ok(TokenRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            timestamp: row.get(2)?,
            key: row.get(3)?,
        })
    })
    .optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(username: &str) -> (Database, UserRow) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(username, "$argon2id$stub", "", "").unwrap().unwrap();
        (db, user)
    }

    /// Pin a ping's timestamp so ordering tests don't depend on the clock.
    fn set_timestamp(db: &Database, ping_id: i64, ts: &str) {
        db.with_conn(|conn| {
            conn.execute("UPDATE pings SET timestamp = ?2 WHERE id = ?1", rusqlite::params![ping_id, ts])?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_user("alice", "hash", "Alice A.", "hi").unwrap().unwrap();

        assert_eq!(created.username, "alice");
        assert_eq!(created.real_name, "Alice A.");
        assert!(db.username_exists("alice").unwrap());
        assert!(!db.username_exists("bob").unwrap());

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.password, "hash");
        assert!(db.get_user_by_id(created.id + 1).unwrap().is_none());
    }

    #[test]
    fn usernames_are_unique() {
        let (db, _) = db_with_user("alice");
        assert!(db.create_user("alice", "other", "", "").unwrap().is_none());
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().password, "$argon2id$stub");
    }

    #[test]
    fn profile_update_keeps_missing_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("alice", "hash", "Alice", "old blurb").unwrap().unwrap();

        let updated = db.update_profile(user.id, None, Some("new blurb")).unwrap().unwrap();
        assert_eq!(updated.real_name, "Alice");
        assert_eq!(updated.blurb, "new blurb");

        assert!(db.update_profile(999, Some("x"), None).unwrap().is_none());
    }

    #[test]
    fn ping_for_unknown_user_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_ping(42, "hello").is_err());
    }

    #[test]
    fn ping_starts_with_zero_counters() {
        let (db, user) = db_with_user("alice");
        let ping = db.insert_ping(user.id, "first!").unwrap();

        assert_eq!(ping.user_id, user.id);
        assert_eq!(ping.username, "alice");
        assert_eq!(ping.content, "first!");
        assert_eq!((ping.likes, ping.echoes), (0, 0));
        assert!(!ping.timestamp.is_empty());
    }

    #[test]
    fn pings_come_back_newest_first() {
        let (db, alice) = db_with_user("alice");
        let bob = db.create_user("bob", "hash", "", "").unwrap().unwrap();

        let p1 = db.insert_ping(alice.id, "one").unwrap();
        let p2 = db.insert_ping(alice.id, "two").unwrap();
        let p3 = db.insert_ping(alice.id, "three").unwrap();
        db.insert_ping(bob.id, "not alice").unwrap();

        set_timestamp(&db, p1.id, "2024-01-01 10:00:00");
        set_timestamp(&db, p2.id, "2024-01-01 12:00:00");
        set_timestamp(&db, p3.id, "2024-01-01 11:00:00");

        let ids: Vec<i64> = db
            .get_pings_by_user(alice.id, 50, None)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![p2.id, p3.id, p1.id]);
    }

    #[test]
    fn pagination_with_limit_and_cursor() {
        let (db, user) = db_with_user("alice");
        let ids: Vec<i64> = (0..5)
            .map(|i| db.insert_ping(user.id, &format!("ping {i}")).unwrap().id)
            .collect();
        // Same second for all of them: id has to break the tie.
        for id in &ids {
            set_timestamp(&db, *id, "2024-06-01 00:00:00");
        }

        let first_page = db.get_pings_by_user(user.id, 2, None).unwrap();
        assert_eq!(
            first_page.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![ids[4], ids[3]]
        );

        let cursor = first_page.last().unwrap().id;
        let second_page = db.get_pings_by_user(user.id, 2, Some(cursor)).unwrap();
        assert_eq!(
            second_page.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );

        let last_page = db.get_pings_by_user(user.id, 2, Some(ids[1])).unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].id, ids[0]);
    }

    #[test]
    fn unknown_cursor_gives_an_empty_page() {
        let (db, user) = db_with_user("alice");
        let ping = db.insert_ping(user.id, "only one").unwrap();

        assert!(db.get_pings_by_user(user.id, 50, Some(ping.id + 1000)).unwrap().is_empty());
        assert!(db.get_pings_by_user(user.id, 50, Some(ping.id)).unwrap().is_empty());
    }

    #[test]
    fn counters_never_go_negative() {
        let (db, user) = db_with_user("alice");
        let ping = db.insert_ping(user.id, "like me").unwrap();

        let after_remove = db.remove_like(ping.id).unwrap().unwrap();
        assert_eq!(after_remove.likes, 0);

        db.add_like(ping.id).unwrap();
        let liked = db.add_like(ping.id).unwrap().unwrap();
        assert_eq!(liked.likes, 2);

        let echoed = db.add_echo(ping.id).unwrap().unwrap();
        assert_eq!((echoed.likes, echoed.echoes), (2, 1));

        db.remove_echo(ping.id).unwrap();
        let unechoed = db.remove_echo(ping.id).unwrap().unwrap();
        assert_eq!(unechoed.echoes, 0);
    }

    #[test]
    fn negative_counter_violates_check() {
        let (db, user) = db_with_user("alice");
        let ping = db.insert_ping(user.id, "x").unwrap();
        let res = db.with_conn(|conn| {
            conn.execute("UPDATE pings SET likes = -1 WHERE id = ?1", [ping.id])?;
            Ok(())
        });
        assert!(res.is_err());
    }

    #[test]
    fn counter_on_missing_ping_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_like(7).unwrap().is_none());
        assert!(db.remove_echo(7).unwrap().is_none());
    }

    #[test]
    fn one_token_row_per_user() {
        let (db, user) = db_with_user("alice");
        db.upsert_token(user.id, "key-one").unwrap();

        let second = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (user_id, key) VALUES (?1, 'key-two')",
                [user.id],
            )?;
            Ok(())
        });
        assert!(second.is_err());
    }

    #[test]
    fn token_keys_are_unique() {
        let (db, alice) = db_with_user("alice");
        let bob = db.create_user("bob", "hash", "", "").unwrap().unwrap();
        db.upsert_token(alice.id, "shared").unwrap();
        assert!(db.upsert_token(bob.id, "shared").is_err());
    }

    #[test]
    fn reissuing_a_token_rotates_the_key() {
        let (db, user) = db_with_user("alice");
        let first = db.upsert_token(user.id, "old-key").unwrap();
        let second = db.upsert_token(user.id, "new-key").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.key, "new-key");
        assert!(db.get_token_by_key("old-key").unwrap().is_none());
        assert!(db.get_user_by_token("old-key").unwrap().is_none());

        let owner = db.get_user_by_token("new-key").unwrap().unwrap();
        assert_eq!(owner.id, user.id);
    }

    #[test]
    fn deleting_a_token() {
        let (db, user) = db_with_user("alice");
        db.upsert_token(user.id, "k").unwrap();

        assert!(db.delete_token_for_user(user.id).unwrap());
        assert!(!db.delete_token_for_user(user.id).unwrap());
        assert!(db.get_token_by_key("k").unwrap().is_none());
    }

    #[test]
    fn token_for_unknown_user_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.upsert_token(1, "orphan").is_err());
    }
}
