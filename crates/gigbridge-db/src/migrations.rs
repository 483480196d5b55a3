//! Schema history for the bridge's own database.
//!
//! Each step lives behind a dotted unit path under the `gigbridge.db`
//! namespace and is placed explicitly by index, so registration order does
//! not matter.

use std::sync::Mutex;

use gigbridge_common::{Error, Result};
use rusqlite::Connection;

use crate::database::Scheme;
use crate::registry;
use crate::upgrade::UpgradeStep;

/// Namespace holding the bridge's upgrade table in the registry directory.
pub const NAMESPACE: &str = "gigbridge.db";

/// Latest schema version the running code expects.
pub const LATEST_VERSION: usize = 6;

fn exec(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute(sql, [])
        .map(|_| ())
        .map_err(|e| Error::Database(format!("migration statement failed: {e}")))
}

static REGISTRATION: Mutex<()> = Mutex::new(());

/// Declares the `gigbridge.db` namespace and registers every step. Safe to
/// call from several places (the store and the CLI both do): the first call
/// populates the table, later ones see it declared and return.
pub fn register_migrations() -> Result<()> {
    let _guard = REGISTRATION
        .lock()
        .map_err(|_| Error::Database("migration registration lock poisoned".into()))?;
    if registry::resolve_owner(NAMESPACE).is_ok() {
        return Ok(());
    }
    registry::declare_namespace(NAMESPACE);
    registry::register_into_owner(
        "gigbridge.db.v01_initial_revision",
        Some(0),
        UpgradeStep::from_conn_only(upgrade_v1)
            .description("Initial revision")
            .no_transaction(),
    )?;
    registry::register_into_owner(
        "gigbridge.db.v02_multiple_reaction_per_message",
        Some(1),
        UpgradeStep::new(upgrade_v2).description("Multiple reactions per message"),
    )?;
    registry::register_into_owner(
        "gigbridge.db.v03_add_topic_to_portal",
        Some(2),
        UpgradeStep::from_conn_only(upgrade_v3).description("Add topic to portals"),
    )?;
    registry::register_into_owner(
        "gigbridge.db.v04_add_portal_meta_set",
        Some(3),
        UpgradeStep::from_conn_only(upgrade_v4)
            .description("Add name_set, avatar_set, and topic_set to portals"),
    )?;
    registry::register_into_owner(
        "gigbridge.db.v05_track_message_edits",
        Some(4),
        UpgradeStep::from_conn_only(upgrade_v5).description("Track gig message edits"),
    )?;
    registry::register_into_owner(
        "gigbridge.db.v06_add_space_mxid_to_user",
        Some(5),
        UpgradeStep::from_conn_only(upgrade_v6).description("Add space MXID to users"),
    )?;
    Ok(())
}

/// v1 runs outside a transaction: the original deployment targeted engines
/// that refuse multi-statement DDL inside one.
fn upgrade_v1(conn: &Connection) -> Result<Option<usize>> {
    exec(
        conn,
        r#"CREATE TABLE "user" (
            mxid            TEXT PRIMARY KEY,
            gig_member_urn  TEXT UNIQUE,
            cookie_jar      BLOB,
            notice_room     TEXT
        )"#,
    )?;
    exec(
        conn,
        "CREATE TABLE portal (
            gig_thread_urn      TEXT,
            gig_receiver_urn    TEXT,
            gig_is_group_chat   BOOLEAN NOT NULL DEFAULT false,
            gig_other_user_urn  TEXT,

            mxid                TEXT UNIQUE,
            encrypted           BOOLEAN NOT NULL DEFAULT false,

            name                TEXT,
            photo_id            TEXT,
            avatar_url          TEXT,

            PRIMARY KEY (gig_thread_urn, gig_receiver_urn)
        )",
    )?;
    exec(
        conn,
        "CREATE TABLE puppet (
            gig_member_urn  TEXT PRIMARY KEY,
            name            TEXT,
            photo_id        TEXT,
            photo_mxc       TEXT,

            name_set        BOOLEAN NOT NULL DEFAULT false,
            avatar_set      BOOLEAN NOT NULL DEFAULT false,
            is_registered   BOOLEAN NOT NULL DEFAULT false,

            custom_mxid     TEXT,
            access_token    TEXT,
            next_batch      TEXT,
            base_url        TEXT
        )",
    )?;
    exec(
        conn,
        r#"CREATE TABLE message (
            mxid                TEXT,
            mx_room             TEXT,
            gig_message_urn     TEXT,
            gig_thread_urn      TEXT,
            gig_sender_urn      TEXT,
            gig_receiver_urn    TEXT,
            "index"             INTEGER,
            timestamp           REAL,

            PRIMARY KEY (gig_message_urn, gig_receiver_urn, "index"),

            FOREIGN KEY (gig_thread_urn, gig_receiver_urn)
             REFERENCES portal (gig_thread_urn, gig_receiver_urn)
                     ON UPDATE CASCADE
                     ON DELETE CASCADE,

            UNIQUE (mxid, mx_room)
        )"#,
    )?;
    exec(
        conn,
        "CREATE TABLE reaction (
            mxid                TEXT,
            mx_room             TEXT,
            gig_message_urn     TEXT,
            gig_receiver_urn    TEXT,
            gig_sender_urn      TEXT,
            reaction            TEXT,

            PRIMARY KEY (gig_message_urn, gig_receiver_urn),

            UNIQUE (mxid, mx_room)
        )",
    )?;
    Ok(None)
}

/// v2 widens the reaction primary key so one sender can leave several
/// reactions on a message. SQLite cannot alter constraints in place, so it
/// gets a table rebuild; other engines swap the constraint directly.
fn upgrade_v2(conn: &Connection, scheme: Scheme) -> Result<Option<usize>> {
    if scheme != Scheme::Sqlite {
        exec(conn, "ALTER TABLE reaction DROP CONSTRAINT reaction_pkey")?;
        exec(
            conn,
            "ALTER TABLE reaction ADD PRIMARY KEY (
                gig_message_urn,
                gig_receiver_urn,
                gig_sender_urn,
                reaction
            )",
        )?;
    } else {
        exec(
            conn,
            "CREATE TABLE reaction_v2 (
                mxid                TEXT,
                mx_room             TEXT,
                gig_message_urn     TEXT,
                gig_receiver_urn    TEXT,
                gig_sender_urn      TEXT,
                reaction            TEXT,

                PRIMARY KEY (gig_message_urn, gig_receiver_urn, gig_sender_urn, reaction),

                UNIQUE (mxid, mx_room)
            )",
        )?;
        exec(
            conn,
            "INSERT INTO reaction_v2 (mxid, mx_room, gig_message_urn, gig_receiver_urn, reaction)
             SELECT mxid, mx_room, gig_message_urn, gig_receiver_urn, reaction FROM reaction",
        )?;
        exec(conn, "DROP TABLE reaction")?;
        exec(conn, "ALTER TABLE reaction_v2 RENAME TO reaction")?;
    }
    Ok(None)
}

fn upgrade_v3(conn: &Connection) -> Result<Option<usize>> {
    exec(conn, "ALTER TABLE portal ADD COLUMN topic TEXT")?;
    Ok(None)
}

fn upgrade_v4(conn: &Connection) -> Result<Option<usize>> {
    exec(
        conn,
        "ALTER TABLE portal ADD COLUMN name_set BOOLEAN NOT NULL DEFAULT false",
    )?;
    exec(
        conn,
        "ALTER TABLE portal ADD COLUMN avatar_set BOOLEAN NOT NULL DEFAULT false",
    )?;
    exec(
        conn,
        "ALTER TABLE portal ADD COLUMN topic_set BOOLEAN NOT NULL DEFAULT false",
    )?;
    exec(conn, "UPDATE portal SET name_set=true WHERE name<>''")?;
    // avatar_set and topic_set are left false so earlier incorrectly-set
    // avatars and never-stored topics get resent from the gig side.
    Ok(None)
}

fn upgrade_v5(conn: &Connection) -> Result<Option<usize>> {
    exec(conn, "ALTER TABLE message ADD COLUMN edit_timestamp REAL")?;
    Ok(None)
}

fn upgrade_v6(conn: &Connection) -> Result<Option<usize>> {
    exec(conn, r#"ALTER TABLE "user" ADD COLUMN space_mxid TEXT"#)?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_VERSION, NAMESPACE, register_migrations};
    use crate::database::Database;
    use crate::registry;

    fn table_columns(db: &Database, table: &str) -> Vec<String> {
        let conn = db.acquire().expect("lock should not be poisoned");
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("pragma should prepare");
        stmt.query_map([], |row| row.get::<_, String>(1))
            .expect("pragma should run")
            .collect::<std::result::Result<Vec<_>, _>>()
            .expect("columns should collect")
    }

    #[test]
    fn fresh_database_migrates_to_latest() {
        register_migrations().expect("registration should succeed");
        let db = Database::in_memory().expect("in-memory database should open");
        registry::upgrade(NAMESPACE, &db).expect("upgrade should succeed");

        let version: Option<i64> = db
            .fetch_optional("SELECT version FROM version LIMIT 1", [], |row| row.get(0))
            .expect("version query should succeed");
        assert_eq!(version, Some(LATEST_VERSION as i64));

        for table in ["user", "portal", "puppet", "message", "reaction"] {
            assert!(
                !table_columns(&db, table).is_empty(),
                "table {table} should exist"
            );
        }
    }

    #[test]
    fn later_steps_add_their_columns() {
        register_migrations().expect("registration should succeed");
        let db = Database::in_memory().expect("in-memory database should open");
        registry::upgrade(NAMESPACE, &db).expect("upgrade should succeed");

        let portal = table_columns(&db, "portal");
        assert!(portal.iter().any(|c| c == "topic"));
        assert!(portal.iter().any(|c| c == "name_set"));
        assert!(portal.iter().any(|c| c == "avatar_set"));
        assert!(portal.iter().any(|c| c == "topic_set"));

        let message = table_columns(&db, "message");
        assert!(message.iter().any(|c| c == "edit_timestamp"));

        let user = table_columns(&db, "user");
        assert!(user.iter().any(|c| c == "space_mxid"));

        // v2 rebuilt the reaction table with the sender in the key.
        let reaction = table_columns(&db, "reaction");
        assert!(reaction.iter().any(|c| c == "gig_sender_urn"));
    }

    #[test]
    fn rerunning_migrations_is_a_noop() {
        register_migrations().expect("registration should succeed");
        let db = Database::in_memory().expect("in-memory database should open");
        registry::upgrade(NAMESPACE, &db).expect("first upgrade should succeed");
        // ALTER TABLE would fail loudly if any step ran twice.
        registry::upgrade(NAMESPACE, &db).expect("second upgrade should be a no-op");
    }
}
