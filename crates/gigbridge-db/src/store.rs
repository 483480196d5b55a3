use std::path::Path;

use gigbridge_common::{Error, Result};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::migrations::{self, NAMESPACE};
use crate::registry;

/// A Matrix user logged in to the gig service through the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeUser {
    pub mxid: String,
    pub gig_member_urn: Option<String>,
    pub notice_room: Option<String>,
    pub space_mxid: Option<String>,
}

/// A Matrix room bridged to one gig conversation thread, as seen by one
/// receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portal {
    pub gig_thread_urn: String,
    pub gig_receiver_urn: String,
    pub gig_is_group_chat: bool,
    pub gig_other_user_urn: Option<String>,
    pub mxid: Option<String>,
    pub encrypted: bool,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub name_set: bool,
    pub topic_set: bool,
}

/// Mapping between one Matrix event and one gig message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub mxid: String,
    pub mx_room: String,
    pub gig_message_urn: String,
    pub gig_thread_urn: String,
    pub gig_sender_urn: String,
    pub gig_receiver_urn: String,
    pub index: i64,
    pub timestamp: f64,
}

/// Persistent store for bridge identity and room mappings.
///
/// Opening the store registers and runs all pending schema migrations; any
/// migration failure is surfaced before the store is handed out.
pub struct BridgeStore {
    db: Database,
}

impl BridgeStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::with_database(Database::open_path(db_path)?)
    }

    /// Opens from a database URI such as `sqlite:bridge.db`.
    pub fn open_uri(uri: &str) -> Result<Self> {
        Self::with_database(Database::open(uri)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_database(Database::in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self> {
        migrations::register_migrations()?;
        registry::upgrade(NAMESPACE, &db)?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn upsert_user(&self, user: &BridgeUser) -> Result<()> {
        let conn = self.db.acquire()?;
        conn.execute(
            r#"INSERT INTO "user" (mxid, gig_member_urn, notice_room, space_mxid)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (mxid) DO UPDATE SET
                   gig_member_urn=excluded.gig_member_urn,
                   notice_room=excluded.notice_room,
                   space_mxid=excluded.space_mxid"#,
            params![
                user.mxid,
                user.gig_member_urn,
                user.notice_room,
                user.space_mxid
            ],
        )
        .map(|_| ())
        .map_err(|e| Error::Database(format!("failed to upsert user: {e}")))
    }

    pub fn get_user(&self, mxid: &str) -> Result<Option<BridgeUser>> {
        self.db.fetch_optional(
            r#"SELECT mxid, gig_member_urn, notice_room, space_mxid FROM "user" WHERE mxid=?1"#,
            params![mxid],
            |row| {
                Ok(BridgeUser {
                    mxid: row.get(0)?,
                    gig_member_urn: row.get(1)?,
                    notice_room: row.get(2)?,
                    space_mxid: row.get(3)?,
                })
            },
        )
    }

    pub fn get_user_by_member_urn(&self, urn: &str) -> Result<Option<BridgeUser>> {
        self.db.fetch_optional(
            r#"SELECT mxid, gig_member_urn, notice_room, space_mxid
               FROM "user" WHERE gig_member_urn=?1"#,
            params![urn],
            |row| {
                Ok(BridgeUser {
                    mxid: row.get(0)?,
                    gig_member_urn: row.get(1)?,
                    notice_room: row.get(2)?,
                    space_mxid: row.get(3)?,
                })
            },
        )
    }

    pub fn upsert_portal(&self, portal: &Portal) -> Result<()> {
        let conn = self.db.acquire()?;
        conn.execute(
                "INSERT INTO portal (
                    gig_thread_urn, gig_receiver_urn, gig_is_group_chat, gig_other_user_urn,
                    mxid, encrypted, name, topic, name_set, topic_set
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (gig_thread_urn, gig_receiver_urn) DO UPDATE SET
                    gig_is_group_chat=excluded.gig_is_group_chat,
                    gig_other_user_urn=excluded.gig_other_user_urn,
                    mxid=excluded.mxid,
                    encrypted=excluded.encrypted,
                    name=excluded.name,
                    topic=excluded.topic,
                    name_set=excluded.name_set,
                    topic_set=excluded.topic_set",
                params![
                    portal.gig_thread_urn,
                    portal.gig_receiver_urn,
                    portal.gig_is_group_chat,
                    portal.gig_other_user_urn,
                    portal.mxid,
                    portal.encrypted,
                    portal.name,
                    portal.topic,
                    portal.name_set,
                    portal.topic_set,
                ],
            )
            .map(|_| ())
            .map_err(|e| Error::Database(format!("failed to upsert portal: {e}")))
    }

    pub fn get_portal(&self, thread_urn: &str, receiver_urn: &str) -> Result<Option<Portal>> {
        self.db.fetch_optional(
            "SELECT gig_thread_urn, gig_receiver_urn, gig_is_group_chat, gig_other_user_urn,
                    mxid, encrypted, name, topic, name_set, topic_set
             FROM portal WHERE gig_thread_urn=?1 AND gig_receiver_urn=?2",
            params![thread_urn, receiver_urn],
            map_portal,
        )
    }

    pub fn get_portal_by_mxid(&self, mxid: &str) -> Result<Option<Portal>> {
        self.db.fetch_optional(
            "SELECT gig_thread_urn, gig_receiver_urn, gig_is_group_chat, gig_other_user_urn,
                    mxid, encrypted, name, topic, name_set, topic_set
             FROM portal WHERE mxid=?1",
            params![mxid],
            map_portal,
        )
    }

    pub fn insert_message(&self, message: &MessageRecord) -> Result<()> {
        let conn = self.db.acquire()?;
        conn.execute(
                r#"INSERT INTO message (
                    mxid, mx_room, gig_message_urn, gig_thread_urn,
                    gig_sender_urn, gig_receiver_urn, "index", timestamp
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    message.mxid,
                    message.mx_room,
                    message.gig_message_urn,
                    message.gig_thread_urn,
                    message.gig_sender_urn,
                    message.gig_receiver_urn,
                    message.index,
                    message.timestamp,
                ],
            )
            .map(|_| ())
            .map_err(|e| Error::Database(format!("failed to insert message: {e}")))
    }

    pub fn get_message_by_mxid(&self, mxid: &str, mx_room: &str) -> Result<Option<MessageRecord>> {
        self.db.fetch_optional(
            r#"SELECT mxid, mx_room, gig_message_urn, gig_thread_urn,
                      gig_sender_urn, gig_receiver_urn, "index", timestamp
               FROM message WHERE mxid=?1 AND mx_room=?2"#,
            params![mxid, mx_room],
            |row| {
                Ok(MessageRecord {
                    mxid: row.get(0)?,
                    mx_room: row.get(1)?,
                    gig_message_urn: row.get(2)?,
                    gig_thread_urn: row.get(3)?,
                    gig_sender_urn: row.get(4)?,
                    gig_receiver_urn: row.get(5)?,
                    index: row.get(6)?,
                    timestamp: row.get(7)?,
                })
            },
        )
    }

    pub fn delete_messages_in_thread(
        &self,
        thread_urn: &str,
        receiver_urn: &str,
    ) -> Result<usize> {
        self.db.execute(
            "DELETE FROM message WHERE gig_thread_urn=?1 AND gig_receiver_urn=?2",
            params![thread_urn, receiver_urn],
        )
    }

    pub fn mark_message_edited(&self, mxid: &str, mx_room: &str, timestamp: f64) -> Result<()> {
        let conn = self.db.acquire()?;
        let updated = conn
            .execute(
                "UPDATE message SET edit_timestamp=?3 WHERE mxid=?1 AND mx_room=?2",
                params![mxid, mx_room, timestamp],
            )
            .map_err(|e| Error::Database(format!("failed to record edit: {e}")))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("message {mxid} in {mx_room}")));
        }
        Ok(())
    }

    pub fn last_edit_timestamp(&self, mxid: &str, mx_room: &str) -> Result<Option<f64>> {
        let conn = self.db.acquire()?;
        conn.query_row(
            "SELECT edit_timestamp FROM message WHERE mxid=?1 AND mx_room=?2",
            params![mxid, mx_room],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to read edit timestamp: {e}")))
        .map(Option::flatten)
    }
}

fn map_portal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Portal> {
    Ok(Portal {
        gig_thread_urn: row.get(0)?,
        gig_receiver_urn: row.get(1)?,
        gig_is_group_chat: row.get(2)?,
        gig_other_user_urn: row.get(3)?,
        mxid: row.get(4)?,
        encrypted: row.get(5)?,
        name: row.get(6)?,
        topic: row.get(7)?,
        name_set: row.get(8)?,
        topic_set: row.get(9)?,
    })
}
