use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fitlink_types::models::{DirectMessage, NewDirectMessage, NewNotification, ReadReceipt};

use crate::models::{MessageRow, NotificationRow};
use crate::Database;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, receiver_id, content, media_url, media_type, is_read, read_at, created_at";

impl Database {
    // -- Direct messages --

    /// Store a new unread message. Id and timestamp are assigned here so the
    /// returned value is the canonical stored copy.
    pub fn insert_direct_message(&self, new: &NewDirectMessage) -> Result<DirectMessage> {
        let message = DirectMessage {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id.clone(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content.clone(),
            media_url: new.media_url.clone(),
            media_type: new.media_type,
            is_read: false,
            read_at: None,
            created_at: now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO direct_messages (id, conversation_id, sender_id, receiver_id, content, media_url, media_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id,
                    message.sender_id.to_string(),
                    message.receiver_id.to_string(),
                    message.content,
                    message.media_url,
                    message.media_type.map(|m| m.as_str()),
                    timestamp(&message.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(message)
    }

    /// Mark a message read on behalf of its receiver.
    ///
    /// Returns `None` when no message with that id is addressed to `reader_id`.
    /// An already-read message keeps its first read timestamp.
    pub fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<Option<ReadReceipt>> {
        self.with_conn(|conn| {
            let existing: Option<(String, bool, Option<String>)> = conn
                .query_row(
                    "SELECT sender_id, is_read, read_at FROM direct_messages WHERE id = ?1 AND receiver_id = ?2",
                    rusqlite::params![message_id.to_string(), reader_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((sender_id, is_read, read_at)) = existing else {
                return Ok(None);
            };
            let sender_id: Uuid = sender_id.parse().context("corrupt sender_id")?;

            if is_read {
                let read_at = match read_at {
                    Some(ts) => parse_timestamp(&ts)?,
                    None => now(),
                };
                return Ok(Some(ReadReceipt {
                    message_id,
                    sender_id,
                    read_at,
                    newly_read: false,
                }));
            }

            let read_at = now();
            conn.execute(
                "UPDATE direct_messages SET is_read = 1, read_at = ?1 WHERE id = ?2",
                rusqlite::params![timestamp(&read_at), message_id.to_string()],
            )?;

            Ok(Some(ReadReceipt {
                message_id,
                sender_id,
                read_at,
                newly_read: true,
            }))
        })
    }

    pub fn get_direct_message(&self, message_id: Uuid) -> Result<Option<DirectMessage>> {
        let row = self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM direct_messages WHERE id = ?1", MESSAGE_COLUMNS);
            conn.query_row(&sql, [message_id.to_string()], message_row).optional()
        })?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Newest-first page of a conversation, optionally strictly older than `before`.
    pub fn get_conversation(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<DirectMessage>> {
        let rows = self.with_conn(|conn| query_conversation(conn, conversation_id, limit, before))?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    pub fn count_unread(&self, receiver_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM direct_messages WHERE receiver_id = ?1 AND is_read = 0",
                [receiver_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, notification: &NewNotification) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, title, message, from_user_id, link, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    notification.user_id.to_string(),
                    notification.kind.as_str(),
                    notification.title,
                    notification.message,
                    notification.from_user_id.map(|u| u.to_string()),
                    notification.link,
                    timestamp(&now()),
                ],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn get_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, title, message, from_user_id, link, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        title: row.get(3)?,
                        message: row.get(4)?,
                        from_user_id: row.get(5)?,
                        link: row.get(6)?,
                        is_read: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_conversation(
    conn: &Connection,
    conversation_id: &str,
    limit: u32,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<MessageRow>> {
    let rows = match before {
        Some(before) => {
            let sql = format!(
                "SELECT {} FROM direct_messages
                 WHERE conversation_id = ?1 AND created_at < ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(
                rusqlite::params![conversation_id, timestamp(&before), limit],
                message_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {} FROM direct_messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(rusqlite::params![conversation_id, limit], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        media_type: row.get(6)?,
        is_read: row.get(7)?,
        read_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl MessageRow {
    fn into_message(self) -> Result<DirectMessage> {
        Ok(DirectMessage {
            id: self.id.parse().with_context(|| format!("corrupt message id '{}'", self.id))?,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id.parse().context("corrupt sender_id")?,
            receiver_id: self.receiver_id.parse().context("corrupt receiver_id")?,
            content: self.content,
            media_url: self.media_url,
            media_type: self
                .media_type
                .map(|m| m.parse().map_err(anyhow::Error::msg))
                .transpose()?,
            is_read: self.is_read,
            read_at: self.read_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Current time at the precision timestamps are stored with, so values
/// handed back to callers compare equal to what a later read returns.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so text ordering in SQLite matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?
        .with_timezone(&Utc))
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
