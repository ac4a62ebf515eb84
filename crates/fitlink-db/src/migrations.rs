use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS direct_messages (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL,
            sender_id        TEXT NOT NULL,
            receiver_id      TEXT NOT NULL,
            content          TEXT NOT NULL,
            media_url        TEXT,
            media_type       TEXT,
            is_read          INTEGER NOT NULL DEFAULT 0,
            read_at          TEXT,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_direct_messages_conversation
            ON direct_messages(conversation_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_direct_messages_unread
            ON direct_messages(receiver_id, is_read);

        CREATE TABLE IF NOT EXISTS notifications (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            kind          TEXT NOT NULL,
            title         TEXT NOT NULL,
            message       TEXT NOT NULL,
            from_user_id  TEXT,
            link          TEXT,
            is_read       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
