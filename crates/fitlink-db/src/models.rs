/// Database row types, mapped straight from SQLite columns.
/// Kept apart from fitlink-types so the storage layer owns its own encoding.

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub from_user_id: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}
