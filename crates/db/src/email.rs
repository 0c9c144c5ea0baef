use diesel::prelude::Queryable;
use serde::Serialize;

#[derive(Debug, Queryable, Serialize, Clone, PartialEq, Eq)]
pub struct EmailRow {
    pub id: i64,
    pub message_id: String,
    pub recipients: String,
    pub created_at: chrono::NaiveDateTime,
}
