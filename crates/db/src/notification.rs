use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::notifications;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
