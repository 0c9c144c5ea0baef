use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::participations;

/// How a participation was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    /// The event has no fee.
    Free,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Free => "free",
            PaymentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = participations)]
pub struct Participation {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub event_id: i64,
    pub team_id: Option<i64>,
    pub qr_payload: Option<String>,
    pub payment_ref: Option<String>,
    pub payment_status: String,
    pub attended: bool,
    pub created_at: NaiveDateTime,
}

impl Participation {
    #[diesel::dsl::auto_type(no_type_alias)]
    pub fn of_user_in_event(user_id: i64, event_id: i64) -> _ {
        participations::user_id
            .eq(user_id)
            .and(participations::event_id.eq(event_id))
    }
}
