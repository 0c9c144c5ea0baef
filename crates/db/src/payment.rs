use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::payment_orders;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Created,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OrderStatus::Created),
            "paid" => Some(OrderStatus::Paid),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

/// An order created with the payment gateway, together with what it pays
/// for: one participant's registration or (with `team_id`) a whole team's.
#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = payment_orders)]
pub struct PaymentOrder {
    pub id: i64,
    pub public_id: String,
    pub gateway_order_id: String,
    pub receipt: String,
    pub user_id: i64,
    pub event_id: i64,
    pub team_id: Option<i64>,
    pub amount: i64,
    pub status: String,
    pub gateway_payment_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl PaymentOrder {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }
}
