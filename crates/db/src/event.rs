use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::events;

/// Highest fee per participant an event may charge, in minor units.
pub const MAX_FEE: i64 = 1_000_000_000;

#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq, Eq)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub description: String,
    pub venue: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    /// In minor currency units (e.g. paise). Zero means the event is free.
    pub fee: i64,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub registrations_open: bool,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn is_free(&self) -> bool {
        self.fee == 0
    }

    pub fn is_team_event(&self) -> bool {
        self.max_team_size > 1
    }

    pub fn team_size_ok(&self, size: i64) -> bool {
        (self.min_team_size..=self.max_team_size).contains(&size)
    }

    /// What a team of `size` owes, or `None` if it does not fit in an `i64`.
    pub fn team_fee(&self, size: i64) -> Option<i64> {
        self.fee.checked_mul(size)
    }

    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        self.starts_at <= now
    }

    /// Human readable team size, e.g. "Individual" or "2-4 members".
    pub fn team_size_label(&self) -> String {
        if !self.is_team_event() {
            "Individual".to_string()
        } else if self.min_team_size == self.max_team_size {
            format!("{} members", self.max_team_size)
        } else {
            format!("{}-{} members", self.min_team_size, self.max_team_size)
        }
    }
}

/// Renders an amount in minor units as a decimal string, e.g. `15050` as
/// `150.50`.
pub fn format_amount(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, (amount % 100).abs())
}

/// Parses a decimal amount entered by an administrator (`"150"`, `"150.5"`,
/// `"150.50"`) into minor units.
pub fn parse_amount(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Some(0);
    }
    let (whole, frac) = match input.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (input, ""),
    };
    if whole.is_empty()
        || frac.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}
