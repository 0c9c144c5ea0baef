use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::ideas;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdeaStatus {
    Pending,
    Approved,
    Rejected,
}

impl IdeaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaStatus::Pending => "pending",
            IdeaStatus::Approved => "approved",
            IdeaStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IdeaStatus::Pending),
            "approved" => Some(IdeaStatus::Approved),
            "rejected" => Some(IdeaStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = ideas)]
pub struct Idea {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub submitted_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl Idea {
    pub fn status(&self) -> Option<IdeaStatus> {
        IdeaStatus::parse(&self.status)
    }

    pub fn validate_title(title: &str) -> bool {
        (3..=120).contains(&title.trim().chars().count())
    }

    pub fn validate_description(description: &str) -> bool {
        let n = description.trim().chars().count();
        n > 0 && n <= 4000
    }
}
