use chrono::NaiveDateTime;
use diesel::{
    dsl::auto_type, prelude::*, sql_types::Bool, sqlite::Sqlite,
    BoxableExpression,
};
use serde::Serialize;

use crate::schema::{team_join_requests, team_members, teams};

/// Length of a team's join code.
pub const JOIN_CODE_LEN: usize = 6;

/// Characters join codes are drawn from. Letters and digits that are easily
/// confused when read aloud or copied (`0`/`O`, `1`/`I`/`L`) are left out.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq, Eq)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub name: String,
    pub join_code: String,
    pub is_locked: bool,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
}

impl Team {
    pub fn with_join_code<'a>(
        code: &'a str,
    ) -> Box<dyn BoxableExpression<teams::table, Sqlite, SqlType = Bool> + 'a>
    {
        Box::new(teams::join_code.eq(code))
    }

    pub fn validate_name(name: &str) -> bool {
        let n = name.trim().chars().count();
        (3..=40).contains(&n) && !name.chars().any(|c| c.is_control())
    }

    /// Join codes are stored upper case; users may type them in any case and
    /// with surrounding whitespace.
    pub fn normalize_join_code(code: &str) -> Option<String> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() == JOIN_CODE_LEN
            && code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b))
        {
            Some(code)
        } else {
            None
        }
    }

    pub fn is_led_by(&self, user_id: i64) -> bool {
        self.created_by == user_id
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = team_members)]
pub struct TeamMember {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub joined_at: NaiveDateTime,
}

impl TeamMember {
    #[auto_type(no_type_alias)]
    pub fn of_user_in_event(user_id: i64, event_id: i64) -> _ {
        team_members::user_id
            .eq(user_id)
            .and(team_members::event_id.eq(event_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Accepted => "accepted",
            JoinRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JoinRequestStatus::Pending),
            "accepted" => Some(JoinRequestStatus::Accepted),
            "rejected" => Some(JoinRequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = team_join_requests)]
pub struct TeamJoinRequest {
    pub id: i64,
    pub public_id: String,
    pub team_id: i64,
    pub user_id: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl TeamJoinRequest {
    pub fn status(&self) -> Option<JoinRequestStatus> {
        JoinRequestStatus::parse(&self.status)
    }

    pub fn pending() -> diesel::dsl::Eq<team_join_requests::status, &'static str>
    {
        team_join_requests::status.eq(JoinRequestStatus::Pending.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Team, JOIN_CODE_ALPHABET};

    #[test]
    fn join_codes_are_normalized() {
        assert_eq!(
            Team::normalize_join_code(" abc234 "),
            Some("ABC234".to_string())
        );
        // ambiguous characters are never issued
        assert_eq!(Team::normalize_join_code("ABCD10"), None);
        assert_eq!(Team::normalize_join_code("ABC23"), None);
        assert!(!JOIN_CODE_ALPHABET.contains(&b'O'));
    }

    #[test]
    fn team_names() {
        assert!(Team::validate_name("Byte Me"));
        assert!(!Team::validate_name("ab"));
        assert!(!Team::validate_name("tab\tname"));
    }
}
