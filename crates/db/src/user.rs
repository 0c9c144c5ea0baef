use std::fmt;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::{
    http::{Cookie, CookieJar, Status},
    outcome::try_outcome,
    request::{self, FromRequest},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::{schema::users, DbConn};

pub const LOGIN_COOKIE: &str = "portal_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "participant" => Some(Role::Participant),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub role: String,
    pub created_at: NaiveDateTime,
}

type WithPublicId<'a> = diesel::dsl::Eq<users::public_id, &'a str>;
type WithEmail<'a> = diesel::dsl::Eq<users::email, &'a str>;

impl User {
    pub fn with_public_id(pid: &str) -> WithPublicId<'_> {
        users::public_id.eq(pid)
    }

    pub fn with_email(email: &str) -> WithEmail<'_> {
        users::email.eq(email)
    }

    /// Rows with an unknown role are treated as participants.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Participant)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    /// Display names: 2 to 64 characters, letters, digits, spaces and a few
    /// punctuation marks commonly found in names.
    pub fn validate_username(name: &str) -> bool {
        let trimmed = name.trim();
        let n = trimmed.chars().count();
        (2..=64).contains(&n)
            && trimmed.chars().all(|c| {
                c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '\'' | '_')
            })
    }

    pub fn validate_email(email: &str) -> bool {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
            )
            .expect("email regex is valid")
        });
        RE.is_match(email)
    }

    pub fn validate_password(password: &str) -> bool {
        password.chars().count() >= 8
    }

    /// Phone numbers may contain digits, spaces, dashes and a leading `+`.
    pub fn validate_phone(phone: &str) -> bool {
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        (7..=15).contains(&digits)
            && phone.chars().enumerate().all(|(i, c)| {
                c.is_ascii_digit() || c == ' ' || c == '-' || (i == 0 && c == '+')
            })
    }
}

#[derive(Debug)]
pub enum AuthError {
    NoDatabase,
    Unauthorized,
    NotAnAdmin,
}

#[derive(Serialize, Deserialize)]
pub struct LoginSession {
    id: i64,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AuthError;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, AuthError> {
        // several guards may ask for the user on one request
        let cached = request
            .local_cache_async(async { load_user(request).await })
            .await;

        match cached {
            Ok(user) => request::Outcome::Success(user.clone()),
            Err(status) => {
                let error = if *status == Status::InternalServerError {
                    AuthError::NoDatabase
                } else {
                    AuthError::Unauthorized
                };
                request::Outcome::Error((*status, error))
            }
        }
    }
}

async fn load_user(request: &Request<'_>) -> Result<User, Status> {
    let login_cookie = request
        .cookies()
        .get_private(LOGIN_COOKIE)
        .ok_or(Status::Unauthorized)?;

    let login: LoginSession = match serde_json::from_str(login_cookie.value())
    {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed login cookie");
            // a malformed cookie would otherwise stop the user from logging
            // in again
            request.cookies().remove_private(LOGIN_COOKIE);
            return Err(Status::Unauthorized);
        }
    };

    let db = match request.guard::<DbConn>().await {
        request::Outcome::Success(db) => db,
        _ => return Err(Status::InternalServerError),
    };

    let user = db
        .run(move |conn| {
            users::table
                .filter(users::id.eq(login.id))
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await;

    match user {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            request.cookies().remove_private(LOGIN_COOKIE);
            Err(Status::Unauthorized)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load logged in user");
            Err(Status::InternalServerError)
        }
    }
}

/// A logged-in user whose role is `admin`.
#[derive(Debug, Clone)]
pub struct Admin(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = AuthError;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, AuthError> {
        let user = try_outcome!(request.guard::<User>().await);
        if user.is_admin() {
            request::Outcome::Success(Admin(user))
        } else {
            tracing::info!(user_id = user.id, "non-admin denied admin route");
            request::Outcome::Error((Status::Forbidden, AuthError::NotAnAdmin))
        }
    }
}

pub fn set_login_cookie(id: i64, jar: &CookieJar) {
    let session = serde_json::to_string(&LoginSession { id })
        .expect("login sessions always serialize");
    jar.add_private(Cookie::new(LOGIN_COOKIE, session));
}

pub fn remove_login_cookie(jar: &CookieJar) {
    jar.remove_private(LOGIN_COOKIE);
}

#[cfg(test)]
mod tests {
    use super::{Role, User};

    #[test]
    fn usernames() {
        assert!(User::validate_username("Asha Rao"));
        assert!(User::validate_username("O'Neil-Smith"));
        assert!(!User::validate_username("a"));
        assert!(!User::validate_username("<script>"));
    }

    #[test]
    fn emails() {
        assert!(User::validate_email("student@college.edu"));
        assert!(!User::validate_email("student@"));
        assert!(!User::validate_email("no at sign"));
    }

    #[test]
    fn phones() {
        assert!(User::validate_phone("+91 98765-43210"));
        assert!(!User::validate_phone("12ab"));
        assert!(!User::validate_phone("98+765"));
    }

    #[test]
    fn roles_round_trip_through_their_column_value() {
        for role in [Role::Participant, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
