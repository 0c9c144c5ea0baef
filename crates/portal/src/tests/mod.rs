//! Tests that drive the whole application through Rocket's local client.
//! Each test gets a fresh database and upload directory, and payments go
//! through an in-memory gateway the test can inspect.

use std::sync::Arc;

use chrono::{Days, Utc};
use db::{event::Event, schema::events, schema::users, user::User};
use diesel::prelude::*;
use diesel::SqliteConnection;
use payments::OfflineGateway;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde::Serialize;
use tempfile::TempDir;

use crate::{
    admin::{events::EventForm, setup::SetupForm},
    auth::{login::PasswordLoginForm, register::RegisterForm},
    config::Gateway,
    make_rocket_with, portal_figment,
    util::DATETIME_LOCAL,
};

mod admin;
mod payments_flow;
mod registration;
mod teams;

pub const PASSWORD: &str = "correct horse battery";
pub const GATEWAY_SECRET: &str = "test-signing-secret";

/// A dispatched response, read out in full so that it does not keep the
/// client borrowed.
pub struct Reply {
    status: Status,
    location: Option<String>,
    content_type: Option<ContentType>,
    body: Option<String>,
}

impl Reply {
    fn read(response: LocalResponse<'_>) -> Reply {
        Reply {
            status: response.status(),
            location: response
                .headers()
                .get_one("Location")
                .map(str::to_string),
            content_type: response.content_type(),
            body: response.into_string(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type.clone()
    }

    pub fn into_string(self) -> Option<String> {
        self.body
    }
}

pub struct TestPortal {
    pub client: Client,
    pub conn: SqliteConnection,
    pub gateway: Arc<OfflineGateway>,
    _dir: TempDir,
}

pub fn test_portal() -> TestPortal {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("portal.db");
    let db_path = db_path.to_str().unwrap().to_string();

    let figment = portal_figment(&db_path)
        .merge(("databases.database.url", db_path.clone()))
        .merge(("portal.base_url", "http://localhost"))
        .merge((
            "portal.upload_dir",
            dir.path().join("uploads").to_str().unwrap().to_string(),
        ));

    let gateway = Arc::new(OfflineGateway::new(GATEWAY_SECRET));
    let client = Client::tracked(make_rocket_with(
        figment,
        Some(gateway.clone() as Gateway),
    ))
    .unwrap();

    // migrations have run by the time the client exists
    let conn = SqliteConnection::establish(&db_path).unwrap();

    TestPortal {
        client,
        conn,
        gateway,
        _dir: dir,
    }
}

impl TestPortal {
    pub fn post_form<T: Serialize>(
        &self,
        uri: impl ToString,
        form: &T,
    ) -> Reply {
        Reply::read(
            self.client
                .post(uri.to_string())
                .header(ContentType::Form)
                .body(serde_urlencoded::to_string(form).unwrap())
                .dispatch(),
        )
    }

    pub fn post(&self, uri: impl ToString) -> Reply {
        Reply::read(self.client.post(uri.to_string()).dispatch())
    }

    pub fn get(&self, uri: impl ToString) -> Reply {
        Reply::read(self.client.get(uri.to_string()).dispatch())
    }

    /// Signs up a participant, who is left logged in.
    pub fn register(&mut self, name: &str) -> User {
        let email = format!("{}@example.edu", name.to_lowercase());
        let response = self.post_form(
            "/register",
            &RegisterForm {
                username: name.to_string(),
                email: email.clone(),
                password: PASSWORD.to_string(),
                password2: PASSWORD.to_string(),
                phone: Some("+91 98765 43210".to_string()),
                college: Some("Engineering".to_string()),
            },
        );
        assert_eq!(response.status(), Status::SeeOther);
        self.user(&email)
    }

    /// The page a redirect leads to, with the flashed message rendered on it.
    pub fn follow(&self, reply: &Reply) -> String {
        let to = reply.location().expect("a redirect");
        self.get(to).into_string().unwrap()
    }

    pub fn login(&self, user: &User) {
        let response = self.post_form(
            "/login",
            &PasswordLoginForm {
                email: user.email.clone(),
                password: PASSWORD.to_string(),
            },
        );
        assert_eq!(response.status(), Status::SeeOther);
    }

    pub fn logout(&self) {
        self.get("/logout");
    }

    pub fn user(&mut self, email: &str) -> User {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut self.conn)
            .unwrap()
    }

    /// Creates the first administrator, who is left logged in.
    pub fn setup_admin(&mut self) -> User {
        let response = self.post_form(
            "/admin/setup",
            &SetupForm {
                username: "Organiser".to_string(),
                email: "organiser@example.edu".to_string(),
                password: PASSWORD.to_string(),
                password2: PASSWORD.to_string(),
            },
        );
        assert_eq!(response.status(), Status::SeeOther);
        self.user("organiser@example.edu")
    }

    /// Creates an event as the logged in administrator. `fee` is in major
    /// units.
    pub fn create_event(
        &mut self,
        name: &str,
        fee: &str,
        team_sizes: (i64, i64),
    ) -> Event {
        let starts = Utc::now()
            .checked_add_days(Days::new(7))
            .unwrap()
            .naive_utc();
        let ends = starts.checked_add_days(Days::new(1)).unwrap();
        let response = self.post_form(
            "/admin/events/new",
            &EventForm {
                name: name.to_string(),
                description: format!("All about {name}."),
                venue: Some("Main auditorium".to_string()),
                starts_at: starts.format(DATETIME_LOCAL).to_string(),
                ends_at: ends.format(DATETIME_LOCAL).to_string(),
                fee: fee.to_string(),
                min_team_size: team_sizes.0,
                max_team_size: team_sizes.1,
                registrations_open: true,
            },
        );
        assert_eq!(response.status(), Status::SeeOther);
        events::table
            .filter(events::name.eq(name))
            .select(Event::as_select())
            .first(&mut self.conn)
            .unwrap()
    }
}

#[test]
fn pages_render() {
    let mut portal = test_portal();
    assert_eq!(portal.get("/").status(), Status::Ok);
    assert_eq!(portal.get("/events").status(), Status::Ok);
    assert_eq!(portal.get("/ideas").status(), Status::Ok);
    assert_eq!(portal.get("/login").status(), Status::Ok);
    assert_eq!(portal.get("/register").status(), Status::Ok);
    assert_eq!(portal.get("/no/such/page").status(), Status::NotFound);

    portal.setup_admin();
    let event = portal.create_event("Quiz", "0", (1, 1));
    let page = portal.get(format!("/events/{}", event.public_id));
    assert_eq!(page.status(), Status::Ok);
    assert!(page.into_string().unwrap().contains("Quiz"));
    for admin_page in [
        "/admin",
        "/admin/events",
        "/admin/users",
        "/admin/ideas",
        "/admin/promotions",
        "/admin/images",
        "/admin/attendance",
        "/admin/notify",
        "/admin/payments",
        "/admin/settings",
    ] {
        assert_eq!(portal.get(admin_page).status(), Status::Ok, "{admin_page}");
    }
}

#[test]
fn gateway_mode_without_keys_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("portal.db");
    let db_path = db_path.to_str().unwrap().to_string();
    let figment = portal_figment(&db_path)
        .merge(("databases.database.url", db_path.clone()))
        .merge((
            "portal.upload_dir",
            dir.path().join("uploads").to_str().unwrap().to_string(),
        ))
        .merge(("portal.payments.mode", "gateway"))
        .merge(("portal.payments.key_id", "rzp_live_key"));

    assert!(Client::tracked(make_rocket_with(figment, None)).is_err());
}
