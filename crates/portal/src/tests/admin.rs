use db::{
    idea::Idea,
    participation::Participation,
    schema::{events, ideas, notifications, participations, users},
    settings::SiteSettings,
    user::Role,
};
use diesel::prelude::*;
use rocket::http::{ContentType, Status};

use super::{test_portal, PASSWORD};
use crate::{
    admin::{
        attendance::ScanForm, ideas::IdeaStatusForm, notify::BroadcastForm,
        settings::SettingsForm, users::RoleForm,
    },
    auth::register::RegisterForm,
    ideas::IdeaForm,
};

#[test]
fn roles() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let asha = portal.register("Asha");
    portal.logout();
    portal.login(&admin);

    let response = portal.post_form(
        format!("/admin/users/{}/role", asha.public_id),
        &RoleForm {
            role: "admin".to_string(),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(portal.user(&asha.email).role(), Role::Admin);

    // nobody can demote themselves
    portal.post_form(
        format!("/admin/users/{}/role", admin.public_id),
        &RoleForm {
            role: "participant".to_string(),
        },
    );
    assert_eq!(portal.user(&admin.email).role(), Role::Admin);

    let told: i64 = notifications::table
        .filter(notifications::user_id.eq(asha.id))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(told, 1);
}

#[test]
fn attendance_desk() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    let asha = portal.register("Asha");
    portal.post(format!("/events/{}/register", quiz.public_id));
    let pass = participations::table
        .filter(participations::user_id.eq(asha.id))
        .select(Participation::as_select())
        .first(&mut portal.conn)
        .unwrap();

    // participants cannot check themselves in
    let response = portal.post_form(
        "/admin/attendance",
        &ScanForm {
            payload: pass.qr_payload.clone().unwrap(),
        },
    );
    assert_eq!(response.status(), Status::Forbidden);

    portal.logout();
    portal.login(&admin);
    let response = portal.post_form(
        "/admin/attendance",
        &ScanForm {
            // some scanners report the tag in lower case
            payload: format!("pass:{}\n", pass.public_id),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let attended = participations::table
        .find(pass.id)
        .select(participations::attended)
        .first::<bool>(&mut portal.conn)
        .unwrap();
    assert!(attended);

    // the participant list toggles it back
    portal.post(format!("/admin/participations/{}/attendance", pass.public_id));
    let attended = participations::table
        .find(pass.id)
        .select(participations::attended)
        .first::<bool>(&mut portal.conn)
        .unwrap();
    assert!(!attended);

    let page = portal.get(format!("/admin/events/{}/participants", quiz.public_id));
    assert_eq!(page.status(), Status::Ok);
    assert!(page.into_string().unwrap().contains("asha@example.edu"));

    let csv = portal.get(format!("/admin/events/{}/participants.csv", quiz.public_id));
    assert_eq!(csv.status(), Status::Ok);
    assert_eq!(csv.content_type(), Some(ContentType::CSV));
    let csv = csv.into_string().unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("name,email,phone"));
    assert!(lines.next().unwrap().starts_with("Asha,asha@example.edu,"));
    assert_eq!(lines.next(), None);
}

#[test]
fn ideas_are_published_after_review() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    portal.register("Ravi");
    let response = portal.post_form(
        "/ideas",
        &IdeaForm {
            title: "Night hackathon".to_string(),
            description: "Twelve hours, free coffee.".to_string(),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let idea = ideas::table
        .select(Idea::as_select())
        .first(&mut portal.conn)
        .unwrap();
    assert_eq!(idea.status, "pending");

    portal.logout();
    assert!(!portal
        .get("/ideas")
        .into_string()
        .unwrap()
        .contains("Night hackathon"));

    portal.login(&admin);
    portal.post_form(
        format!("/admin/ideas/{}/status", idea.public_id),
        &IdeaStatusForm {
            status: "approved".to_string(),
        },
    );
    assert!(portal
        .get("/ideas")
        .into_string()
        .unwrap()
        .contains("Night hackathon"));

    portal.post(format!("/admin/ideas/{}/delete", idea.public_id));
    let left: i64 = ideas::table.count().get_result(&mut portal.conn).unwrap();
    assert_eq!(left, 0);
}

#[test]
fn broadcasts_reach_the_audience() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    let asha = portal.register("Asha");
    portal.post(format!("/events/{}/register", quiz.public_id));
    portal.logout();
    let ravi = portal.register("Ravi");
    portal.logout();
    portal.login(&admin);

    portal.post_form(
        "/admin/notify",
        &BroadcastForm {
            audience: quiz.public_id.clone(),
            message: "The quiz starts at ten.".to_string(),
        },
    );
    portal.post_form(
        "/admin/notify",
        &BroadcastForm {
            audience: "all".to_string(),
            message: "Welcome to the fest!".to_string(),
        },
    );

    let mut received = |user_id: i64| -> Vec<String> {
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order_by(notifications::id.asc())
            .select(notifications::message)
            .load(&mut portal.conn)
            .unwrap()
    };
    let to_asha = received(asha.id);
    assert!(to_asha.contains(&"The quiz starts at ten.".to_string()));
    assert!(to_asha.contains(&"Welcome to the fest!".to_string()));
    assert_eq!(received(ravi.id), vec!["Welcome to the fest!".to_string()]);
}

#[test]
fn closing_registrations_stops_sign_ups() {
    let mut portal = test_portal();
    portal.setup_admin();
    let response = portal.post_form(
        "/admin/settings",
        &SettingsForm {
            site_title: "Tech Fest".to_string(),
            announcement: Some("See you in March.".to_string()),
            contact_email: Some("Fest@Example.edu".to_string()),
            registrations_enabled: false,
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let settings = SiteSettings::load(&mut portal.conn).unwrap();
    assert_eq!(settings.site_title, "Tech Fest");
    assert_eq!(settings.contact_email.as_deref(), Some("fest@example.edu"));
    assert!(!settings.registrations_enabled);
    assert!(portal.get("/").into_string().unwrap().contains("See you in March."));

    portal.logout();
    portal.post_form(
        "/register",
        &RegisterForm {
            username: "Late Comer".to_string(),
            email: "late@example.edu".to_string(),
            password: PASSWORD.to_string(),
            password2: PASSWORD.to_string(),
            phone: None,
            college: None,
        },
    );
    let count: i64 = users::table.count().get_result(&mut portal.conn).unwrap();
    assert_eq!(count, 1);
}

#[test]
fn deleting_an_event_takes_its_registrations() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    portal.register("Asha");
    portal.post(format!("/events/{}/register", quiz.public_id));
    portal.logout();
    portal.login(&admin);

    let confirm = portal.get(format!("/admin/events/{}/delete", quiz.public_id));
    assert_eq!(confirm.status(), Status::Ok);
    assert!(confirm.into_string().unwrap().contains("1 registration(s)"));

    portal.post(format!("/admin/events/{}/delete", quiz.public_id));
    let events_left: i64 = events::table.count().get_result(&mut portal.conn).unwrap();
    assert_eq!(events_left, 0);
    let registrations_left: i64 = participations::table
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(registrations_left, 0);
}
