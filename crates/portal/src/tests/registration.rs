use db::{
    notification::Notification,
    participation::Participation,
    schema::{notifications, participations},
};
use diesel::prelude::*;
use rocket::http::Status;

use super::test_portal;
use crate::qr;

#[test]
fn free_individual_registration() {
    let mut portal = test_portal();
    portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    let asha = portal.register("Asha");

    let response = portal.post(format!("/events/{}/register", quiz.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.location(), Some("/registrations"));

    let registered = participations::table
        .filter(participations::user_id.eq(asha.id))
        .select(Participation::as_select())
        .load(&mut portal.conn)
        .unwrap();
    assert_eq!(registered.len(), 1);
    let participation = &registered[0];
    assert_eq!(participation.event_id, quiz.id);
    assert_eq!(participation.payment_status, "free");
    assert_eq!(participation.team_id, None);
    assert!(!participation.attended);
    assert_eq!(
        participation.qr_payload.as_deref(),
        Some(qr::payload(&participation.public_id).as_str())
    );

    let page = portal.get("/registrations").into_string().unwrap();
    assert!(page.contains("Quiz"));
    assert!(page.contains("<svg"));

    let unread = notifications::table
        .filter(notifications::user_id.eq(asha.id))
        .select(Notification::as_select())
        .load(&mut portal.conn)
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert!(unread[0].message.contains("Quiz"));

    // registering again changes nothing
    portal.post(format!("/events/{}/register", quiz.public_id));
    let count: i64 = participations::table
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn closed_and_team_events_refuse_individuals() {
    let mut portal = test_portal();
    portal.setup_admin();
    let closed = portal.create_event("Chess", "0", (1, 1));
    let hackathon = portal.create_event("Hackathon", "0", (2, 4));
    portal.post(format!("/admin/events/{}/registrations", closed.public_id));

    portal.register("Ravi");
    for event in [&closed, &hackathon] {
        let response =
            portal.post(format!("/events/{}/register", event.public_id));
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(
            response.location(),
            Some(format!("/events/{}", event.public_id).as_str())
        );
    }

    let count: i64 = participations::table
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn logged_out_visitors_are_sent_to_log_in() {
    let mut portal = test_portal();
    portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    portal.logout();

    let response = portal.post(format!("/events/{}/register", quiz.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.location(), Some("/login"));
}

#[test]
fn notifications_can_be_read() {
    let mut portal = test_portal();
    portal.setup_admin();
    let quiz = portal.create_event("Quiz", "0", (1, 1));
    let asha = portal.register("Asha");
    portal.post(format!("/events/{}/register", quiz.public_id));

    assert_eq!(portal.get("/notifications").status(), Status::Ok);
    portal.post("/notifications/read-all");

    let unread: i64 = notifications::table
        .filter(notifications::user_id.eq(asha.id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(unread, 0);
}
