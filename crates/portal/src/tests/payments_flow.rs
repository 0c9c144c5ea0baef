use db::{
    participation::Participation,
    payment::PaymentOrder,
    schema::{participations, payment_orders},
    user::User,
};
use diesel::prelude::*;
use rocket::http::Status;

use super::{test_portal, TestPortal, GATEWAY_SECRET};
use crate::{checkout::PaymentCallbackForm, teams::CreateTeamForm};

fn latest_order(portal: &mut TestPortal, user: &User) -> PaymentOrder {
    payment_orders::table
        .filter(payment_orders::user_id.eq(user.id))
        .order_by(payment_orders::id.desc())
        .select(PaymentOrder::as_select())
        .first(&mut portal.conn)
        .unwrap()
}

fn participations_of(portal: &mut TestPortal, user: &User) -> Vec<Participation> {
    participations::table
        .filter(participations::user_id.eq(user.id))
        .select(Participation::as_select())
        .load(&mut portal.conn)
        .unwrap()
}

fn signed_callback(order: &PaymentOrder, payment_id: &str) -> PaymentCallbackForm {
    PaymentCallbackForm {
        order_id: order.gateway_order_id.clone(),
        payment_id: payment_id.to_string(),
        signature: payments::sign(
            &order.gateway_order_id,
            payment_id,
            GATEWAY_SECRET,
        ),
    }
}

#[test]
fn paid_registration_is_written_after_a_verified_payment() {
    let mut portal = test_portal();
    portal.setup_admin();
    let workshop = portal.create_event("Robotics workshop", "150", (1, 1));
    let asha = portal.register("Asha");

    let response =
        portal.post(format!("/events/{}/register", workshop.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    let order = latest_order(&mut portal, &asha);
    assert_eq!(
        response.location(),
        Some(format!("/payments/{}", order.public_id).as_str())
    );
    assert_eq!(order.amount, 15000);
    assert_eq!(order.status, "created");
    assert_eq!(order.team_id, None);
    assert!(participations_of(&mut portal, &asha).is_empty());

    let checkout = portal.get(format!("/payments/{}", order.public_id));
    assert_eq!(checkout.status(), Status::Ok);
    assert!(checkout.into_string().unwrap().contains(&order.gateway_order_id));

    // a forged signature fails the order and registers nobody
    portal.logout();
    let response = portal.post_form(
        "/payments/callback",
        &PaymentCallbackForm {
            order_id: order.gateway_order_id.clone(),
            payment_id: "pay_forged".to_string(),
            signature: "00".repeat(32),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(latest_order(&mut portal, &asha).status, "failed");
    assert!(participations_of(&mut portal, &asha).is_empty());

    // paying again starts a new order
    portal.login(&asha);
    portal.post(format!("/events/{}/register", workshop.public_id));
    let order = latest_order(&mut portal, &asha);
    assert_eq!(order.status, "created");

    portal.logout();
    let callback = signed_callback(&order, "pay_0123456789");
    let response = portal.post_form("/payments/callback", &callback);
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.location(), Some("/registrations"));

    let order = latest_order(&mut portal, &asha);
    assert_eq!(order.status, "paid");
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_0123456789"));
    let registered = participations_of(&mut portal, &asha);
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].payment_status, "paid");
    assert_eq!(registered[0].payment_ref.as_deref(), Some("pay_0123456789"));

    // the gateway may deliver the same callback twice
    let response = portal.post_form("/payments/callback", &callback);
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(participations_of(&mut portal, &asha).len(), 1);
}

#[test]
fn razorpay_field_names_are_accepted() {
    let mut portal = test_portal();
    portal.setup_admin();
    let workshop = portal.create_event("Robotics workshop", "99.50", (1, 1));
    let asha = portal.register("Asha");
    portal.post(format!("/events/{}/register", workshop.public_id));
    let order = latest_order(&mut portal, &asha);
    assert_eq!(order.amount, 9950);

    let signature =
        payments::sign(&order.gateway_order_id, "pay_razor", GATEWAY_SECRET);
    let response = portal.post_form(
        "/payments/callback",
        &[
            ("razorpay_order_id", order.gateway_order_id.as_str()),
            ("razorpay_payment_id", "pay_razor"),
            ("razorpay_signature", signature.as_str()),
        ],
    );
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(latest_order(&mut portal, &asha).status, "paid");
}

#[test]
fn teams_pay_once_for_every_member() {
    let mut portal = test_portal();
    portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "100", (2, 2));

    let asha = portal.register("Asha");
    portal.post_form(
        format!("/events/{}/teams", hackathon.public_id),
        &CreateTeamForm {
            name: "Byte Club".to_string(),
        },
    );
    let (team_id, join_code): (String, String) = db::schema::teams::table
        .select((db::schema::teams::public_id, db::schema::teams::join_code))
        .first(&mut portal.conn)
        .unwrap();

    portal.logout();
    let ravi = portal.register("Ravi");
    portal.post_form(
        "/teams/join",
        &crate::teams::JoinTeamForm { code: join_code },
    );
    let request_id: String = db::schema::team_join_requests::table
        .select(db::schema::team_join_requests::public_id)
        .first(&mut portal.conn)
        .unwrap();

    portal.logout();
    portal.login(&asha);
    portal.post_form(
        format!("/teams/{team_id}/requests/{request_id}"),
        &crate::teams::DecideJoinRequestForm {
            decision: "accept".to_string(),
        },
    );
    let response = portal.post(format!("/teams/{team_id}/lock"));
    assert_eq!(response.status(), Status::SeeOther);

    let order = latest_order(&mut portal, &asha);
    assert_eq!(order.amount, 20000);
    assert!(order.team_id.is_some());
    assert!(participations_of(&mut portal, &ravi).is_empty());

    portal.post_form("/payments/callback", &signed_callback(&order, "pay_team"));
    for member in [&asha, &ravi] {
        let registered = participations_of(&mut portal, member);
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].team_id, order.team_id);
        assert_eq!(registered[0].payment_ref.as_deref(), Some("pay_team"));
    }
}

#[test]
fn admins_reconcile_orders_paid_at_the_gateway() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let workshop = portal.create_event("Robotics workshop", "150", (1, 1));
    let meera = portal.register("Meera");
    portal.post(format!("/events/{}/register", workshop.public_id));
    let order = latest_order(&mut portal, &meera);

    // paid, but the participant never came back to the portal
    portal.gateway.capture(&order.gateway_order_id).unwrap();

    portal.logout();
    portal.login(&admin);
    let response =
        portal.post(format!("/admin/payments/{}/reconcile", order.public_id));
    assert_eq!(response.status(), Status::SeeOther);

    assert_eq!(latest_order(&mut portal, &meera).status, "paid");
    let registered = participations_of(&mut portal, &meera);
    assert_eq!(registered.len(), 1);
    assert_eq!(
        registered[0].payment_ref.as_deref(),
        Some(order.gateway_order_id.as_str())
    );
}

#[test]
fn unpaid_orders_are_left_alone_by_reconcile() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let workshop = portal.create_event("Robotics workshop", "150", (1, 1));
    let meera = portal.register("Meera");
    portal.post(format!("/events/{}/register", workshop.public_id));
    let order = latest_order(&mut portal, &meera);

    portal.logout();
    portal.login(&admin);
    portal.post(format!("/admin/payments/{}/reconcile", order.public_id));
    assert_eq!(latest_order(&mut portal, &meera).status, "created");
    assert!(participations_of(&mut portal, &meera).is_empty());
}

#[test]
fn declined_payments_are_reported_back() {
    let mut portal = test_portal();
    portal.setup_admin();
    let workshop = portal.create_event("Robotics workshop", "150", (1, 1));
    let asha = portal.register("Asha");
    portal.post(format!("/events/{}/register", workshop.public_id));
    let order = latest_order(&mut portal, &asha);

    let metadata = serde_json::json!({
        "order_id": order.gateway_order_id,
        "payment_id": "pay_declined",
    })
    .to_string();
    let response = portal.post_form(
        "/payments/callback",
        &[
            ("error[code]", "BAD_REQUEST_ERROR"),
            ("error[description]", "Payment declined by bank"),
            ("error[source]", "bank"),
            ("error[metadata]", metadata.as_str()),
        ],
    );
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        response.location(),
        Some(format!("/payments/{}", order.public_id).as_str())
    );
    assert!(portal
        .follow(&response)
        .contains("The payment was not completed: Payment declined by bank"));
    assert_eq!(latest_order(&mut portal, &asha).status, "failed");
    assert!(participations_of(&mut portal, &asha).is_empty());

    // without any details the participant is still told
    let response = portal.post_form("/payments/callback", &[("error[code]", "X")]);
    assert_eq!(response.location(), Some("/registrations"));
}
