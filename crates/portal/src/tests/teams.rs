use db::{
    event::Event,
    participation::Participation,
    payment::PaymentOrder,
    schema::{
        events, participations, payment_orders, team_join_requests,
        team_members, teams,
    },
    team::{Team, TeamJoinRequest},
    user::User,
};
use diesel::prelude::*;
use rocket::http::Status;

use super::{test_portal, Reply, TestPortal, GATEWAY_SECRET};
use crate::{
    checkout::PaymentCallbackForm,
    teams::{CreateTeamForm, DecideJoinRequestForm, JoinTeamForm},
};

/// The logged in user creates a team for `event`.
fn create_team(portal: &mut TestPortal, event: &Event, name: &str) -> Team {
    let response = portal.post_form(
        format!("/events/{}/teams", event.public_id),
        &CreateTeamForm {
            name: name.to_string(),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    teams::table
        .filter(teams::event_id.eq(event.id))
        .filter(teams::name.eq(name))
        .select(Team::as_select())
        .first(&mut portal.conn)
        .unwrap()
}

fn ask_to_join(portal: &TestPortal, team: &Team) -> Reply {
    portal.post_form(
        "/teams/join",
        &JoinTeamForm {
            code: team.join_code.clone(),
        },
    )
}

fn requests_from(portal: &mut TestPortal, user: &User) -> Vec<TeamJoinRequest> {
    team_join_requests::table
        .filter(team_join_requests::user_id.eq(user.id))
        .order_by(team_join_requests::id.asc())
        .select(TeamJoinRequest::as_select())
        .load(&mut portal.conn)
        .unwrap()
}

fn decide(
    portal: &TestPortal,
    team: &Team,
    request: &TeamJoinRequest,
    decision: &str,
) -> Reply {
    portal.post_form(
        format!("/teams/{}/requests/{}", team.public_id, request.public_id),
        &DecideJoinRequestForm {
            decision: decision.to_string(),
        },
    )
}

fn members_of(portal: &mut TestPortal, team: &Team) -> Vec<i64> {
    team_members::table
        .filter(team_members::team_id.eq(team.id))
        .order_by(team_members::user_id.asc())
        .select(team_members::user_id)
        .load(&mut portal.conn)
        .unwrap()
}

fn is_locked(portal: &mut TestPortal, team: &Team) -> bool {
    teams::table
        .find(team.id)
        .select(teams::is_locked)
        .first(&mut portal.conn)
        .unwrap()
}

/// Signs up `name`, who asks to join `team` and is accepted by `creator`.
/// The creator is left logged in.
fn recruit(
    portal: &mut TestPortal,
    team: &Team,
    creator: &User,
    name: &str,
) -> User {
    portal.logout();
    let recruit = portal.register(name);
    ask_to_join(portal, team);
    let request = requests_from(portal, &recruit).pop().unwrap();
    portal.logout();
    portal.login(creator);
    let response = decide(portal, team, &request, "accept");
    assert_eq!(response.status(), Status::SeeOther);
    recruit
}

#[test]
fn build_and_lock_a_team() {
    let mut portal = test_portal();
    portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "0", (2, 4));

    let asha = portal.register("Asha");
    let response = portal.post_form(
        format!("/events/{}/teams", hackathon.public_id),
        &CreateTeamForm {
            name: "Byte Club".to_string(),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let team = teams::table
        .filter(teams::event_id.eq(hackathon.id))
        .select(Team::as_select())
        .first(&mut portal.conn)
        .unwrap();
    assert!(team.is_led_by(asha.id));
    assert!(!team.is_locked);

    // one member is too few for this event
    portal.post(format!("/teams/{}/lock", team.public_id));
    let locked = teams::table
        .find(team.id)
        .select(teams::is_locked)
        .first::<bool>(&mut portal.conn)
        .unwrap();
    assert!(!locked);

    portal.logout();
    let ravi = portal.register("Ravi");
    let response = portal.post_form(
        "/teams/join",
        &JoinTeamForm {
            code: format!("  {}  ", team.join_code.to_lowercase()),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let request = team_join_requests::table
        .filter(team_join_requests::user_id.eq(ravi.id))
        .select(TeamJoinRequest::as_select())
        .first(&mut portal.conn)
        .unwrap();
    assert_eq!(request.status, "pending");

    // only the creator may answer
    let response = portal.post_form(
        format!("/teams/{}/requests/{}", team.public_id, request.public_id),
        &DecideJoinRequestForm {
            decision: "accept".to_string(),
        },
    );
    assert_eq!(response.status(), Status::Forbidden);

    portal.logout();
    portal.login(&asha);
    let response = portal.post_form(
        format!("/teams/{}/requests/{}", team.public_id, request.public_id),
        &DecideJoinRequestForm {
            decision: "accept".to_string(),
        },
    );
    assert_eq!(response.status(), Status::SeeOther);
    let members: i64 = team_members::table
        .filter(team_members::team_id.eq(team.id))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(members, 2);

    let page = portal.get(format!("/teams/{}", team.public_id));
    assert_eq!(page.status(), Status::Ok);
    assert!(page.into_string().unwrap().contains("Ravi"));

    portal.post(format!("/teams/{}/lock", team.public_id));
    let locked = teams::table
        .find(team.id)
        .select(teams::is_locked)
        .first::<bool>(&mut portal.conn)
        .unwrap();
    assert!(locked);

    let registered = participations::table
        .filter(participations::event_id.eq(hackathon.id))
        .select(Participation::as_select())
        .load(&mut portal.conn)
        .unwrap();
    assert_eq!(registered.len(), 2);
    assert!(registered.iter().all(|p| p.team_id == Some(team.id)));
    assert!(registered.iter().all(|p| p.payment_status == "free"));

    // locked teams keep their members
    portal.logout();
    portal.login(&ravi);
    portal.post(format!("/teams/{}/leave", team.public_id));
    let members: i64 = team_members::table
        .filter(team_members::team_id.eq(team.id))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(members, 2);
}

#[test]
fn one_team_per_event() {
    let mut portal = test_portal();
    portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "0", (2, 4));

    let asha = portal.register("Asha");
    portal.post_form(
        format!("/events/{}/teams", hackathon.public_id),
        &CreateTeamForm {
            name: "Byte Club".to_string(),
        },
    );
    portal.post_form(
        format!("/events/{}/teams", hackathon.public_id),
        &CreateTeamForm {
            name: "Second Team".to_string(),
        },
    );

    let teams_led: i64 = teams::table
        .filter(teams::created_by.eq(asha.id))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(teams_led, 1);
}

#[test]
fn creators_can_disband_unlocked_teams() {
    let mut portal = test_portal();
    portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "0", (2, 4));

    portal.register("Asha");
    portal.post_form(
        format!("/events/{}/teams", hackathon.public_id),
        &CreateTeamForm {
            name: "Byte Club".to_string(),
        },
    );
    let team = teams::table
        .select(Team::as_select())
        .first(&mut portal.conn)
        .unwrap();

    let response = portal.post(format!("/teams/{}/disband", team.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    let remaining: i64 = teams::table.count().get_result(&mut portal.conn).unwrap();
    assert_eq!(remaining, 0);
    let members: i64 = team_members::table
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(members, 0);
}

#[test]
fn join_requests_are_refused_when_they_cannot_be_granted() {
    let mut portal = test_portal();
    portal.setup_admin();
    let pairs = portal.create_event("Pair programming", "0", (2, 2));
    let relay = portal.create_event("Relay", "0", (2, 4));

    let asha = portal.register("Asha");
    let pair = create_team(&mut portal, &pairs, "Pair One");
    let relay_team = create_team(&mut portal, &relay, "Fast Feet");
    let ravi = recruit(&mut portal, &pair, &asha, "Ravi");

    // the pair is full
    portal.logout();
    let meera = portal.register("Meera");
    let response = ask_to_join(&portal, &pair);
    assert!(portal.follow(&response).contains("That team is already full."));
    assert!(requests_from(&mut portal, &meera).is_empty());

    // asking twice leaves a single request
    ask_to_join(&portal, &relay_team);
    let response = ask_to_join(&portal, &relay_team);
    assert!(portal
        .follow(&response)
        .contains("You have already asked to join that team."));
    assert_eq!(requests_from(&mut portal, &meera).len(), 1);

    // a participant with a team of their own cannot join another
    portal.logout();
    portal.login(&ravi);
    create_team(&mut portal, &relay, "Slow Feet");
    let response = ask_to_join(&portal, &relay_team);
    assert!(portal
        .follow(&response)
        .contains("You already have a team (or a registration) for this event."));
    assert!(requests_from(&mut portal, &ravi)
        .iter()
        .all(|r| r.team_id != relay_team.id));

    // locked teams take nobody
    portal.logout();
    portal.login(&asha);
    portal.post(format!("/teams/{}/lock", pair.public_id));
    assert!(is_locked(&mut portal, &pair));
    portal.logout();
    let kiran = portal.register("Kiran");
    let response = ask_to_join(&portal, &pair);
    assert!(portal
        .follow(&response)
        .contains("That team is locked and no longer accepts members."));
    assert!(requests_from(&mut portal, &kiran).is_empty());
}

#[test]
fn rejected_requesters_are_told_and_stay_out() {
    let mut portal = test_portal();
    portal.setup_admin();
    let relay = portal.create_event("Relay", "0", (2, 4));
    let asha = portal.register("Asha");
    let team = create_team(&mut portal, &relay, "Fast Feet");

    portal.logout();
    let ravi = portal.register("Ravi");
    ask_to_join(&portal, &team);
    let request = requests_from(&mut portal, &ravi).pop().unwrap();

    portal.logout();
    portal.login(&asha);
    let response = decide(&portal, &team, &request, "reject");
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(requests_from(&mut portal, &ravi)[0].status, "rejected");
    assert_eq!(members_of(&mut portal, &team), vec![asha.id]);

    let told: Vec<String> = db::schema::notifications::table
        .filter(db::schema::notifications::user_id.eq(ravi.id))
        .select(db::schema::notifications::message)
        .load(&mut portal.conn)
        .unwrap();
    assert_eq!(told.len(), 1);
    assert!(told[0].contains("declined"));

    // an answered request cannot be accepted later
    decide(&portal, &team, &request, "accept");
    assert_eq!(members_of(&mut portal, &team), vec![asha.id]);
}

#[test]
fn members_leave_and_creators_remove_them() {
    let mut portal = test_portal();
    portal.setup_admin();
    let relay = portal.create_event("Relay", "0", (2, 4));
    let asha = portal.register("Asha");
    let team = create_team(&mut portal, &relay, "Fast Feet");
    let ravi = recruit(&mut portal, &team, &asha, "Ravi");
    let meera = recruit(&mut portal, &team, &asha, "Meera");
    assert_eq!(members_of(&mut portal, &team).len(), 3);

    // the creator cannot walk away from their own team
    portal.post(format!("/teams/{}/leave", team.public_id));
    assert_eq!(members_of(&mut portal, &team).len(), 3);

    let response = portal.post(format!(
        "/teams/{}/members/{}/remove",
        team.public_id, meera.public_id
    ));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(members_of(&mut portal, &team), vec![asha.id, ravi.id]);

    // members cannot remove each other
    portal.logout();
    portal.login(&ravi);
    let response = portal.post(format!(
        "/teams/{}/members/{}/remove",
        team.public_id, asha.public_id
    ));
    assert_eq!(response.status(), Status::Forbidden);

    let response = portal.post(format!("/teams/{}/leave", team.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        response.location(),
        Some(format!("/events/{}", relay.public_id).as_str())
    );
    assert_eq!(members_of(&mut portal, &team), vec![asha.id]);
}

#[test]
fn joining_a_team_withdraws_other_requests() {
    let mut portal = test_portal();
    portal.setup_admin();
    let relay = portal.create_event("Relay", "0", (2, 4));
    let asha = portal.register("Asha");
    let fast = create_team(&mut portal, &relay, "Fast Feet");
    portal.logout();
    let ravi = portal.register("Ravi");
    let slow = create_team(&mut portal, &relay, "Slow Feet");

    portal.logout();
    let meera = portal.register("Meera");
    ask_to_join(&portal, &fast);
    ask_to_join(&portal, &slow);
    portal.logout();
    let kiran = portal.register("Kiran");
    ask_to_join(&portal, &slow);

    // accepted into one team, Meera's request to the other is dropped
    portal.logout();
    portal.login(&asha);
    let to_fast = requests_from(&mut portal, &meera)
        .into_iter()
        .find(|r| r.team_id == fast.id)
        .unwrap();
    decide(&portal, &fast, &to_fast, "accept");
    let statuses: Vec<(i64, String)> = requests_from(&mut portal, &meera)
        .into_iter()
        .map(|r| (r.team_id, r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (fast.id, "accepted".to_string()),
            (slow.id, "rejected".to_string())
        ]
    );

    // creating a team does the same
    portal.logout();
    portal.login(&kiran);
    create_team(&mut portal, &relay, "Kiran Crew");
    assert_eq!(requests_from(&mut portal, &kiran)[0].status, "rejected");

    portal.logout();
    portal.login(&ravi);
    assert_eq!(members_of(&mut portal, &slow), vec![ravi.id]);
}

#[test]
fn team_names_are_unique_per_event() {
    let mut portal = test_portal();
    portal.setup_admin();
    let relay = portal.create_event("Relay", "0", (2, 4));
    let quiz = portal.create_event("Team quiz", "0", (2, 3));
    portal.register("Asha");
    create_team(&mut portal, &relay, "Byte Club");

    portal.logout();
    portal.register("Ravi");
    let response = portal.post_form(
        format!("/events/{}/teams", relay.public_id),
        &CreateTeamForm {
            name: "Byte Club".to_string(),
        },
    );
    assert!(portal
        .follow(&response)
        .contains("Another team for this event already has that name."));
    let named: i64 = teams::table
        .filter(teams::name.eq("Byte Club"))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(named, 1);

    // another event may reuse the name
    create_team(&mut portal, &quiz, "Byte Club");
}

#[test]
fn oversized_teams_cannot_lock() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let relay = portal.create_event("Relay", "0", (2, 3));
    portal.logout();
    let asha = portal.register("Asha");
    let team = create_team(&mut portal, &relay, "Fast Feet");
    recruit(&mut portal, &team, &asha, "Ravi");
    recruit(&mut portal, &team, &asha, "Meera");

    // the organisers shrink the event after the team filled up
    portal.logout();
    portal.login(&admin);
    diesel::update(events::table.find(relay.id))
        .set(events::max_team_size.eq(2))
        .execute(&mut portal.conn)
        .unwrap();

    portal.logout();
    portal.login(&asha);
    let response = portal.post(format!("/teams/{}/lock", team.public_id));
    assert!(portal.follow(&response).contains("yours has 3"));
    assert!(!is_locked(&mut portal, &team));
    let registered: i64 = participations::table
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(registered, 0);
}

fn team_orders(portal: &mut TestPortal, team: &Team) -> Vec<PaymentOrder> {
    payment_orders::table
        .filter(payment_orders::team_id.eq(team.id))
        .order_by(payment_orders::id.asc())
        .select(PaymentOrder::as_select())
        .load(&mut portal.conn)
        .unwrap()
}

#[test]
fn locked_teams_can_retry_payment() {
    let mut portal = test_portal();
    portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "250", (2, 2));
    portal.logout();
    let asha = portal.register("Asha");
    let team = create_team(&mut portal, &hackathon, "Byte Club");
    let ravi = recruit(&mut portal, &team, &asha, "Ravi");

    // nothing to pay before the team is locked
    portal.post(format!("/teams/{}/pay", team.public_id));
    assert!(team_orders(&mut portal, &team).is_empty());

    portal.post(format!("/teams/{}/lock", team.public_id));
    assert_eq!(team_orders(&mut portal, &team).len(), 1);

    // the first checkout was abandoned
    let response = portal.post(format!("/teams/{}/pay", team.public_id));
    let orders = team_orders(&mut portal, &team);
    assert_eq!(orders.len(), 2);
    let retry = &orders[1];
    assert_eq!(retry.amount, 50000);
    assert_eq!(
        response.location(),
        Some(format!("/payments/{}", retry.public_id).as_str())
    );

    // only the creator pays
    portal.logout();
    portal.login(&ravi);
    let response = portal.post(format!("/teams/{}/pay", team.public_id));
    assert_eq!(response.status(), Status::Forbidden);

    portal.post_form(
        "/payments/callback",
        &PaymentCallbackForm {
            order_id: retry.gateway_order_id.clone(),
            payment_id: "pay_retry".to_string(),
            signature: payments::sign(
                &retry.gateway_order_id,
                "pay_retry",
                GATEWAY_SECRET,
            ),
        },
    );
    let registered: i64 = participations::table
        .filter(participations::team_id.eq(team.id))
        .count()
        .get_result(&mut portal.conn)
        .unwrap();
    assert_eq!(registered, 2);

    // once registered there is nothing left to pay
    portal.logout();
    portal.login(&asha);
    portal.post(format!("/teams/{}/pay", team.public_id));
    assert_eq!(team_orders(&mut portal, &team).len(), 2);
}

#[test]
fn fees_too_large_to_charge_leave_the_team_unlocked() {
    let mut portal = test_portal();
    let admin = portal.setup_admin();
    let hackathon = portal.create_event("Hackathon", "100", (2, 4));
    portal.logout();
    let asha = portal.register("Asha");
    let team = create_team(&mut portal, &hackathon, "Byte Club");
    recruit(&mut portal, &team, &asha, "Ravi");

    diesel::update(events::table.find(hackathon.id))
        .set(events::fee.eq(i64::MAX / 2 + 1))
        .execute(&mut portal.conn)
        .unwrap();

    let response = portal.post(format!("/teams/{}/lock", team.public_id));
    assert_eq!(response.status(), Status::SeeOther);
    assert!(portal
        .follow(&response)
        .contains("The fee for this team is too large to charge."));
    assert!(!is_locked(&mut portal, &team));
    assert!(team_orders(&mut portal, &team).is_empty());

    // the admin form refuses such fees in the first place
    portal.logout();
    portal.login(&admin);
    let before: i64 = events::table.count().get_result(&mut portal.conn).unwrap();
    portal.post_form(
        "/admin/events/new",
        &crate::admin::events::EventForm {
            name: "Gold rush".to_string(),
            description: "Expensive.".to_string(),
            venue: None,
            starts_at: "2030-01-01T09:00".to_string(),
            ends_at: "2030-01-01T18:00".to_string(),
            fee: "92233720368547758".to_string(),
            min_team_size: 1,
            max_team_size: 1,
            registrations_open: true,
        },
    );
    let after: i64 = events::table.count().get_result(&mut portal.conn).unwrap();
    assert_eq!(before, after);
}
