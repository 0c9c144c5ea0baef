//! Teams for events that are contested in groups.
//!
//! A participant creates a team for an event and shares its join code.
//! Others use the code to ask to join, and the creator accepts or rejects
//! each request. Once the team is within the event's size bounds the creator
//! locks it, which registers every member (after payment, for paid events).

use std::sync::Arc;

use db::{
    event::Event,
    participation::Participation,
    schema::{
        events, participations, team_join_requests, team_members, teams,
        users,
    },
    team::{JoinRequestStatus, Team, TeamJoinRequest, TeamMember},
    user::User,
    DbConn,
};
use diesel::{
    connection::LoadConnection, dsl::exists, prelude::*, select,
    sqlite::Sqlite,
};
use maud::{html, Markup};
use rocket::{
    form::Form,
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    checkout::begin_payment,
    config::{Gateway, PortalConfig},
    error::{Error, Result},
    notifications::notify,
    permissions::{has_permission, Permission},
    registration::{enrol, send_confirmations, Settlement},
    resources::{EventRef, TeamRef},
    util::{flash_of, gen_join_code, gen_public_id},
};

/// Join codes are drawn at random; a clash with an existing code is
/// retried a few times before giving up.
const JOIN_CODE_ATTEMPTS: usize = 8;

fn load_team(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    team_id: &str,
) -> Result<(Team, Event)> {
    teams::table
        .inner_join(events::table)
        .filter(teams::public_id.eq(team_id))
        .select((Team::as_select(), Event::as_select()))
        .first::<(Team, Event)>(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("team"))
}

fn member_count(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    team_id: i64,
) -> QueryResult<i64> {
    team_members::table
        .filter(team_members::team_id.eq(team_id))
        .count()
        .get_result(conn)
}

fn is_in_team_or_registered(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    user_id: i64,
    event_id: i64,
) -> QueryResult<bool> {
    let in_team = select(exists(
        team_members::table
            .filter(TeamMember::of_user_in_event(user_id, event_id)),
    ))
    .get_result::<bool>(conn)?;
    let registered = select(exists(
        participations::table
            .filter(Participation::of_user_in_event(user_id, event_id)),
    ))
    .get_result::<bool>(conn)?;
    Ok(in_team || registered)
}

/// Rejects the user's other pending requests to teams of the event, once
/// they have a team of their own.
fn withdraw_pending_requests(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    user_id: i64,
    event_id: i64,
) -> QueryResult<usize> {
    let teams_of_event = teams::table
        .filter(teams::event_id.eq(event_id))
        .select(teams::id);
    diesel::update(
        team_join_requests::table
            .filter(team_join_requests::user_id.eq(user_id))
            .filter(TeamJoinRequest::pending())
            .filter(team_join_requests::team_id.eq_any(teams_of_event)),
    )
    .set(team_join_requests::status.eq(JoinRequestStatus::Rejected.as_str()))
    .execute(conn)
}

fn set_request_status(
    conn: &mut impl Connection<Backend = Sqlite>,
    request_id: i64,
    status: JoinRequestStatus,
) -> QueryResult<usize> {
    diesel::update(team_join_requests::table.find(request_id))
        .set(team_join_requests::status.eq(status.as_str()))
        .execute(conn)
}

fn team_url(team: &Team) -> String {
    format!("/teams/{}", team.public_id)
}

#[derive(FromForm, Serialize)]
pub struct CreateTeamForm {
    pub name: String,
}

#[post("/events/<event_id>/teams", data = "<form>")]
pub async fn create_team(
    event_id: &str,
    user: User,
    db: DbConn,
    form: Form<CreateTeamForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let event_id = event_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let event = events::table
                .filter(events::public_id.eq(&event_id))
                .select(Event::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| Error::not_found("event"))?;
            let back = Redirect::to(format!("/events/{}", event.public_id));

            if !event.is_team_event() {
                return Ok(Flash::error(
                    back,
                    "This event is for individuals; register directly instead.",
                ));
            }
            if !has_permission(
                Some(&user),
                &Permission::RegisterForEvent(EventRef(event.id)),
                conn,
            )? {
                return Ok(Flash::error(
                    back,
                    "Registrations for this event are closed.",
                ));
            }
            if is_in_team_or_registered(conn, user.id, event.id)? {
                return Ok(Flash::error(
                    back,
                    "You already have a team (or a registration) for this event.",
                ));
            }

            let name = form.name.trim();
            if !Team::validate_name(name) {
                return Ok(Flash::error(
                    back,
                    "Team names should be between 3 and 40 characters long.",
                ));
            }
            let name_taken = select(exists(
                teams::table
                    .filter(teams::event_id.eq(event.id))
                    .filter(teams::name.eq(name)),
            ))
            .get_result::<bool>(conn)?;
            if name_taken {
                return Ok(Flash::error(
                    back,
                    "Another team for this event already has that name.",
                ));
            }

            let mut rng = rand::thread_rng();
            let mut join_code = None;
            for _ in 0..JOIN_CODE_ATTEMPTS {
                let code = gen_join_code(&mut rng);
                let taken = select(exists(
                    teams::table.filter(Team::with_join_code(&code)),
                ))
                .get_result::<bool>(conn)?;
                if !taken {
                    join_code = Some(code);
                    break;
                }
                tracing::debug!("join code collision, retrying");
            }
            let Some(join_code) = join_code else {
                tracing::error!("could not find an unused join code");
                return Ok(Flash::error(
                    back,
                    "Could not create the team right now; please try again.",
                ));
            };

            let team = diesel::insert_into(teams::table)
                .values((
                    teams::public_id.eq(gen_public_id()),
                    teams::event_id.eq(event.id),
                    teams::name.eq(name),
                    teams::join_code.eq(&join_code),
                    teams::is_locked.eq(false),
                    teams::created_by.eq(user.id),
                    teams::created_at.eq(diesel::dsl::now),
                ))
                .returning(Team::as_returning())
                .get_result(conn)?;

            diesel::insert_into(team_members::table)
                .values((
                    team_members::team_id.eq(team.id),
                    team_members::user_id.eq(user.id),
                    team_members::event_id.eq(event.id),
                    team_members::joined_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
            withdraw_pending_requests(conn, user.id, event.id)?;

            tracing::info!(team_id = team.id, event_id = event.id, "created team");
            Ok(Flash::success(
                Redirect::to(team_url(&team)),
                format!(
                    "Team created. Share the join code {join_code} with your teammates."
                ),
            ))
        })
    })
    .instrument(span.0)
    .await
}

#[derive(FromForm, Serialize)]
pub struct JoinTeamForm {
    pub code: String,
}

#[post("/teams/join", data = "<form>")]
pub async fn request_to_join(
    user: User,
    db: DbConn,
    form: Form<JoinTeamForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let back = Redirect::to("/events");
            let Some(code) = Team::normalize_join_code(&form.code) else {
                return Ok(Flash::error(
                    back,
                    "That is not a valid join code.",
                ));
            };
            let Some((team, event)) = teams::table
                .inner_join(events::table)
                .filter(teams::join_code.eq(&code))
                .select((Team::as_select(), Event::as_select()))
                .first::<(Team, Event)>(conn)
                .optional()?
            else {
                return Ok(Flash::error(back, "No team has that join code."));
            };
            let back = Redirect::to(format!("/events/{}", event.public_id));

            if team.is_locked {
                return Ok(Flash::error(
                    back,
                    "That team is locked and no longer accepts members.",
                ));
            }
            if member_count(conn, team.id)? >= event.max_team_size {
                return Ok(Flash::error(back, "That team is already full."));
            }
            if is_in_team_or_registered(conn, user.id, event.id)? {
                return Ok(Flash::error(
                    back,
                    "You already have a team (or a registration) for this event.",
                ));
            }
            let already_requested = select(exists(
                team_join_requests::table
                    .filter(team_join_requests::team_id.eq(team.id))
                    .filter(team_join_requests::user_id.eq(user.id))
                    .filter(TeamJoinRequest::pending()),
            ))
            .get_result::<bool>(conn)?;
            if already_requested {
                return Ok(Flash::error(
                    back,
                    "You have already asked to join that team.",
                ));
            }

            diesel::insert_into(team_join_requests::table)
                .values((
                    team_join_requests::public_id.eq(gen_public_id()),
                    team_join_requests::team_id.eq(team.id),
                    team_join_requests::user_id.eq(user.id),
                    team_join_requests::status
                        .eq(JoinRequestStatus::Pending.as_str()),
                    team_join_requests::created_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
            notify(
                conn,
                team.created_by,
                &format!(
                    "{} asked to join your team {} for {}.",
                    user.username, team.name, event.name
                ),
            )?;

            Ok(Flash::success(
                back,
                format!(
                    "Asked to join {}. You will be notified when the team creator decides.",
                    team.name
                ),
            ))
        })
    })
    .instrument(span.0)
    .await
}

#[derive(FromForm, Serialize)]
pub struct DecideJoinRequestForm {
    /// `accept` or `reject`.
    pub decision: String,
}

#[post("/teams/<team_id>/requests/<request_id>", data = "<form>")]
pub async fn decide_join_request(
    team_id: &str,
    request_id: &str,
    user: User,
    db: DbConn,
    form: Form<DecideJoinRequestForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    let request_id = request_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let (team, event) = load_team(conn, &team_id)?;
            let back = Redirect::to(team_url(&team));

            if !has_permission(
                Some(&user),
                &Permission::ManageTeam(TeamRef(team.id)),
                conn,
            )? {
                return Err(Error::Forbidden(
                    "Only the team's creator may answer join requests.".into(),
                ));
            }
            if team.is_locked {
                return Ok(Flash::error(back, "The team is locked."));
            }

            let request = team_join_requests::table
                .filter(team_join_requests::public_id.eq(&request_id))
                .filter(team_join_requests::team_id.eq(team.id))
                .select(TeamJoinRequest::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| Error::not_found("join request"))?;
            if request.status() != Some(JoinRequestStatus::Pending) {
                return Ok(Flash::error(
                    back,
                    "That request has already been answered.",
                ));
            }

            match form.decision.as_str() {
                "accept" => {
                    if member_count(conn, team.id)? >= event.max_team_size {
                        return Ok(Flash::error(back, "The team is full."));
                    }
                    if is_in_team_or_registered(conn, request.user_id, event.id)?
                    {
                        set_request_status(conn, request.id, JoinRequestStatus::Rejected)?;
                        return Ok(Flash::error(
                            back,
                            "That participant has since joined another team for this event.",
                        ));
                    }

                    diesel::insert_into(team_members::table)
                        .values((
                            team_members::team_id.eq(team.id),
                            team_members::user_id.eq(request.user_id),
                            team_members::event_id.eq(event.id),
                            team_members::joined_at.eq(diesel::dsl::now),
                        ))
                        .execute(conn)?;
                    set_request_status(conn, request.id, JoinRequestStatus::Accepted)?;
                    withdraw_pending_requests(conn, request.user_id, event.id)?;
                    notify(
                        conn,
                        request.user_id,
                        &format!(
                            "You have been accepted into {} for {}.",
                            team.name, event.name
                        ),
                    )?;
                    Ok(Flash::success(back, "Request accepted."))
                }
                "reject" => {
                    set_request_status(conn, request.id, JoinRequestStatus::Rejected)?;
                    notify(
                        conn,
                        request.user_id,
                        &format!(
                            "Your request to join {} for {} was declined.",
                            team.name, event.name
                        ),
                    )?;
                    Ok(Flash::success(back, "Request rejected."))
                }
                _ => Ok(Flash::error(back, "Unknown decision.")),
            }
        })
    })
    .instrument(span.0)
    .await
}

#[post("/teams/<team_id>/leave")]
pub async fn leave_team(
    team_id: &str,
    user: User,
    db: DbConn,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let (team, event) = load_team(conn, &team_id)?;
            let back = Redirect::to(team_url(&team));

            if team.is_led_by(user.id) {
                return Ok(Flash::error(
                    back,
                    "As the team's creator you cannot leave it; disband it instead.",
                ));
            }
            if team.is_locked {
                return Ok(Flash::error(
                    back,
                    "The team is locked, so its members are final.",
                ));
            }

            let n = diesel::delete(
                team_members::table
                    .filter(team_members::team_id.eq(team.id))
                    .filter(team_members::user_id.eq(user.id)),
            )
            .execute(conn)?;
            if n == 0 {
                return Err(Error::Forbidden(
                    "You are not a member of this team.".into(),
                ));
            }
            notify(
                conn,
                team.created_by,
                &format!("{} left your team {}.", user.username, team.name),
            )?;

            Ok(Flash::success(
                Redirect::to(format!("/events/{}", event.public_id)),
                format!("You have left {}.", team.name),
            ))
        })
    })
    .instrument(span.0)
    .await
}

#[post("/teams/<team_id>/members/<member_id>/remove")]
pub async fn remove_member(
    team_id: &str,
    member_id: &str,
    user: User,
    db: DbConn,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    let member_id = member_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let (team, _) = load_team(conn, &team_id)?;
            let back = Redirect::to(team_url(&team));

            if !has_permission(
                Some(&user),
                &Permission::ManageTeam(TeamRef(team.id)),
                conn,
            )? {
                return Err(Error::Forbidden(
                    "Only the team's creator may remove members.".into(),
                ));
            }
            if team.is_locked {
                return Ok(Flash::error(back, "The team is locked."));
            }

            let member = users::table
                .filter(User::with_public_id(&member_id))
                .select(User::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| Error::not_found("member"))?;
            if member.id == user.id {
                return Ok(Flash::error(
                    back,
                    "You cannot remove yourself; disband the team instead.",
                ));
            }

            let n = diesel::delete(
                team_members::table
                    .filter(team_members::team_id.eq(team.id))
                    .filter(team_members::user_id.eq(member.id)),
            )
            .execute(conn)?;
            if n == 0 {
                return Err(Error::not_found("member"));
            }
            notify(
                conn,
                member.id,
                &format!("You were removed from the team {}.", team.name),
            )?;

            Ok(Flash::success(
                back,
                format!("Removed {} from the team.", member.username),
            ))
        })
    })
    .instrument(span.0)
    .await
}

#[post("/teams/<team_id>/disband")]
pub async fn disband_team(
    team_id: &str,
    user: User,
    db: DbConn,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let (team, event) = load_team(conn, &team_id)?;

            if !has_permission(
                Some(&user),
                &Permission::ManageTeam(TeamRef(team.id)),
                conn,
            )? {
                return Err(Error::Forbidden(
                    "Only the team's creator may disband it.".into(),
                ));
            }
            if team.is_locked {
                return Ok(Flash::error(
                    Redirect::to(team_url(&team)),
                    "A locked team cannot be disbanded. Contact the organisers.",
                ));
            }

            let others = team_members::table
                .filter(team_members::team_id.eq(team.id))
                .filter(team_members::user_id.ne(user.id))
                .select(team_members::user_id)
                .load::<i64>(conn)?;
            for member in others {
                notify(
                    conn,
                    member,
                    &format!("The team {} was disbanded.", team.name),
                )?;
            }

            // members and join requests go with the team
            diesel::delete(teams::table.find(team.id)).execute(conn)?;
            tracing::info!(team_id = team.id, "disbanded team");

            Ok(Flash::success(
                Redirect::to(format!("/events/{}", event.public_id)),
                format!("Disbanded {}.", team.name),
            ))
        })
    })
    .instrument(span.0)
    .await
}

enum LockOutcome {
    Refused(Flash<Redirect>),
    Registered(Team, Event, Vec<User>),
    MustPay(Team, Event, i64),
}

/// Locks the team. For a free event every member is registered at once;
/// for a paid event the creator is sent to pay for the whole team.
#[post("/teams/<team_id>/lock")]
pub async fn lock_team(
    team_id: &str,
    user: User,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    let user_id = user.id;
    let db = Arc::new(db);

    let outcome = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let (team, event) = load_team(conn, &team_id)?;
                let back = Redirect::to(team_url(&team));

                if !has_permission(
                    Some(&user),
                    &Permission::ManageTeam(TeamRef(team.id)),
                    conn,
                )? {
                    return Err(Error::Forbidden(
                        "Only the team's creator may lock it.".into(),
                    ));
                }
                if team.is_locked {
                    return Ok(LockOutcome::Refused(Flash::error(
                        back,
                        "The team is already locked.",
                    )));
                }
                if !has_permission(
                    Some(&user),
                    &Permission::RegisterForEvent(EventRef(event.id)),
                    conn,
                )? {
                    return Ok(LockOutcome::Refused(Flash::error(
                        back,
                        "Registrations for this event are closed.",
                    )));
                }

                let size = member_count(conn, team.id)?;
                if !event.team_size_ok(size) {
                    return Ok(LockOutcome::Refused(Flash::error(
                        back,
                        format!(
                            "Teams for this event need {}; yours has {size}.",
                            event.team_size_label()
                        ),
                    )));
                }

                let Some(due) = event.team_fee(size) else {
                    return Ok(LockOutcome::Refused(Flash::error(
                        back,
                        "The fee for this team is too large to charge.",
                    )));
                };

                diesel::update(teams::table.find(team.id))
                    .set(teams::is_locked.eq(true))
                    .execute(conn)?;
                // requests can no longer be answered
                diesel::update(
                    team_join_requests::table
                        .filter(team_join_requests::team_id.eq(team.id))
                        .filter(TeamJoinRequest::pending()),
                )
                .set(
                    team_join_requests::status
                        .eq(JoinRequestStatus::Rejected.as_str()),
                )
                .execute(conn)?;
                tracing::info!(team_id = team.id, size, "locked team");

                if event.is_free() {
                    let members = team_members::table
                        .filter(team_members::team_id.eq(team.id))
                        .select(team_members::user_id)
                        .load::<i64>(conn)?;
                    let enrolled = enrol(
                        conn,
                        &event,
                        Some(team.id),
                        &members,
                        Settlement::Free,
                    )?;
                    Ok(LockOutcome::Registered(team, event, enrolled))
                } else {
                    Ok(LockOutcome::MustPay(team, event, due))
                }
            })
        })
        .instrument(span.0.clone())
        .await?;

    match outcome {
        LockOutcome::Refused(flash) => Ok(flash),
        LockOutcome::Registered(team, event, enrolled) => {
            send_confirmations(&db, config, &event, enrolled);
            Ok(Flash::success(
                Redirect::to(team_url(&team)),
                format!("{} is locked and registered for {}.", team.name, event.name),
            ))
        }
        LockOutcome::MustPay(team, event, due) => {
            let order = begin_payment(
                &db,
                gateway.inner().as_ref(),
                config,
                &event,
                user_id,
                Some(team.id),
                due,
            )
            .instrument(span.0)
            .await?;
            Ok(Flash::new(
                Redirect::to(format!("/payments/{order}")),
                "info",
                "The team is locked. Pay the team's fee to complete registration.",
            ))
        }
    }
}

/// Starts another payment for a locked team whose earlier checkout was
/// abandoned or failed.
#[post("/teams/<team_id>/pay")]
pub async fn pay_for_team(
    team_id: &str,
    user: User,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let team_id = team_id.to_string();
    let user_id = user.id;
    let db = Arc::new(db);

    let outcome = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let (team, event) = load_team(conn, &team_id)?;
                if !has_permission(
                    Some(&user),
                    &Permission::ManageTeam(TeamRef(team.id)),
                    conn,
                )? {
                    return Err(Error::Forbidden(
                        "Only the team's creator may pay for it.".into(),
                    ));
                }
                let registered = select(exists(
                    participations::table
                        .filter(participations::team_id.eq(team.id)),
                ))
                .get_result::<bool>(conn)?;
                if !team.is_locked || event.is_free() || registered {
                    return Ok(Err(Flash::error(
                        Redirect::to(team_url(&team)),
                        "There is nothing to pay for this team.",
                    )));
                }
                let size = member_count(conn, team.id)?;
                let Some(due) = event.team_fee(size) else {
                    return Ok(Err(Flash::error(
                        Redirect::to(team_url(&team)),
                        "The fee for this team is too large to charge.",
                    )));
                };
                Ok(Ok((team, event, due)))
            })
        })
        .instrument(span.0.clone())
        .await?;

    let (team, event, due) = match outcome {
        Ok(owed) => owed,
        Err(flash) => return Ok(flash),
    };
    let order = begin_payment(
        &db,
        gateway.inner().as_ref(),
        config,
        &event,
        user_id,
        Some(team.id),
        due,
    )
    .instrument(span.0)
    .await?;
    Ok(Flash::new(
        Redirect::to(format!("/payments/{order}")),
        "info",
        "Pay the team's fee to complete registration.",
    ))
}

#[get("/teams/<team_id>")]
pub async fn team_page(
    team_id: &str,
    user: User,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let team_id = team_id.to_string();
    let viewer = user.clone();
    let (team, event, members, requests, registered) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let (team, event) = load_team(conn, &team_id)?;
                if !has_permission(
                    Some(&viewer),
                    &Permission::ViewTeam(TeamRef(team.id)),
                    conn,
                )? {
                    return Err(Error::Forbidden(
                        "Only members can see this team.".into(),
                    ));
                }

                let members = team_members::table
                    .inner_join(users::table)
                    .filter(team_members::team_id.eq(team.id))
                    .order_by(team_members::joined_at.asc())
                    .then_order_by(team_members::id.asc())
                    .select(User::as_select())
                    .load::<User>(conn)?;

                let requests = if team.is_led_by(viewer.id) {
                    team_join_requests::table
                        .inner_join(users::table)
                        .filter(team_join_requests::team_id.eq(team.id))
                        .filter(TeamJoinRequest::pending())
                        .order_by(team_join_requests::created_at.asc())
                        .select((TeamJoinRequest::as_select(), User::as_select()))
                        .load::<(TeamJoinRequest, User)>(conn)?
                } else {
                    Vec::new()
                };

                let registered = select(exists(
                    participations::table
                        .filter(participations::team_id.eq(team.id)),
                ))
                .get_result::<bool>(conn)?;

                Ok((team, event, members, requests, registered))
            })
        })
        .instrument(span.0)
        .await?;

    let is_creator = team.is_led_by(user.id);
    let is_member = members.iter().any(|m| m.id == user.id);
    let size = members.len() as i64;

    let markup = html! {
        (page_title(&team.name))
        p {
            "Team for " a href={"/events/" (event.public_id)} { (event.name) }
            " (" (event.team_size_label()) ")"
        }
        @if is_member {
            p {
                "Join code: "
                code class="fs-4" { (team.join_code) }
                @if !team.is_locked {
                    span class="text-muted ms-2" { "Share this with your teammates." }
                }
            }
        }
        @if team.is_locked {
            @if registered {
                div class="alert alert-success" { "This team is locked and registered." }
            } @else {
                div class="alert alert-warning" {
                    "This team is locked. Registration completes once the team fee is paid."
                    @if is_creator {
                        form method="post" action={"/teams/" (team.public_id) "/pay"} class="mt-2" {
                            button type="submit" class="btn btn-primary" { "Pay now" }
                        }
                    }
                }
            }
        } @else {
            div class="alert alert-info" {
                (size) " member(s). "
                @if event.team_size_ok(size) {
                    "The team can be locked."
                } @else {
                    "Teams need " (event.team_size_label()) " before they can be locked."
                }
            }
        }

        h2 class="h4 mt-4" { "Members" }
        ul class="list-group mb-4" {
            @for member in &members {
                li class="list-group-item d-flex justify-content-between align-items-center" {
                    span {
                        (member.username)
                        @if team.is_led_by(member.id) {
                            span class="badge text-bg-secondary ms-2" { "creator" }
                        }
                    }
                    @if is_creator && !team.is_locked && member.id != user.id {
                        form method="post" action={"/teams/" (team.public_id) "/members/" (member.public_id) "/remove"} {
                            button type="submit" class="btn btn-outline-danger btn-sm" { "Remove" }
                        }
                    }
                }
            }
        }

        @if is_creator && !team.is_locked {
            h2 class="h4" { "Join requests" }
            @if requests.is_empty() {
                p class="text-muted" { "No pending requests." }
            }
            ul class="list-group mb-4" {
                @for (request, requester) in &requests {
                    li class="list-group-item d-flex justify-content-between align-items-center" {
                        span {
                            (requester.username)
                            @if let Some(college) = &requester.college {
                                span class="text-muted" { " · " (college) }
                            }
                            small class="text-muted ms-2" { (format_datetime(&request.created_at)) }
                        }
                        span {
                            form method="post" action={"/teams/" (team.public_id) "/requests/" (request.public_id)} class="d-inline" {
                                input type="hidden" name="decision" value="accept";
                                button type="submit" class="btn btn-success btn-sm me-1" { "Accept" }
                            }
                            form method="post" action={"/teams/" (team.public_id) "/requests/" (request.public_id)} class="d-inline" {
                                input type="hidden" name="decision" value="reject";
                                button type="submit" class="btn btn-outline-danger btn-sm" { "Reject" }
                            }
                        }
                    }
                }
            }

            div class="d-flex gap-2" {
                form method="post" action={"/teams/" (team.public_id) "/lock"} {
                    button type="submit" class="btn btn-primary" disabled[!event.team_size_ok(size)] {
                        @if event.is_free() { "Lock team and register" } @else { "Lock team and pay" }
                    }
                }
                form method="post" action={"/teams/" (team.public_id) "/disband"} {
                    button type="submit" class="btn btn-outline-danger" { "Disband team" }
                }
            }
        }
        @if is_member && !is_creator && !team.is_locked {
            form method="post" action={"/teams/" (team.public_id) "/leave"} {
                button type="submit" class="btn btn-outline-danger" { "Leave team" }
            }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), Some(user)))
}
