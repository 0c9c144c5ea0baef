//! Registering for events, and the passes that result.

use std::sync::Arc;

use db::{
    event::{format_amount, Event},
    participation::{Participation, PaymentStatus},
    payment::{OrderStatus, PaymentOrder},
    schema::{events, participations, payment_orders, teams, users},
    user::User,
    DbConn,
};
use diesel::{
    connection::LoadConnection, dsl::exists, prelude::*, select,
    sqlite::Sqlite,
};
use email::{send_mail, Mail};
use maud::{html, Markup, PreEscaped};
use rocket::{
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    checkout::begin_payment,
    config::{Gateway, PortalConfig},
    error::{Error, Result},
    notifications::notify,
    permissions::{has_permission, Permission},
    qr,
    resources::EventRef,
    util::{flash_of, gen_public_id},
};

/// How the participations being written were paid for.
#[derive(Debug, Clone, Copy)]
pub enum Settlement<'a> {
    Free,
    Paid { payment_ref: &'a str },
}

impl Settlement<'_> {
    fn status(&self) -> PaymentStatus {
        match self {
            Settlement::Free => PaymentStatus::Free,
            Settlement::Paid { .. } => PaymentStatus::Paid,
        }
    }

    fn payment_ref(&self) -> Option<&str> {
        match self {
            Settlement::Free => None,
            Settlement::Paid { payment_ref } => Some(payment_ref),
        }
    }
}

/// Writes a participation (with its pass) for each of `user_ids` and
/// notifies them. Users already registered for the event are skipped, so
/// this may safely run twice for the same payment. Returns the users that
/// were newly registered.
pub fn enrol(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    event: &Event,
    team_id: Option<i64>,
    user_ids: &[i64],
    settlement: Settlement<'_>,
) -> QueryResult<Vec<User>> {
    let mut enrolled = Vec::with_capacity(user_ids.len());
    for &user_id in user_ids {
        let public_id = gen_public_id();
        let n = diesel::insert_into(participations::table)
            .values((
                participations::public_id.eq(&public_id),
                participations::user_id.eq(user_id),
                participations::event_id.eq(event.id),
                participations::team_id.eq(team_id),
                participations::qr_payload.eq(qr::payload(&public_id)),
                participations::payment_ref.eq(settlement.payment_ref()),
                participations::payment_status
                    .eq(settlement.status().as_str()),
                participations::attended.eq(false),
                participations::created_at.eq(diesel::dsl::now),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?;

        if n == 1 {
            notify(
                conn,
                user_id,
                &format!(
                    "You are registered for {}. Your entry pass is on the My registrations page.",
                    event.name
                ),
            )?;
            enrolled.push(user_id);
        }
    }

    tracing::info!(
        event_id = event.id,
        team_id,
        count = enrolled.len(),
        status = settlement.status().as_str(),
        "wrote participations"
    );

    users::table
        .filter(users::id.eq_any(enrolled))
        .select(User::as_select())
        .load(conn)
}

/// Emails every newly registered user a confirmation.
pub fn send_confirmations(
    db: &Arc<DbConn>,
    config: &PortalConfig,
    event: &Event,
    users: Vec<User>,
) {
    let link = config.url("/registrations");
    for user in users {
        let when = format_datetime(&event.starts_at);
        let venue = event.venue.clone().unwrap_or_else(|| "TBA".to_string());
        send_mail(
            Mail {
                to: vec![(user.username.clone(), user.email.clone())],
                subject: format!("Registration confirmed: {}", event.name),
                html: html! {
                    p { "Hi " (user.username) "," }
                    p {
                        "You are registered for " b { (event.name) }
                        " (" (when) ", " (venue) ")."
                    }
                    p {
                        "Your entry pass is on "
                        a href=(link) { "your registrations page" }
                        ". Please have it ready at the venue."
                    }
                }
                .into_string(),
                text: format!(
                    "Hi {},\n\nYou are registered for {} ({}, {}).\n\nYour entry pass is at {}. Please have it ready at the venue.\n",
                    user.username, event.name, when, venue, link
                ),
            },
            db.clone(),
        );
    }
}

pub(crate) enum Outcome {
    Refused(String, &'static str),
    Registered(Event, Vec<User>),
    MustPay(Event),
}

#[post("/events/<event_id>/register")]
pub async fn register_individual(
    event_id: &str,
    user: User,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let db = Arc::new(db);
    let event_id = event_id.to_string();
    let user_id = user.id;

    let outcome = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let event = events::table
                    .filter(events::public_id.eq(&event_id))
                    .select(Event::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("event"))?;
                let back = format!("/events/{}", event.public_id);

                if event.is_team_event() {
                    return Ok(Outcome::Refused(
                        back,
                        "This is a team event: create or join a team to take part.",
                    ));
                }

                if !has_permission(
                    Some(&user),
                    &Permission::RegisterForEvent(EventRef(event.id)),
                    conn,
                )? {
                    return Ok(Outcome::Refused(
                        back,
                        "Registrations for this event are closed.",
                    ));
                }

                let already_registered = select(exists(
                    participations::table.filter(
                        Participation::of_user_in_event(user.id, event.id),
                    ),
                ))
                .get_result::<bool>(conn)?;
                if already_registered {
                    return Ok(Outcome::Refused(
                        back,
                        "You are already registered for this event.",
                    ));
                }

                if event.is_free() {
                    let enrolled =
                        enrol(conn, &event, None, &[user.id], Settlement::Free)?;
                    Ok(Outcome::Registered(event, enrolled))
                } else {
                    Ok(Outcome::MustPay(event))
                }
            })
        })
        .instrument(span.0.clone())
        .await?;

    match outcome {
        Outcome::Refused(back, msg) => {
            Ok(Flash::error(Redirect::to(back), msg))
        }
        Outcome::Registered(event, enrolled) => {
            send_confirmations(&db, config, &event, enrolled);
            Ok(Flash::success(
                Redirect::to("/registrations"),
                format!("You are registered for {}.", event.name),
            ))
        }
        Outcome::MustPay(event) => {
            let order = begin_payment(
                &db,
                gateway.inner().as_ref(),
                config,
                &event,
                user_id,
                None,
                event.fee,
            )
            .instrument(span.0)
            .await?;
            Ok(Flash::new(
                Redirect::to(format!("/payments/{order}")),
                "info",
                "Complete the payment to confirm your registration.",
            ))
        }
    }
}

#[get("/registrations")]
pub async fn my_registrations(
    user: User,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let user_id = user.id;
    let (registrations, unpaid) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let registrations = participations::table
                    .inner_join(events::table)
                    .left_join(teams::table)
                    .filter(participations::user_id.eq(user_id))
                    .order_by(events::starts_at.asc())
                    .select((
                        Participation::as_select(),
                        Event::as_select(),
                        teams::name.nullable(),
                    ))
                    .load::<(Participation, Event, Option<String>)>(conn)?;

                let unpaid = payment_orders::table
                    .inner_join(events::table)
                    .filter(payment_orders::user_id.eq(user_id))
                    .filter(
                        payment_orders::status
                            .eq(OrderStatus::Created.as_str()),
                    )
                    .order_by(payment_orders::created_at.desc())
                    .select((PaymentOrder::as_select(), events::name))
                    .load::<(PaymentOrder, String)>(conn)?;

                Ok((registrations, unpaid))
            })
        })
        .instrument(span.0)
        .await?;

    let markup = html! {
        (page_title("My registrations"))
        @if !unpaid.is_empty() {
            div class="alert alert-warning" {
                p { "These payments have not been completed:" }
                ul class="mb-0" {
                    @for (order, event_name) in &unpaid {
                        li {
                            (event_name) " (" (format_amount(order.amount)) ") "
                            a href={"/payments/" (order.public_id)} { "Pay now" }
                        }
                    }
                }
            }
        }
        @if registrations.is_empty() {
            p {
                "You have not registered for anything yet. "
                a href="/events" { "Browse events" } "."
            }
        }
        div class="row row-cols-1 row-cols-md-2 g-4" {
            @for (participation, event, team) in &registrations {
                div class="col" {
                    div class="card h-100" {
                        div class="card-body" {
                            h5 class="card-title" {
                                a href={"/events/" (event.public_id)} { (event.name) }
                            }
                            p class="card-text" {
                                (format_datetime(&event.starts_at))
                                @if let Some(venue) = &event.venue { " · " (venue) }
                            }
                            @if let Some(team) = team {
                                p class="card-text" { "Team: " (team) }
                            }
                            p class="card-text" {
                                span class="badge text-bg-secondary me-1" { (participation.payment_status) }
                                @if participation.attended {
                                    span class="badge text-bg-success" { "attended" }
                                }
                            }
                            @if let Some(svg) = participation.qr_payload.as_deref().and_then(qr::render_svg) {
                                div class="text-center" { (PreEscaped(svg)) }
                                p class="text-center text-muted small" { "Show this pass at the venue." }
                            }
                        }
                    }
                }
            }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), Some(user)))
}
