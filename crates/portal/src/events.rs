use chrono::Utc;
use db::{
    event::{format_amount, Event},
    participation::Participation,
    schema::{events, participations, team_join_requests, team_members, teams},
    settings::SiteSettings,
    team::{Team, TeamJoinRequest, TeamMember},
    user::User,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::{request::FlashMessage, State};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    config::PortalConfig,
    error::{Error, Result},
    util::flash_of,
};

pub fn fee_label(event: &Event, currency: &str) -> String {
    if event.is_free() {
        "Free".to_string()
    } else if event.is_team_event() {
        format!("{currency} {} per member", format_amount(event.fee))
    } else {
        format!("{currency} {}", format_amount(event.fee))
    }
}

pub fn event_card(event: &Event, currency: &str) -> Markup {
    html! {
        div class="card h-100" {
            div class="card-body" {
                h5 class="card-title" {
                    a href={"/events/" (event.public_id)} { (event.name) }
                }
                h6 class="card-subtitle mb-2 text-muted" {
                    (format_datetime(&event.starts_at))
                    @if let Some(venue) = &event.venue { " · " (venue) }
                }
                p class="card-text mb-1" { (fee_label(event, currency)) }
                p class="card-text" { (event.team_size_label()) }
                @if !event.registrations_open {
                    span class="badge text-bg-secondary" { "Registrations closed" }
                }
            }
        }
    }
}

#[get("/events")]
pub async fn list_events(
    user: Option<User>,
    db: DbConn,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let all = db
        .run(|conn| {
            events::table
                .order_by(events::starts_at.asc())
                .select(Event::as_select())
                .load(conn)
        })
        .instrument(span.0)
        .await?;

    let now = Utc::now().naive_utc();
    let (upcoming, mut past): (Vec<_>, Vec<_>) =
        all.into_iter().partition(|event| event.ends_at >= now);
    past.reverse();

    let markup = html! {
        (page_title("Events"))
        @if upcoming.is_empty() {
            p class="text-muted" { "No upcoming events have been announced yet." }
        }
        div class="row row-cols-1 row-cols-md-3 g-4 mb-5" {
            @for event in &upcoming {
                div class="col" { (event_card(event, &config.currency)) }
            }
        }
        @if !past.is_empty() {
            h2 class="h4" { "Past events" }
            div class="row row-cols-1 row-cols-md-3 g-4" {
                @for event in &past {
                    div class="col" { (event_card(event, &config.currency)) }
                }
            }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), user))
}

/// Where the logged-in user stands with respect to an event.
struct Standing {
    participation: Option<Participation>,
    team: Option<Team>,
    /// Teams the user has asked to join and not yet heard back from.
    pending: Vec<Team>,
}

#[get("/events/<event_id>")]
pub async fn event_detail(
    event_id: &str,
    user: Option<User>,
    db: DbConn,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let event_id = event_id.to_string();
    let user_id = user.as_ref().map(|user| user.id);
    let (event, settings, standing) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let event = events::table
                    .filter(events::public_id.eq(&event_id))
                    .select(Event::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("event"))?;
                let settings = SiteSettings::load(conn)?;

                let standing = match user_id {
                    Some(user_id) => {
                        let participation = participations::table
                            .filter(Participation::of_user_in_event(
                                user_id, event.id,
                            ))
                            .select(Participation::as_select())
                            .first(conn)
                            .optional()?;
                        let team = team_members::table
                            .inner_join(teams::table)
                            .filter(TeamMember::of_user_in_event(
                                user_id, event.id,
                            ))
                            .select(Team::as_select())
                            .first(conn)
                            .optional()?;
                        let pending = team_join_requests::table
                            .inner_join(teams::table)
                            .filter(team_join_requests::user_id.eq(user_id))
                            .filter(teams::event_id.eq(event.id))
                            .filter(TeamJoinRequest::pending())
                            .select(Team::as_select())
                            .load(conn)?;
                        Some(Standing {
                            participation,
                            team,
                            pending,
                        })
                    }
                    None => None,
                };
                Ok((event, settings, standing))
            })
        })
        .instrument(span.0)
        .await?;

    let open = event.registrations_open && settings.registrations_enabled;
    let markup = html! {
        (page_title(&event.name))
        div class="row" {
            div class="col-md-8" {
                p style="white-space: pre-line" { (event.description) }
            }
            div class="col-md-4" {
                ul class="list-group mb-4" {
                    li class="list-group-item" { "Starts: " (format_datetime(&event.starts_at)) }
                    li class="list-group-item" { "Ends: " (format_datetime(&event.ends_at)) }
                    @if let Some(venue) = &event.venue {
                        li class="list-group-item" { "Venue: " (venue) }
                    }
                    li class="list-group-item" { "Fee: " (fee_label(&event, &config.currency)) }
                    li class="list-group-item" { "Format: " (event.team_size_label()) }
                }
            }
        }
        (actions(&event, open, standing.as_ref()))
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), user))
}

fn actions(event: &Event, open: bool, standing: Option<&Standing>) -> Markup {
    let Some(standing) = standing else {
        return html! {
            p {
                a href="/login" { "Log in" } " or "
                a href="/register" { "create an account" } " to register."
            }
        };
    };

    html! {
        @if let Some(participation) = &standing.participation {
            div class="alert alert-success" {
                "You are registered (" (participation.payment_status) "). "
                a href="/registrations" { "View your entry pass" } "."
            }
        }
        @if let Some(team) = &standing.team {
            div class="alert alert-info" {
                "You are in the team " b { (team.name) } ". "
                a href={"/teams/" (team.public_id)} { "Go to the team page" } "."
            }
        }
        @if standing.participation.is_none() && standing.team.is_none() {
            @if !open {
                div class="alert alert-secondary" { "Registrations for this event are closed." }
            } @else if event.is_team_event() {
                @for team in &standing.pending {
                    div class="alert alert-warning" {
                        "Your request to join " b { (team.name) } " is awaiting the team creator's decision."
                    }
                }
                div class="row g-4" {
                    div class="col-md-6" {
                        h2 class="h5" { "Create a team" }
                        form method="post" action={"/events/" (event.public_id) "/teams"} {
                            div class="mb-3" {
                                label for="name" class="form-label" { "Team name" }
                                input type="text" class="form-control" id="name" name="name" required minlength="3" maxlength="40";
                            }
                            button type="submit" class="btn btn-primary" { "Create team" }
                        }
                    }
                    div class="col-md-6" {
                        h2 class="h5" { "Join a team" }
                        form method="post" action="/teams/join" {
                            div class="mb-3" {
                                label for="code" class="form-label" { "Join code" }
                                input type="text" class="form-control text-uppercase" id="code" name="code" required maxlength="6";
                            }
                            button type="submit" class="btn btn-outline-primary" { "Ask to join" }
                        }
                    }
                }
            } @else {
                form method="post" action={"/events/" (event.public_id) "/register"} {
                    button type="submit" class="btn btn-primary btn-lg" {
                        @if event.is_free() { "Register" } @else { "Register and pay" }
                    }
                }
            }
        }
    }
}
