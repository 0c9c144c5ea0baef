use chrono::NaiveDateTime;
use db::{
    event::{format_amount, parse_amount, Event, MAX_FEE},
    participation::Participation,
    schema::{events, participations, teams, users},
    user::{Admin, User},
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::{
    form::Form,
    http::Header,
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{bool_cell, form_error, format_datetime};

use super::admin_page;
use crate::{
    config::PortalConfig,
    error::{Error, Result},
    events::fee_label,
    util::{gen_public_id, non_empty, parse_datetime_local, DATETIME_LOCAL},
};

/// Largest team any event may allow.
const MAX_TEAM_SIZE: i64 = 50;

fn find_event(
    conn: &mut db::PortalConnection,
    event_id: &str,
) -> Result<Event> {
    events::table
        .filter(events::public_id.eq(event_id))
        .select(Event::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("event"))
}

#[get("/admin/events")]
pub async fn events_page(
    admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let rows = db
        .run(|conn| {
            events::table
                .left_join(participations::table)
                .group_by(events::id)
                .order_by(events::starts_at.desc())
                .select((
                    Event::as_select(),
                    diesel::dsl::count(participations::id.nullable()),
                ))
                .load::<(Event, i64)>(conn)
        })
        .instrument(span.0)
        .await?;

    let body = html! {
        a class="btn btn-primary mb-3" href="/admin/events/new" { "New event" }
        table class="table align-middle" {
            thead {
                tr {
                    th { "Event" }
                    th { "Starts" }
                    th { "Fee" }
                    th { "Format" }
                    th { "Registered" }
                    th { "Registrations" }
                    th {}
                }
            }
            tbody {
                @for (event, registered) in &rows {
                    tr {
                        td { a href={"/events/" (event.public_id)} { (event.name) } }
                        td { (format_datetime(&event.starts_at)) }
                        td { (fee_label(event, &config.currency)) }
                        td { (event.team_size_label()) }
                        td {
                            a href={"/admin/events/" (event.public_id) "/participants"} { (registered) }
                        }
                        (bool_cell(event.registrations_open, "open", "closed"))
                        td class="text-end" {
                            form method="post" action={"/admin/events/" (event.public_id) "/registrations"} class="d-inline" {
                                button type="submit" class="btn btn-outline-secondary btn-sm me-1" {
                                    @if event.registrations_open { "Close" } @else { "Open" }
                                }
                            }
                            a class="btn btn-outline-primary btn-sm me-1" href={"/admin/events/" (event.public_id) "/edit"} { "Edit" }
                            a class="btn btn-outline-danger btn-sm" href={"/admin/events/" (event.public_id) "/delete"} { "Delete" }
                        }
                    }
                }
            }
        }
    };
    Ok(admin_page("Events", body, admin, flash))
}

#[derive(FromForm, Serialize, Debug, Clone, Default)]
pub struct EventForm {
    pub name: String,
    pub description: String,
    pub venue: Option<String>,
    /// `YYYY-MM-DDTHH:MM`
    pub starts_at: String,
    pub ends_at: String,
    /// Decimal, in major units.
    pub fee: String,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub registrations_open: bool,
}

impl EventForm {
    fn of_event(event: &Event) -> EventForm {
        EventForm {
            name: event.name.clone(),
            description: event.description.clone(),
            venue: event.venue.clone(),
            starts_at: event.starts_at.format(DATETIME_LOCAL).to_string(),
            ends_at: event.ends_at.format(DATETIME_LOCAL).to_string(),
            fee: format_amount(event.fee),
            min_team_size: event.min_team_size,
            max_team_size: event.max_team_size,
            registrations_open: event.registrations_open,
        }
    }
}

/// An event form that passed validation.
#[derive(Debug, PartialEq)]
pub struct ValidEvent {
    name: String,
    description: String,
    venue: Option<String>,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    fee: i64,
    min_team_size: i64,
    max_team_size: i64,
    registrations_open: bool,
}

pub fn validate_event(form: &EventForm) -> std::result::Result<ValidEvent, &'static str> {
    let name = form.name.trim();
    if name.is_empty() || name.chars().count() > 120 {
        return Err("Event names should be between 1 and 120 characters long.");
    }
    let description = form.description.trim();
    if description.is_empty() {
        return Err("Please describe the event.");
    }
    let (Some(starts_at), Some(ends_at)) = (
        parse_datetime_local(&form.starts_at),
        parse_datetime_local(&form.ends_at),
    ) else {
        return Err("Please enter the start and end times.");
    };
    if ends_at < starts_at {
        return Err("The event cannot end before it starts.");
    }
    let Some(fee) = parse_amount(&form.fee) else {
        return Err("The fee should be an amount such as 150 or 99.50.");
    };
    if fee > MAX_FEE {
        return Err("The fee is larger than the portal can charge.");
    }
    if form.min_team_size < 1
        || form.min_team_size > form.max_team_size
        || form.max_team_size > MAX_TEAM_SIZE
    {
        return Err("Team sizes should satisfy 1 ≤ minimum ≤ maximum ≤ 50.");
    }

    Ok(ValidEvent {
        name: name.to_string(),
        description: description.to_string(),
        venue: non_empty(form.venue.as_deref()),
        starts_at,
        ends_at,
        fee,
        min_team_size: form.min_team_size,
        max_team_size: form.max_team_size,
        registrations_open: form.registrations_open,
    })
}

fn event_form(action: &str, form: &EventForm, error: Option<&str>) -> Markup {
    html! {
        div class="col-md-8" {
            (form_error(error))
            form method="post" action=(action) {
                div class="mb-3" {
                    label for="name" class="form-label" { "Name" }
                    input type="text" class="form-control" id="name" name="name" value=(form.name) required;
                }
                div class="mb-3" {
                    label for="description" class="form-label" { "Description" }
                    textarea class="form-control" id="description" name="description" rows="5" required { (form.description) }
                }
                div class="mb-3" {
                    label for="venue" class="form-label" { "Venue" }
                    input type="text" class="form-control" id="venue" name="venue" value=(form.venue.as_deref().unwrap_or_default());
                }
                div class="row" {
                    div class="col mb-3" {
                        label for="starts_at" class="form-label" { "Starts" }
                        input type="datetime-local" class="form-control" id="starts_at" name="starts_at" value=(form.starts_at) required;
                    }
                    div class="col mb-3" {
                        label for="ends_at" class="form-label" { "Ends" }
                        input type="datetime-local" class="form-control" id="ends_at" name="ends_at" value=(form.ends_at) required;
                    }
                }
                div class="row" {
                    div class="col mb-3" {
                        label for="fee" class="form-label" { "Fee per participant (0 for free)" }
                        input type="text" inputmode="decimal" class="form-control" id="fee" name="fee" value=(form.fee);
                    }
                    div class="col mb-3" {
                        label for="min_team_size" class="form-label" { "Minimum team size" }
                        input type="number" min="1" max="50" class="form-control" id="min_team_size" name="min_team_size" value=(form.min_team_size);
                    }
                    div class="col mb-3" {
                        label for="max_team_size" class="form-label" { "Maximum team size (1 for individual events)" }
                        input type="number" min="1" max="50" class="form-control" id="max_team_size" name="max_team_size" value=(form.max_team_size);
                    }
                }
                div class="form-check mb-3" {
                    input class="form-check-input" type="checkbox" id="registrations_open" name="registrations_open" value="true" checked[form.registrations_open];
                    label class="form-check-label" for="registrations_open" { "Registrations open" }
                }
                button type="submit" class="btn btn-primary" { "Save" }
            }
        }
    }
}

#[get("/admin/events/new")]
pub async fn new_event_page(admin: Admin) -> Markup {
    let form = EventForm {
        fee: "0".to_string(),
        min_team_size: 1,
        max_team_size: 1,
        registrations_open: true,
        ..EventForm::default()
    };
    admin_page(
        "New event",
        event_form("/admin/events/new", &form, None),
        admin,
        None,
    )
}

#[post("/admin/events/new", data = "<form>")]
pub async fn create_event(
    admin: Admin,
    db: DbConn,
    form: Form<EventForm>,
    span: TracingSpan,
) -> Result<std::result::Result<Flash<Redirect>, Markup>> {
    let valid = match validate_event(&form) {
        Ok(valid) => valid,
        Err(msg) => {
            return Ok(Err(admin_page(
                "New event",
                event_form("/admin/events/new", &form, Some(msg)),
                admin,
                None,
            )))
        }
    };

    let name = valid.name.clone();
    let public_id = db
        .run(move |conn| {
            diesel::insert_into(events::table)
                .values((
                    events::public_id.eq(gen_public_id()),
                    events::name.eq(valid.name),
                    events::description.eq(valid.description),
                    events::venue.eq(valid.venue),
                    events::starts_at.eq(valid.starts_at),
                    events::ends_at.eq(valid.ends_at),
                    events::fee.eq(valid.fee),
                    events::min_team_size.eq(valid.min_team_size),
                    events::max_team_size.eq(valid.max_team_size),
                    events::registrations_open.eq(valid.registrations_open),
                    events::created_at.eq(diesel::dsl::now),
                ))
                .returning(events::public_id)
                .get_result::<String>(conn)
        })
        .instrument(span.0)
        .await?;
    tracing::info!(event = %public_id, "created event");

    Ok(Ok(Flash::success(
        Redirect::to("/admin/events"),
        format!("Created {name}."),
    )))
}

#[get("/admin/events/<event_id>/edit")]
pub async fn edit_event_page(
    event_id: &str,
    admin: Admin,
    db: DbConn,
) -> Result<Markup> {
    let event_id = event_id.to_string();
    let event = db.run(move |conn| find_event(conn, &event_id)).await?;
    Ok(admin_page(
        &format!("Edit {}", event.name),
        event_form(
            &format!("/admin/events/{}/edit", event.public_id),
            &EventForm::of_event(&event),
            None,
        ),
        admin,
        None,
    ))
}

#[post("/admin/events/<event_id>/edit", data = "<form>")]
pub async fn update_event(
    event_id: &str,
    admin: Admin,
    db: DbConn,
    form: Form<EventForm>,
    span: TracingSpan,
) -> Result<std::result::Result<Flash<Redirect>, Markup>> {
    let valid = match validate_event(&form) {
        Ok(valid) => valid,
        Err(msg) => {
            return Ok(Err(admin_page(
                "Edit event",
                event_form(
                    &format!("/admin/events/{event_id}/edit"),
                    &form,
                    Some(msg),
                ),
                admin,
                None,
            )))
        }
    };

    let event_id = event_id.to_string();
    let name = valid.name.clone();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let event = find_event(conn, &event_id)?;
            diesel::update(events::table.find(event.id))
                .set((
                    events::name.eq(valid.name),
                    events::description.eq(valid.description),
                    events::venue.eq(valid.venue),
                    events::starts_at.eq(valid.starts_at),
                    events::ends_at.eq(valid.ends_at),
                    events::fee.eq(valid.fee),
                    events::min_team_size.eq(valid.min_team_size),
                    events::max_team_size.eq(valid.max_team_size),
                    events::registrations_open.eq(valid.registrations_open),
                ))
                .execute(conn)?;
            Ok(())
        })
    })
    .instrument(span.0)
    .await?;

    Ok(Ok(Flash::success(
        Redirect::to("/admin/events"),
        format!("Saved {name}."),
    )))
}

#[get("/admin/events/<event_id>/delete")]
pub async fn delete_event_page(
    event_id: &str,
    admin: Admin,
    db: DbConn,
) -> Result<Markup> {
    let event_id = event_id.to_string();
    let (event, registered) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let event = find_event(conn, &event_id)?;
                let registered = participations::table
                    .filter(participations::event_id.eq(event.id))
                    .count()
                    .get_result::<i64>(conn)?;
                Ok((event, registered))
            })
        })
        .await?;

    let body = html! {
        div class="alert alert-danger" {
            p {
                "Deleting " b { (event.name) } " also deletes its "
                (registered) " registration(s), its teams and its payment records. This cannot be undone."
            }
            form method="post" action={"/admin/events/" (event.public_id) "/delete"} {
                button type="submit" class="btn btn-danger" { "Delete event" }
                a class="btn btn-link" href="/admin/events" { "Cancel" }
            }
        }
    };
    Ok(admin_page("Delete event", body, admin, None))
}

#[post("/admin/events/<event_id>/delete")]
pub async fn delete_event(
    event_id: &str,
    _admin: Admin,
    db: DbConn,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let event_id = event_id.to_string();
    let name = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let event = find_event(conn, &event_id)?;
                diesel::delete(events::table.find(event.id)).execute(conn)?;
                tracing::info!(event_id = event.id, "deleted event");
                Ok(event.name)
            })
        })
        .instrument(span.0)
        .await?;
    Ok(Flash::success(
        Redirect::to("/admin/events"),
        format!("Deleted {name}."),
    ))
}

#[post("/admin/events/<event_id>/registrations")]
pub async fn toggle_registrations(
    event_id: &str,
    _admin: Admin,
    db: DbConn,
) -> Result<Flash<Redirect>> {
    let event_id = event_id.to_string();
    let event = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let event = find_event(conn, &event_id)?;
                diesel::update(events::table.find(event.id))
                    .set(events::registrations_open.eq(!event.registrations_open))
                    .execute(conn)?;
                Ok(event)
            })
        })
        .await?;
    let state = if event.registrations_open { "closed" } else { "opened" };
    Ok(Flash::success(
        Redirect::to("/admin/events"),
        format!("Registrations for {} {state}.", event.name),
    ))
}

type ParticipantRow = (Participation, User, Option<String>);

fn load_participants(
    conn: &mut db::PortalConnection,
    event_id: &str,
) -> Result<(Event, Vec<ParticipantRow>)> {
    let event = find_event(conn, event_id)?;
    let rows = participations::table
        .inner_join(users::table)
        .left_join(teams::table)
        .filter(participations::event_id.eq(event.id))
        .order_by(teams::name.asc())
        .then_order_by(users::username.asc())
        .select((
            Participation::as_select(),
            User::as_select(),
            teams::name.nullable(),
        ))
        .load::<ParticipantRow>(conn)?;
    Ok((event, rows))
}

#[get("/admin/events/<event_id>/participants")]
pub async fn participants_page(
    event_id: &str,
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let event_id = event_id.to_string();
    let (event, rows) = db
        .run(move |conn| load_participants(conn, &event_id))
        .instrument(span.0)
        .await?;

    let attended = rows.iter().filter(|(p, _, _)| p.attended).count();
    let body = html! {
        h2 class="h4" { (event.name) }
        p {
            (rows.len()) " registered, " (attended) " attended. "
            a href={"/admin/events/" (event.public_id) "/participants.csv"} { "Download CSV" }
        }
        table class="table table-sm align-middle" {
            thead {
                tr {
                    th { "Name" }
                    th { "Email" }
                    th { "Phone" }
                    th { "College" }
                    @if event.is_team_event() { th { "Team" } }
                    th { "Payment" }
                    th { "Attended" }
                    th {}
                }
            }
            tbody {
                @for (participation, user, team) in &rows {
                    tr {
                        td { (user.username) }
                        td { (user.email) }
                        td { (user.phone.as_deref().unwrap_or_default()) }
                        td { (user.college.as_deref().unwrap_or_default()) }
                        @if event.is_team_event() {
                            td { (team.as_deref().unwrap_or_default()) }
                        }
                        td {
                            (participation.payment_status)
                            @if let Some(payment_ref) = &participation.payment_ref {
                                br; small class="text-muted" { (payment_ref) }
                            }
                        }
                        (bool_cell(participation.attended, "yes", "no"))
                        td {
                            form method="post" action={"/admin/participations/" (participation.public_id) "/attendance"} {
                                button type="submit" class="btn btn-outline-secondary btn-sm" {
                                    @if participation.attended { "Unmark" } @else { "Mark attended" }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    Ok(admin_page("Participants", body, admin, flash))
}

/// Quotes a CSV field when it contains a separator, quote or line break.
/// Fields starting with a formula character are prefixed with `'` so that
/// spreadsheets treat them as text.
pub fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

pub fn participants_csv(rows: &[ParticipantRow]) -> String {
    let mut out = String::from(
        "name,email,phone,college,team,payment_status,payment_ref,attended,registered_at\r\n",
    );
    for (participation, user, team) in rows {
        let fields = [
            user.username.as_str(),
            user.email.as_str(),
            user.phone.as_deref().unwrap_or_default(),
            user.college.as_deref().unwrap_or_default(),
            team.as_deref().unwrap_or_default(),
            participation.payment_status.as_str(),
            participation.payment_ref.as_deref().unwrap_or_default(),
            if participation.attended { "yes" } else { "no" },
            &participation.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

#[derive(Responder)]
#[response(content_type = "text/csv")]
pub struct CsvDownload {
    body: String,
    disposition: Header<'static>,
}

#[get("/admin/events/<event_id>/participants.csv")]
pub async fn participants_csv_download(
    event_id: &str,
    _admin: Admin,
    db: DbConn,
) -> Result<CsvDownload> {
    let event_id = event_id.to_string();
    let (event, rows) = db
        .run(move |conn| load_participants(conn, &event_id))
        .await?;
    let filename: String = event
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Ok(CsvDownload {
        body: participants_csv(&rows),
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}_participants.csv\""),
        ),
    })
}

#[post("/admin/participations/<participation_id>/attendance")]
pub async fn toggle_attendance(
    participation_id: &str,
    _admin: Admin,
    db: DbConn,
) -> Result<Flash<Redirect>> {
    let participation_id = participation_id.to_string();
    let (event_id, attended) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let (participation, event_id) = participations::table
                    .inner_join(events::table)
                    .filter(participations::public_id.eq(&participation_id))
                    .select((Participation::as_select(), events::public_id))
                    .first::<(Participation, String)>(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("registration"))?;
                diesel::update(participations::table.find(participation.id))
                    .set(participations::attended.eq(!participation.attended))
                    .execute(conn)?;
                Ok((event_id, !participation.attended))
            })
        })
        .await?;
    Ok(Flash::success(
        Redirect::to(format!("/admin/events/{event_id}/participants")),
        if attended {
            "Marked as attended."
        } else {
            "Attendance removed."
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EventForm {
        EventForm {
            name: "Hackathon".to_string(),
            description: "24 hours of code".to_string(),
            venue: Some("  ".to_string()),
            starts_at: "2025-10-03T09:00".to_string(),
            ends_at: "2025-10-04T09:00".to_string(),
            fee: "100".to_string(),
            min_team_size: 2,
            max_team_size: 4,
            registrations_open: true,
        }
    }

    #[test]
    fn valid_events_are_accepted() {
        let valid = validate_event(&form()).unwrap();
        assert_eq!(valid.fee, 10000);
        assert_eq!(valid.venue, None);
    }

    #[test]
    fn bad_events_are_refused() {
        let mut f = form();
        f.ends_at = "2025-10-02T09:00".to_string();
        assert!(validate_event(&f).is_err());

        let mut f = form();
        f.min_team_size = 5;
        assert!(validate_event(&f).is_err());

        let mut f = form();
        f.fee = "12.345".to_string();
        assert!(validate_event(&f).is_err());

        let mut f = form();
        f.fee = "92233720368547758".to_string();
        assert!(validate_event(&f).is_err());
    }

    #[test]
    fn csv_fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("=1+1"), "'=1+1");
    }
}
