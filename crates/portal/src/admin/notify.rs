use db::{
    event::Event,
    schema::{events, participations, users},
    user::Admin,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::{
    form::Form,
    request::FlashMessage,
    response::{Flash, Redirect},
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;

use super::admin_page;
use crate::{
    error::{Error, Result},
    notifications::notify,
};

const EVERYONE: &str = "all";

#[get("/admin/notify")]
pub async fn notify_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup> {
    let all_events = db
        .run(|conn| {
            events::table
                .order_by(events::starts_at.desc())
                .select(Event::as_select())
                .load::<Event>(conn)
        })
        .await?;

    let body = html! {
        div class="col-md-8" {
            form method="post" action="/admin/notify" {
                div class="mb-3" {
                    label for="audience" class="form-label" { "Send to" }
                    select class="form-select" id="audience" name="audience" {
                        option value=(EVERYONE) { "Every user" }
                        @for event in &all_events {
                            option value=(event.public_id) { "Participants of " (event.name) }
                        }
                    }
                }
                div class="mb-3" {
                    label for="message" class="form-label" { "Message" }
                    textarea class="form-control" id="message" name="message" rows="3" maxlength="500" required {}
                }
                button type="submit" class="btn btn-primary" { "Send" }
            }
        }
    };
    Ok(admin_page("Send a notification", body, admin, flash))
}

#[derive(FromForm, Serialize, Debug)]
pub struct BroadcastForm {
    /// `all`, or the public id of an event.
    pub audience: String,
    pub message: String,
}

/// Sends `message` to every user in the audience and returns how many were
/// notified.
pub fn broadcast(
    conn: &mut db::PortalConnection,
    audience: &str,
    message: &str,
) -> Result<usize, Error> {
    conn.transaction(|conn| {
        let recipients: Vec<i64> = if audience == EVERYONE {
            users::table.select(users::id).load(conn)?
        } else {
            let event_id = events::table
                .filter(events::public_id.eq(audience))
                .select(events::id)
                .first::<i64>(conn)
                .optional()?
                .ok_or_else(|| Error::not_found("event"))?;
            participations::table
                .filter(participations::event_id.eq(event_id))
                .select(participations::user_id)
                .distinct()
                .load(conn)?
        };
        for user_id in &recipients {
            notify(conn, *user_id, message)?;
        }
        Ok(recipients.len())
    })
}

#[post("/admin/notify", data = "<form>")]
pub async fn send_notification(
    _admin: Admin,
    db: DbConn,
    form: Form<BroadcastForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let BroadcastForm { audience, message } = form.into_inner();
    let message = message.trim().to_string();
    if message.is_empty() || message.chars().count() > 500 {
        return Ok(Flash::error(
            Redirect::to("/admin/notify"),
            "Messages should be between 1 and 500 characters long.",
        ));
    }

    let sent = db
        .run(move |conn| broadcast(conn, &audience, &message))
        .instrument(span.0)
        .await?;
    tracing::info!(recipients = sent, "sent broadcast notification");

    Ok(Flash::success(
        Redirect::to("/admin/notify"),
        format!("Notified {sent} user(s)."),
    ))
}
