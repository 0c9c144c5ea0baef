//! The attendance desk: staff scan a participant's pass (or type the code
//! printed under it) and the participation is marked attended.

use db::{
    participation::Participation,
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
use crate::{error::Result, qr};

#[get("/admin/attendance")]
pub async fn attendance_page(
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
) -> Markup {
    let body = html! {
        div class="col-md-6" {
            p { "Scan a participant's pass, or type the code shown beneath it." }
            form method="post" action="/admin/attendance" {
                div class="input-group mb-3" {
                    input type="text" class="form-control" name="payload" placeholder="PASS:…" autofocus required autocomplete="off";
                    button type="submit" class="btn btn-primary" { "Check in" }
                }
            }
        }
    };
    admin_page("Attendance", body, admin, flash)
}

#[derive(FromForm, Serialize, Debug)]
pub struct ScanForm {
    pub payload: String,
}

/// What the desk learns from a scan.
#[derive(Debug, PartialEq, Eq)]
pub enum CheckIn {
    Unknown,
    Admitted { name: String, event: String },
    AlreadyAdmitted { name: String, event: String },
}

pub fn check_in(
    conn: &mut db::PortalConnection,
    scanned: &str,
) -> QueryResult<CheckIn> {
    let Some(participation_id) = qr::parse(scanned) else {
        return Ok(CheckIn::Unknown);
    };
    conn.transaction(|conn| {
        let found = participations::table
            .inner_join(users::table)
            .inner_join(events::table)
            .filter(participations::public_id.eq(participation_id))
            .select((Participation::as_select(), users::username, events::name))
            .first::<(Participation, String, String)>(conn)
            .optional()?;

        let Some((participation, name, event)) = found else {
            return Ok(CheckIn::Unknown);
        };
        if participation.attended {
            return Ok(CheckIn::AlreadyAdmitted { name, event });
        }
        diesel::update(participations::table.find(participation.id))
            .set(participations::attended.eq(true))
            .execute(conn)?;
        tracing::info!(participation_id = participation.id, "checked in");
        Ok(CheckIn::Admitted { name, event })
    })
}

#[post("/admin/attendance", data = "<form>")]
pub async fn scan_pass(
    _admin: Admin,
    db: DbConn,
    form: Form<ScanForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let payload = form.into_inner().payload;
    let outcome = db
        .run(move |conn| check_in(conn, &payload))
        .instrument(span.0)
        .await?;

    let to = Redirect::to("/admin/attendance");
    Ok(match outcome {
        CheckIn::Unknown => {
            Flash::error(to, "No registration matches that pass.")
        }
        CheckIn::Admitted { name, event } => {
            Flash::success(to, format!("{name} checked in to {event}."))
        }
        CheckIn::AlreadyAdmitted { name, event } => Flash::warning(
            to,
            format!("{name} has already checked in to {event}."),
        ),
    })
}
