use db::{
    idea::{Idea, IdeaStatus},
    schema::{ideas, users},
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
use ui::format_datetime;

use super::admin_page;
use crate::{
    error::{Error, Result},
    notifications::notify,
};

#[get("/admin/ideas")]
pub async fn ideas_admin_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let all = db
        .run(|conn| {
            ideas::table
                .left_join(users::table)
                .order_by(ideas::created_at.desc())
                .select((
                    Idea::as_select(),
                    users::username.nullable(),
                    users::email.nullable(),
                ))
                .load::<(Idea, Option<String>, Option<String>)>(conn)
        })
        .instrument(span.0)
        .await?;

    let body = html! {
        @if all.is_empty() {
            p class="text-muted" { "Nobody has submitted an idea yet." }
        }
        @for (idea, author, email) in &all {
            @let badge = match idea.status() {
                Some(IdeaStatus::Approved) => "badge text-bg-success",
                Some(IdeaStatus::Rejected) => "badge text-bg-danger",
                _ => "badge text-bg-warning",
            };
            div class="card mb-3" {
                div class="card-body" {
                    h5 class="card-title" {
                        (idea.title) " "
                        span class=(badge) { (idea.status) }
                    }
                    p class="card-text" style="white-space: pre-line" { (idea.description) }
                    p class="card-text" {
                        small class="text-muted" {
                            @match (author, email) {
                                (Some(author), Some(email)) => { (author) " <" (email) ">, " }
                                _ => { "deleted account, " }
                            }
                            (format_datetime(&idea.created_at))
                        }
                    }
                    div class="d-flex gap-2" {
                        @for (status, label, class) in [
                            (IdeaStatus::Approved, "Approve", "btn btn-outline-success btn-sm"),
                            (IdeaStatus::Rejected, "Reject", "btn btn-outline-warning btn-sm"),
                        ] {
                            @if idea.status() != Some(status) {
                                form method="post" action={"/admin/ideas/" (idea.public_id) "/status"} {
                                    input type="hidden" name="status" value=(status.as_str());
                                    button type="submit" class=(class) { (label) }
                                }
                            }
                        }
                        form method="post" action={"/admin/ideas/" (idea.public_id) "/delete"} {
                            button type="submit" class="btn btn-outline-danger btn-sm" { "Delete" }
                        }
                    }
                }
            }
        }
    };
    Ok(admin_page("Ideas", body, admin, flash))
}

#[derive(FromForm, Serialize, Debug)]
pub struct IdeaStatusForm {
    pub status: String,
}

#[post("/admin/ideas/<idea_id>/status", data = "<form>")]
pub async fn set_idea_status(
    idea_id: &str,
    _admin: Admin,
    db: DbConn,
    form: Form<IdeaStatusForm>,
) -> Result<Flash<Redirect>> {
    let status = match IdeaStatus::parse(&form.status) {
        Some(status @ (IdeaStatus::Approved | IdeaStatus::Rejected)) => status,
        _ => {
            return Ok(Flash::error(
                Redirect::to("/admin/ideas"),
                "Ideas can only be approved or rejected.",
            ))
        }
    };

    let idea_id = idea_id.to_string();
    let title = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let idea = ideas::table
                    .filter(ideas::public_id.eq(&idea_id))
                    .select(Idea::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("idea"))?;
                diesel::update(ideas::table.find(idea.id))
                    .set(ideas::status.eq(status.as_str()))
                    .execute(conn)?;
                if let Some(author) = idea.submitted_by {
                    notify(
                        conn,
                        author,
                        &format!(
                            "Your idea \"{}\" was {}.",
                            idea.title,
                            status.as_str()
                        ),
                    )?;
                }
                Ok(idea.title)
            })
        })
        .await?;

    Ok(Flash::success(
        Redirect::to("/admin/ideas"),
        format!("\"{title}\" is now {}.", status.as_str()),
    ))
}

#[post("/admin/ideas/<idea_id>/delete")]
pub async fn delete_idea(
    idea_id: &str,
    _admin: Admin,
    db: DbConn,
) -> Result<Flash<Redirect>> {
    let idea_id = idea_id.to_string();
    let deleted = db
        .run(move |conn| {
            diesel::delete(ideas::table.filter(ideas::public_id.eq(&idea_id)))
                .execute(conn)
        })
        .await?;
    if deleted == 0 {
        return Err(Error::not_found("idea"));
    }
    Ok(Flash::success(Redirect::to("/admin/ideas"), "Idea deleted."))
}
