use db::{
    idea::{Idea, IdeaStatus},
    schema::{ideas, users},
    user::User,
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
use ui::{format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    error::{Error, Result},
    util::{flash_of, gen_public_id},
};

#[get("/ideas")]
pub async fn ideas_page(
    user: Option<User>,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let user_id = user.as_ref().map(|user| user.id);
    let (approved, mine) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let approved = ideas::table
                    .left_join(users::table)
                    .filter(ideas::status.eq(IdeaStatus::Approved.as_str()))
                    .order_by(ideas::created_at.desc())
                    .select((Idea::as_select(), users::username.nullable()))
                    .load::<(Idea, Option<String>)>(conn)?;
                let mine = match user_id {
                    Some(user_id) => ideas::table
                        .filter(ideas::submitted_by.eq(user_id))
                        .filter(ideas::status.ne(IdeaStatus::Approved.as_str()))
                        .order_by(ideas::created_at.desc())
                        .select(Idea::as_select())
                        .load(conn)?,
                    None => Vec::new(),
                };
                Ok((approved, mine))
            })
        })
        .instrument(span.0)
        .await?;

    let markup = html! {
        (page_title("Ideas"))
        p class="lead" { "Suggestions from participants for future events." }
        @if approved.is_empty() {
            p class="text-muted" { "No ideas have been published yet." }
        }
        @for (idea, author) in &approved {
            div class="card mb-3" {
                div class="card-body" {
                    h5 class="card-title" { (idea.title) }
                    p class="card-text" style="white-space: pre-line" { (idea.description) }
                    p class="card-text" {
                        small class="text-muted" {
                            @if let Some(author) = author { (author) ", " }
                            (format_datetime(&idea.created_at))
                        }
                    }
                }
            }
        }

        @if user_id.is_some() {
            h2 class="h4 mt-5" { "Share an idea" }
            form method="post" action="/ideas" class="col-md-8" {
                div class="mb-3" {
                    label for="title" class="form-label" { "Title" }
                    input type="text" class="form-control" id="title" name="title" required minlength="3" maxlength="120";
                }
                div class="mb-3" {
                    label for="description" class="form-label" { "Description" }
                    textarea class="form-control" id="description" name="description" rows="4" required {}
                }
                button type="submit" class="btn btn-primary" { "Submit" }
            }
            @if !mine.is_empty() {
                h2 class="h5 mt-4" { "Your submissions" }
                ul class="list-group" {
                    @for idea in &mine {
                        li class="list-group-item d-flex justify-content-between" {
                            (idea.title)
                            span class="badge text-bg-secondary" { (idea.status) }
                        }
                    }
                }
            }
        } @else {
            p class="mt-4" { a href="/login" { "Log in" } " to share an idea." }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), user))
}

#[derive(FromForm, Serialize)]
pub struct IdeaForm {
    pub title: String,
    pub description: String,
}

#[post("/ideas", data = "<form>")]
pub async fn submit_idea(
    user: User,
    db: DbConn,
    form: Form<IdeaForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let title = form.title.trim().to_string();
    let description = form.description.trim().to_string();
    if !Idea::validate_title(&title) {
        return Ok(Flash::error(
            Redirect::to("/ideas"),
            "Titles should be between 3 and 120 characters long.",
        ));
    }
    if !Idea::validate_description(&description) {
        return Ok(Flash::error(
            Redirect::to("/ideas"),
            "Please describe your idea.",
        ));
    }

    db.run(move |conn| {
        diesel::insert_into(ideas::table)
            .values((
                ideas::public_id.eq(gen_public_id()),
                ideas::title.eq(title),
                ideas::description.eq(description),
                ideas::status.eq(IdeaStatus::Pending.as_str()),
                ideas::submitted_by.eq(user.id),
                ideas::created_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;

    Ok(Flash::success(
        Redirect::to("/ideas"),
        "Thanks! Your idea will appear here once the organisers have reviewed it.",
    ))
}
