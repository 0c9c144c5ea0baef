use db::{schema::users, user::User, DbConn};
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
use ui::{form_error, format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    error::Result,
    notifications::unread_count,
    util::{flash_of, non_empty},
};

fn account_page(
    user: User,
    unread: i64,
    error: Option<&str>,
    flash: Option<FlashMessage<'_>>,
) -> Markup {
    let markup = html! {
        (page_title("Your account"))
        p {
            a href="/notifications" {
                @if unread > 0 {
                    span class="badge text-bg-primary me-1" { (unread) }
                    "unread notification(s)"
                } @else {
                    "No unread notifications"
                }
            }
        }
        div class="col-md-6" {
            (form_error(error))
            form method="post" action="/user" {
                div class="mb-3" {
                    label class="form-label" { "Email" }
                    input type="email" class="form-control" value=(user.email) disabled;
                }
                div class="mb-3" {
                    label for="username" class="form-label" { "Name" }
                    input type="text" class="form-control" id="username" name="username" value=(user.username) required;
                }
                div class="mb-3" {
                    label for="phone" class="form-label" { "Phone" }
                    input type="tel" class="form-control" id="phone" name="phone" value=(user.phone.as_deref().unwrap_or_default());
                }
                div class="mb-3" {
                    label for="college" class="form-label" { "College" }
                    input type="text" class="form-control" id="college" name="college" value=(user.college.as_deref().unwrap_or_default());
                }
                button type="submit" class="btn btn-primary" { "Save" }
            }
            p class="mt-3 text-muted" {
                "Member since " (format_datetime(&user.created_at)) ". "
                a href="/user/password" { "Change your password" } "."
            }
        }
    };
    page_of_body_and_flash_msg(markup, flash_of(flash), Some(user))
}

#[get("/user")]
pub async fn profile_page(
    user: User,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup> {
    let user_id = user.id;
    let unread = db.run(move |conn| unread_count(conn, user_id)).await?;
    Ok(account_page(user, unread, None, flash))
}

#[derive(FromForm, Serialize)]
pub struct ProfileForm {
    pub username: String,
    pub phone: Option<String>,
    pub college: Option<String>,
}

#[post("/user", data = "<form>")]
pub async fn update_profile(
    user: User,
    db: DbConn,
    form: Form<ProfileForm>,
    span: TracingSpan,
) -> Result<std::result::Result<Flash<Redirect>, Markup>> {
    let username = form.username.trim().to_string();
    let phone = non_empty(form.phone.as_deref());
    let college = non_empty(form.college.as_deref());

    let error = if !User::validate_username(&username) {
        Some("Names should be 2 to 64 letters, digits and spaces.")
    } else if phone.as_deref().is_some_and(|p| !User::validate_phone(p)) {
        Some("That phone number is not valid.")
    } else {
        None
    };
    if let Some(error) = error {
        let user_id = user.id;
        let unread = db.run(move |conn| unread_count(conn, user_id)).await?;
        return Ok(Err(account_page(user, unread, Some(error), None)));
    }

    let user_id = user.id;
    db.run(move |conn| {
        diesel::update(users::table.find(user_id))
            .set((
                users::username.eq(username),
                users::phone.eq(phone),
                users::college.eq(college),
            ))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;

    Ok(Ok(Flash::success(Redirect::to("/user"), "Profile updated.")))
}
