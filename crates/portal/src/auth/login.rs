use db::{
    schema::users,
    user::{set_login_cookie, User},
    DbConn,
};
use diesel::prelude::*;
use maud::Markup;
use rocket::{
    form::Form,
    http::CookieJar,
    request::FlashMessage,
    response::{Flash, Redirect},
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{form_error, page_of_body_and_flash_msg, page_title};

use crate::{
    error::Result,
    util::{flash_of, verify_password},
};

#[get("/login")]
pub async fn login_page(
    user: Option<User>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup, Flash<Redirect>> {
    if user.is_some() {
        return Err(Flash::error(
            Redirect::to("/"),
            "You are already logged in!",
        ));
    }

    Ok(page_of_body_and_flash_msg(
        login_form(None, None),
        flash_of(flash),
        None,
    ))
}

#[derive(FromForm, Serialize, Debug)]
pub struct PasswordLoginForm {
    pub email: String,
    pub password: String,
}

#[post("/login", data = "<form>")]
pub async fn do_login(
    user: Option<User>,
    form: Form<PasswordLoginForm>,
    jar: &CookieJar<'_>,
    db: DbConn,
    span: TracingSpan,
) -> Result<std::result::Result<Markup, Flash<Redirect>>> {
    if user.is_some() {
        return Ok(Err(Flash::error(
            Redirect::to("/"),
            "You are already logged in!",
        )));
    }

    let email = form.email.trim().to_lowercase();
    let found = db
        .run(move |conn| {
            users::table
                .filter(User::with_email(&email))
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .instrument(span.0)
        .await?;

    // the same message for both, so that accounts cannot be enumerated
    let user = match found {
        Some(user) if verify_password(&form.password, &user.password_hash) => {
            user
        }
        _ => {
            return Ok(Ok(page_of_body_and_flash_msg(
                login_form(
                    Some(&form.email),
                    Some("Incorrect email address or password."),
                ),
                None,
                None,
            )))
        }
    };

    set_login_cookie(user.id, jar);
    tracing::info!(user_id = user.id, "logged in");
    Ok(Err(Flash::success(
        Redirect::to("/"),
        format!("Welcome back, {}!", user.username),
    )))
}

fn login_form(email: Option<&str>, error: Option<&str>) -> Markup {
    maud::html! {
        (page_title("Log in"))
        div class="col-md-6" {
            (form_error(error))
            form method="post" action="/login" {
                div class="mb-3" {
                    label for="email" class="form-label" { "Email address" }
                    input type="email" class="form-control" id="email" name="email" value=(email.unwrap_or_default()) required;
                }
                div class="mb-3" {
                    label for="password" class="form-label" { "Password" }
                    input type="password" class="form-control" id="password" name="password" required;
                }
                button type="submit" class="btn btn-primary" { "Log in" }
            }
            p class="mt-3" {
                "New here? " a href="/register" { "Create an account" } "."
            }
        }
    }
}
