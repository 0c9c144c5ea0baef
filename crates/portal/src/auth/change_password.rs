use std::sync::Arc;

use db::{schema::users, user::User, DbConn};
use diesel::{prelude::*, update};
use email::{send_mail, Mail};
use maud::{html, Markup};
use rocket::{
    form::Form,
    response::{Flash, Redirect},
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{form_error, page_of_body, page_title};

use crate::util::{hash_password, verify_password};

fn change_password_page(user: User, error: Option<&str>) -> Markup {
    page_of_body(
        html! {
            (page_title("Change your password"))
            div class="col-md-6" {
                (form_error(error))
                form action="/user/password" method="POST" {
                    div class="mb-3" {
                        label for="old_password" class="form-label" { "Current password" }
                        input type="password" class="form-control" id="old_password" name="old_password" required;
                    }
                    div class="mb-3" {
                        label for="password" class="form-label" { "New password" }
                        input type="password" class="form-control" id="password" name="password" required minlength="8";
                    }
                    div class="mb-3" {
                        label for="password2" class="form-label" { "Confirm new password" }
                        input type="password" class="form-control" id="password2" name="password2" required minlength="8";
                    }
                    button type="submit" class="btn btn-primary" { "Change password" }
                }
            }
        },
        Some(user),
    )
}

#[get("/user/password")]
pub async fn change_password_form(user: User) -> Markup {
    change_password_page(user, None)
}

#[derive(FromForm, Serialize)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub password: String,
    pub password2: String,
}

/// Handles password updates for users.
#[post("/user/password", data = "<form>")]
pub async fn do_change_password(
    user: User,
    db: DbConn,
    form: Form<ChangePasswordForm>,
    span: TracingSpan,
) -> crate::error::Result<Result<Flash<Redirect>, Markup>> {
    if form.password != form.password2 {
        return Ok(Err(change_password_page(
            user,
            Some("Those passwords do not match!"),
        )));
    }
    if !User::validate_password(&form.password) {
        return Ok(Err(change_password_page(
            user,
            Some("Passwords must be at least 8 characters long."),
        )));
    }
    if !verify_password(&form.old_password, &user.password_hash) {
        return Ok(Err(change_password_page(
            user,
            Some("The current password you entered is not correct."),
        )));
    }

    let new_password_hash = hash_password(&form.password)?;
    let user_id = user.id;
    let db = Arc::new(db);
    db.run(move |conn| {
        update(users::table.find(user_id))
            .set(users::password_hash.eq(new_password_hash))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;
    tracing::info!(user_id, "password changed");

    send_mail(
        Mail {
            to: vec![(user.username.clone(), user.email.clone())],
            subject: "Your password was changed".to_string(),
            html: html! {
                p {
                    "The password for your account was just changed. If this
                     was not you, contact the organisers straight away."
                }
            }
            .into_string(),
            text: "The password for your account was just changed. If this \
                   was not you, contact the organisers straight away.\n"
                .to_string(),
        },
        db.clone(),
    );

    Ok(Ok(Flash::success(Redirect::to("/user"), "Password changed.")))
}
