use db::{
    schema::users,
    user::{set_login_cookie, Role, User},
    DbConn,
};
use diesel::prelude::*;
use maud::Markup;
use rocket::{
    form::Form,
    http::CookieJar,
    response::{Flash, Redirect},
};
use serde::Serialize;
use ui::{form_error, page_of_body, page_title};

use crate::{
    error::{Error, Result},
    util::{gen_public_id, hash_password},
};

fn setup_page_form(error: Option<&str>) -> Markup {
    page_of_body(
        maud::html! {
            (page_title("Create the first administrator"))
            div class="col-md-6" {
                (form_error(error))
                form method="POST" action="/admin/setup" {
                    div class="mb-3" {
                        label for="username" class="form-label" { "Name" }
                        input type="text" class="form-control" id="username" name="username" required;
                    }
                    div class="mb-3" {
                        label for="email" class="form-label" { "Email" }
                        input type="email" class="form-control" id="email" name="email" required;
                    }
                    div class="mb-3" {
                        label for="password" class="form-label" { "Password" }
                        input type="password" class="form-control" id="password" name="password" required minlength="8";
                    }
                    div class="mb-3" {
                        label for="password2" class="form-label" { "Password confirmation" }
                        input type="password" class="form-control" id="password2" name="password2" required minlength="8";
                    }
                    button type="submit" class="btn btn-primary" { "Create administrator account" }
                }
            }
        },
        None,
    )
}

fn already_set_up() -> Error {
    Error::Forbidden("Setup has already been performed.".to_string())
}

#[get("/admin/setup")]
/// Page to create the first user, who becomes an administrator. Only
/// available while nobody has an account.
pub async fn setup_page(db: DbConn) -> Result<Markup> {
    let user_count = db
        .run(|conn| users::table.count().get_result::<i64>(conn))
        .await?;

    if user_count > 0 {
        return Err(already_set_up());
    }
    Ok(setup_page_form(None))
}

#[derive(FromForm, Serialize)]
pub struct SetupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[post("/admin/setup", data = "<form>")]
pub async fn do_setup(
    db: DbConn,
    jar: &CookieJar<'_>,
    form: Form<SetupForm>,
) -> Result<Result<Flash<Redirect>, Markup>> {
    let created = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let user_count = users::table.count().get_result::<i64>(conn)?;
                if user_count > 0 {
                    return Err(already_set_up());
                }

                let refuse = |msg: &str| Ok(Err(setup_page_form(Some(msg))));

                if form.password != form.password2 {
                    return refuse("Error: those passwords do not match!");
                }
                let username = form.username.trim();
                if !User::validate_username(username) {
                    return refuse(
                        "Error: names should be 2 to 64 letters, digits and spaces.",
                    );
                }
                let email = form.email.trim().to_lowercase();
                if !User::validate_email(&email) {
                    return refuse("Error: your email is not a valid email.");
                }
                if !User::validate_password(&form.password) {
                    return refuse(
                        "Error: your password should be at least 8 characters.",
                    );
                }

                let password_hash = hash_password(&form.password)?;
                let user = diesel::insert_into(users::table)
                    .values((
                        users::public_id.eq(gen_public_id()),
                        users::username.eq(username),
                        users::email.eq(&email),
                        users::password_hash.eq(password_hash),
                        users::role.eq(Role::Admin.as_str()),
                        users::created_at.eq(diesel::dsl::now),
                    ))
                    .returning(User::as_returning())
                    .get_result(conn)?;

                tracing::info!(user_id = user.id, "created the first administrator");
                Ok(Ok(user))
            })
        })
        .await?;

    Ok(created.map(|user| {
        set_login_cookie(user.id, jar);
        Flash::success(
            Redirect::to("/admin"),
            "Your administrator account has been created.",
        )
    }))
}
