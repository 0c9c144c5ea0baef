use db::{
    schema::users,
    user::{set_login_cookie, Role, User},
    DbConn,
};
use diesel::{dsl::exists, insert_into, prelude::*, select};
use maud::Markup;
use rocket::{
    form::Form,
    http::CookieJar,
    response::{Flash, Redirect},
};
use serde::Serialize;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{form_error, page_of_body, page_title};

use crate::{
    error::{Error, Result},
    permissions::{has_permission, Permission},
    util::{gen_public_id, hash_password, non_empty},
};

fn signups_closed_page() -> Markup {
    page_of_body(
        maud::html! {
            (page_title("Sign-ups are closed"))
            p {
                "New accounts cannot be created at the moment. Please check
                 back later or contact the organisers."
            }
        },
        None,
    )
}

#[get("/register")]
pub async fn register_page(
    user: Option<User>,
    db: DbConn,
) -> Result<std::result::Result<Markup, Flash<Redirect>>> {
    if user.is_some() {
        return Ok(Err(Flash::error(
            Redirect::to("/user"),
            "You already have an account.",
        )));
    }

    let open = db
        .run(|conn| has_permission(None, &Permission::RegisterAsNewUser, conn))
        .await?;
    if !open {
        return Ok(Ok(signups_closed_page()));
    }

    Ok(Ok(register_form(None, None)))
}

fn register_form(form: Option<&RegisterForm>, error: Option<&str>) -> Markup {
    let username = form.map(|f| f.username.as_str()).unwrap_or_default();
    let email = form.map(|f| f.email.as_str()).unwrap_or_default();
    let phone = form.and_then(|f| f.phone.as_deref()).unwrap_or_default();
    let college = form.and_then(|f| f.college.as_deref()).unwrap_or_default();
    let markup = maud::html! {
        (page_title("Create an account"))
        div class="col-md-6" {
            (form_error(error))
            form method="post" action="/register" {
                div class="mb-3" {
                    label for="username" class="form-label" { "Name" }
                    input type="text" class="form-control" id="username" name="username" value=(username) required;
                }
                div class="mb-3" {
                    label for="email" class="form-label" { "Email" }
                    input type="email" class="form-control" id="email" name="email" value=(email) required;
                }
                div class="mb-3" {
                    label for="phone" class="form-label" { "Phone (optional)" }
                    input type="tel" class="form-control" id="phone" name="phone" value=(phone);
                }
                div class="mb-3" {
                    label for="college" class="form-label" { "College (optional)" }
                    input type="text" class="form-control" id="college" name="college" value=(college);
                }
                div class="mb-3" {
                    label for="password" class="form-label" { "Password" }
                    input type="password" class="form-control" id="password" name="password" required minlength="8";
                }
                div class="mb-3" {
                    label for="password2" class="form-label" { "Confirm password" }
                    input type="password" class="form-control" id="password2" name="password2" required minlength="8";
                }
                button type="submit" class="btn btn-primary" { "Register" }
            }
        }
    };
    page_of_body(markup, None)
}

#[derive(FromForm, Serialize)]
pub struct RegisterForm {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) password2: String,
    pub(crate) phone: Option<String>,
    pub(crate) college: Option<String>,
}

#[post("/register", data = "<form>")]
pub async fn do_register(
    form: Form<RegisterForm>,
    jar: &CookieJar<'_>,
    db: DbConn,
    span: TracingSpan,
) -> Result<std::result::Result<Flash<Redirect>, Markup>> {
    let registered = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                if !has_permission(None, &Permission::RegisterAsNewUser, conn)? {
                    return Ok(Err(signups_closed_page()));
                }

                let refuse =
                    |msg: &str| Ok(Err(register_form(Some(&*form), Some(msg))));

                if form.password != form.password2 {
                    return refuse("Error: your passwords do not match.");
                }

                let email = form.email.trim().to_lowercase();
                if !User::validate_email(&email) {
                    return refuse("Error: that email is not valid.");
                }

                let username = form.username.trim();
                if !User::validate_username(username) {
                    return refuse(
                        "Error: names should be 2 to 64 letters, digits and spaces.",
                    );
                }

                if !User::validate_password(&form.password) {
                    return refuse(
                        "Error: passwords must be at least 8 characters long.",
                    );
                }

                let phone = non_empty(form.phone.as_deref());
                if phone.as_deref().is_some_and(|p| !User::validate_phone(p)) {
                    return refuse("Error: that phone number is not valid.");
                }

                let taken = select(exists(
                    users::table.filter(User::with_email(&email)),
                ))
                .get_result::<bool>(conn)?;
                if taken {
                    return refuse(
                        "Error: an account with that email already exists.",
                    );
                }

                let password_hash = hash_password(&form.password)?;

                let user = insert_into(users::table)
                    .values((
                        users::public_id.eq(gen_public_id()),
                        users::username.eq(username),
                        users::email.eq(&email),
                        users::password_hash.eq(&password_hash),
                        users::phone.eq(phone),
                        users::college.eq(non_empty(form.college.as_deref())),
                        users::role.eq(Role::Participant.as_str()),
                        users::created_at.eq(diesel::dsl::now),
                    ))
                    .returning(User::as_returning())
                    .get_result(conn)?;

                tracing::info!(user_id = user.id, "registered new user");
                Ok(Ok(user))
            })
        })
        .instrument(span.0)
        .await?;

    Ok(registered.map(|user| {
        set_login_cookie(user.id, jar);
        Flash::success(
            Redirect::to("/events"),
            format!("Welcome, {}! Your account has been created.", user.username),
        )
    }))
}
