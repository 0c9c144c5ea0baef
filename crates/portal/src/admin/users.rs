use db::{
    schema::users,
    user::{Admin, Role, User},
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

#[get("/admin/users")]
pub async fn users_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let all = db
        .run(|conn| {
            users::table
                .order_by(users::created_at.desc())
                .select(User::as_select())
                .load::<User>(conn)
        })
        .instrument(span.0)
        .await?;

    let admin_id = admin.0.id;
    let body = html! {
        table class="table align-middle" {
            thead {
                tr {
                    th { "Name" }
                    th { "Email" }
                    th { "Phone" }
                    th { "College" }
                    th { "Joined" }
                    th { "Role" }
                }
            }
            tbody {
                @for user in &all {
                    tr {
                        td { (user.username) }
                        td { (user.email) }
                        td { (user.phone.as_deref().unwrap_or_default()) }
                        td { (user.college.as_deref().unwrap_or_default()) }
                        td { (format_datetime(&user.created_at)) }
                        td {
                            @if user.id == admin_id {
                                span class="badge text-bg-dark" { (user.role()) " (you)" }
                            } @else {
                                form method="post" action={"/admin/users/" (user.public_id) "/role"} class="d-flex gap-2" {
                                    select name="role" class="form-select form-select-sm" {
                                        @for role in [Role::Participant, Role::Admin] {
                                            option value=(role.as_str()) selected[user.role() == role] { (role) }
                                        }
                                    }
                                    button type="submit" class="btn btn-outline-primary btn-sm" { "Save" }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    Ok(admin_page("Users", body, admin, flash))
}

#[derive(FromForm, Serialize, Debug)]
pub struct RoleForm {
    pub role: String,
}

#[post("/admin/users/<user_id>/role", data = "<form>")]
pub async fn set_role(
    user_id: &str,
    admin: Admin,
    db: DbConn,
    form: Form<RoleForm>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let Some(role) = Role::parse(&form.role) else {
        return Ok(Flash::error(
            Redirect::to("/admin/users"),
            "Unknown role.",
        ));
    };
    if user_id == admin.0.public_id {
        return Ok(Flash::error(
            Redirect::to("/admin/users"),
            "You cannot change your own role.",
        ));
    }

    let user_id = user_id.to_string();
    let admin_id = admin.0.id;
    let username = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let user = users::table
                    .filter(User::with_public_id(&user_id))
                    .select(User::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("user"))?;
                if user.role() == role {
                    return Ok(user.username);
                }
                diesel::update(users::table.find(user.id))
                    .set(users::role.eq(role.as_str()))
                    .execute(conn)?;
                notify(
                    conn,
                    user.id,
                    &format!("Your role on the portal is now {role}."),
                )?;
                tracing::info!(
                    user_id = user.id,
                    by = admin_id,
                    role = role.as_str(),
                    "changed role"
                );
                Ok(user.username)
            })
        })
        .instrument(span.0)
        .await?;

    Ok(Flash::success(
        Redirect::to("/admin/users"),
        format!("{username} is now {role}."),
    ))
}
