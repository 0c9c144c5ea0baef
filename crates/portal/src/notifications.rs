use db::{
    notification::Notification, schema::notifications, user::User, DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use maud::{html, Markup};
use rocket::{
    request::FlashMessage,
    response::{Flash, Redirect},
};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{format_datetime, page_of_body_and_flash_msg, page_title};

use crate::{
    error::{Error, Result},
    util::{flash_of, gen_public_id},
};

/// Queues a message for a user's notification list.
pub fn notify(
    conn: &mut impl Connection<Backend = Sqlite>,
    user_id: i64,
    message: &str,
) -> QueryResult<()> {
    diesel::insert_into(notifications::table)
        .values((
            notifications::public_id.eq(gen_public_id()),
            notifications::user_id.eq(user_id),
            notifications::message.eq(message),
            notifications::is_read.eq(false),
            notifications::created_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn unread_count(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    user_id: i64,
) -> QueryResult<i64> {
    notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)
}

#[get("/notifications")]
pub async fn notifications_page(
    user: User,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let user_id = user.id;
    let list = db
        .run(move |conn| {
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .order_by(notifications::created_at.desc())
                .then_order_by(notifications::id.desc())
                .select(Notification::as_select())
                .load(conn)
        })
        .instrument(span.0)
        .await?;

    let unread = list.iter().filter(|n| !n.is_read).count();
    let markup = html! {
        (page_title("Notifications"))
        @if unread > 0 {
            form method="post" action="/notifications/read-all" class="mb-3" {
                button type="submit" class="btn btn-outline-secondary btn-sm" {
                    "Mark all as read (" (unread) ")"
                }
            }
        }
        @if list.is_empty() {
            p class="text-muted" { "Nothing here yet." }
        }
        ul class="list-group" {
            @for n in &list {
                @let class = if n.is_read {
                    "list-group-item d-flex justify-content-between"
                } else {
                    "list-group-item d-flex justify-content-between list-group-item-primary"
                };
                li class=(class) {
                    div {
                        div { (n.message) }
                        small class="text-muted" { (format_datetime(&n.created_at)) }
                    }
                    @if !n.is_read {
                        form method="post" action={"/notifications/" (n.public_id) "/read"} {
                            button type="submit" class="btn btn-link btn-sm" { "Mark read" }
                        }
                    }
                }
            }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), Some(user)))
}

#[post("/notifications/<notification_id>/read")]
pub async fn mark_read(
    notification_id: &str,
    user: User,
    db: DbConn,
) -> Result<Redirect> {
    let notification_id = notification_id.to_string();
    let n = db
        .run(move |conn| {
            diesel::update(
                notifications::table
                    .filter(notifications::public_id.eq(notification_id))
                    .filter(notifications::user_id.eq(user.id)),
            )
            .set(notifications::is_read.eq(true))
            .execute(conn)
        })
        .await?;
    if n == 0 {
        return Err(Error::not_found("notification"));
    }
    Ok(Redirect::to("/notifications"))
}

#[post("/notifications/read-all")]
pub async fn mark_all_read(user: User, db: DbConn) -> Result<Flash<Redirect>> {
    let n = db
        .run(move |conn| {
            diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user.id))
                    .filter(notifications::is_read.eq(false)),
            )
            .set(notifications::is_read.eq(true))
            .execute(conn)
        })
        .await?;
    Ok(Flash::success(
        Redirect::to("/notifications"),
        format!("Marked {n} notification(s) as read."),
    ))
}
