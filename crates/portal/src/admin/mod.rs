//! The organisers' dashboard. Every route here takes the [`Admin`] guard.

use db::{
    idea::IdeaStatus,
    payment::OrderStatus,
    schema,
    user::Admin,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::request::FlashMessage;
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{page_of_body_and_flash_msg, page_title};

use crate::{
    error::{Error, Result},
    util::flash_of,
};

pub mod attendance;
pub mod content;
pub mod events;
pub mod ideas;
pub mod notify;
pub mod payments;
pub mod settings;
pub mod setup;
pub mod users;

/// Links between the admin pages.
pub fn admin_nav() -> Markup {
    html! {
        ul class="nav nav-pills mb-4" {
            li class="nav-item" { a class="nav-link" href="/admin" { "Dashboard" } }
            li class="nav-item" { a class="nav-link" href="/admin/events" { "Events" } }
            li class="nav-item" { a class="nav-link" href="/admin/users" { "Users" } }
            li class="nav-item" { a class="nav-link" href="/admin/ideas" { "Ideas" } }
            li class="nav-item" { a class="nav-link" href="/admin/promotions" { "Promotions" } }
            li class="nav-item" { a class="nav-link" href="/admin/images" { "Homepage images" } }
            li class="nav-item" { a class="nav-link" href="/admin/attendance" { "Attendance" } }
            li class="nav-item" { a class="nav-link" href="/admin/notify" { "Notify" } }
            li class="nav-item" { a class="nav-link" href="/admin/payments" { "Payments" } }
            li class="nav-item" { a class="nav-link" href="/admin/settings" { "Settings" } }
        }
    }
}

/// Renders an admin page: the admin navigation followed by `body`.
pub fn admin_page(
    title: &str,
    body: Markup,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
) -> Markup {
    page_of_body_and_flash_msg(
        html! {
            (page_title(title))
            (admin_nav())
            (body)
        },
        flash_of(flash),
        Some(admin.0),
    )
}

struct Counts {
    users: i64,
    events: i64,
    participations: i64,
    pending_ideas: i64,
    unpaid_orders: i64,
}

#[get("/admin")]
pub async fn dashboard(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let counts = db
        .run(|conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                Ok(Counts {
                    users: schema::users::table.count().get_result(conn)?,
                    events: schema::events::table.count().get_result(conn)?,
                    participations: schema::participations::table
                        .count()
                        .get_result(conn)?,
                    pending_ideas: schema::ideas::table
                        .filter(
                            schema::ideas::status
                                .eq(IdeaStatus::Pending.as_str()),
                        )
                        .count()
                        .get_result(conn)?,
                    unpaid_orders: schema::payment_orders::table
                        .filter(
                            schema::payment_orders::status
                                .eq(OrderStatus::Created.as_str()),
                        )
                        .count()
                        .get_result(conn)?,
                })
            })
        })
        .instrument(span.0)
        .await?;

    let tile = |label: &str, value: i64, href: &str| {
        html! {
            div class="col" {
                a class="card text-decoration-none h-100" href=(href) {
                    div class="card-body" {
                        div class="display-6" { (value) }
                        div class="text-muted" { (label) }
                    }
                }
            }
        }
    };

    let body = html! {
        div class="row row-cols-2 row-cols-md-5 g-3" {
            (tile("Users", counts.users, "/admin/users"))
            (tile("Events", counts.events, "/admin/events"))
            (tile("Registrations", counts.participations, "/admin/events"))
            (tile("Ideas awaiting review", counts.pending_ideas, "/admin/ideas"))
            (tile("Unpaid orders", counts.unpaid_orders, "/admin/payments"))
        }
    };
    Ok(admin_page("Admin", body, admin, flash))
}
