use std::sync::Arc;

use db::{
    event::{format_amount, Event},
    payment::{OrderStatus, PaymentOrder},
    schema::{events, payment_orders, teams, users},
    user::Admin,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use payments::GatewayOrderStatus;
use rocket::{
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::format_datetime;

use super::admin_page;
use crate::{
    checkout::fulfil,
    config::{Gateway, PortalConfig},
    error::{Error, Result},
    registration::send_confirmations,
};

type OrderRow = (PaymentOrder, String, String, Option<String>);

#[get("/admin/payments")]
pub async fn payments_page(
    admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let orders = db
        .run(|conn| {
            payment_orders::table
                .inner_join(users::table)
                .inner_join(events::table)
                .left_join(teams::table)
                .order_by(payment_orders::created_at.desc())
                .select((
                    PaymentOrder::as_select(),
                    users::username,
                    events::name,
                    teams::name.nullable(),
                ))
                .load::<OrderRow>(conn)
        })
        .instrument(span.0)
        .await?;

    let body = html! {
        table class="table table-sm align-middle" {
            thead {
                tr {
                    th { "Created" }
                    th { "Payer" }
                    th { "Event" }
                    th { "Amount" }
                    th { "Gateway order" }
                    th { "Status" }
                    th {}
                }
            }
            tbody {
                @for (order, payer, event, team) in &orders {
                    @let badge = match order.status() {
                        Some(OrderStatus::Paid) => "badge text-bg-success",
                        Some(OrderStatus::Failed) => "badge text-bg-danger",
                        _ => "badge text-bg-warning",
                    };
                    tr {
                        td { (format_datetime(&order.created_at)) }
                        td {
                            (payer)
                            @if let Some(team) = team {
                                br; small class="text-muted" { "team " (team) }
                            }
                        }
                        td { (event) }
                        td { (config.currency) " " (format_amount(order.amount)) }
                        td {
                            code { (order.gateway_order_id) }
                            @if let Some(payment_id) = &order.gateway_payment_id {
                                br; small class="text-muted" { (payment_id) }
                            }
                        }
                        td { span class=(badge) { (order.status) } }
                        td {
                            @if order.status() != Some(OrderStatus::Paid) {
                                form method="post" action={"/admin/payments/" (order.public_id) "/reconcile"} {
                                    button type="submit" class="btn btn-outline-primary btn-sm" { "Check with gateway" }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    Ok(admin_page("Payments", body, admin, flash))
}

/// Asks the gateway about an order that never saw a successful callback and
/// fulfils it if the gateway has it as paid.
#[post("/admin/payments/<order_id>/reconcile")]
pub async fn reconcile(
    order_id: &str,
    _admin: Admin,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let to = || Redirect::to("/admin/payments");

    let order_id = order_id.to_string();
    let order = db
        .run(move |conn| {
            payment_orders::table
                .filter(payment_orders::public_id.eq(&order_id))
                .select(PaymentOrder::as_select())
                .first(conn)
                .optional()
        })
        .await?
        .ok_or_else(|| Error::not_found("payment order"))?;
    if order.status() == Some(OrderStatus::Paid) {
        return Ok(Flash::success(to(), "That order is already paid."));
    }

    let remote = gateway.fetch_order(&order.gateway_order_id).await?;
    if remote.status != GatewayOrderStatus::Paid {
        return Ok(Flash::warning(
            to(),
            format!(
                "The gateway reports order {} as {:?}; nothing to do.",
                order.gateway_order_id, remote.status
            ),
        ));
    }

    let db = Arc::new(db);
    let (event, enrolled) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                // a callback may have landed since the order was loaded
                let status = payment_orders::table
                    .find(order.id)
                    .select(payment_orders::status)
                    .first::<String>(conn)?;
                let event = events::table
                    .find(order.event_id)
                    .select(Event::as_select())
                    .first(conn)?;
                if status == OrderStatus::Paid.as_str() {
                    return Ok((event, Vec::new()));
                }
                let enrolled = fulfil(
                    conn,
                    &order,
                    &event,
                    &order.gateway_order_id,
                    None,
                )?;
                tracing::info!(
                    order_id = %order.gateway_order_id,
                    "reconciled payment order"
                );
                Ok((event, enrolled))
            })
        })
        .instrument(span.0)
        .await?;

    let count = enrolled.len();
    send_confirmations(&db, config, &event, enrolled);
    Ok(Flash::success(
        to(),
        format!("Order marked paid; {count} participant(s) registered."),
    ))
}
