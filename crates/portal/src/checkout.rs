//! Collecting event fees through the payment gateway.
//!
//! A checkout starts by creating an order with the gateway and storing it
//! as a `payment_orders` row. The participant pays on the checkout page and
//! is sent back to [`payment_callback`] with a signed payment id, at which
//! point the registration (or, for a team order, every member's
//! registration) is written.

use std::sync::Arc;

use chrono::Utc;
use db::{
    event::{format_amount, Event},
    payment::{OrderStatus, PaymentOrder},
    schema::{events, payment_orders, team_members},
    settings::SiteSettings,
    user::User,
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use either::Either;
use maud::{html, Markup, PreEscaped};
use payments::{Checkout, OrderRequest, PaymentGateway};
use rocket::{
    form::Form,
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::{page_of_body_and_flash_msg, page_title};

use crate::{
    config::{Gateway, PortalConfig},
    error::{Error, Result},
    registration::{enrol, send_confirmations, Settlement},
    util::{flash_of, gen_public_id, short_random},
};

/// Creates a gateway order for `amount` and records it. Returns the public
/// id of the new `payment_orders` row.
pub async fn begin_payment(
    db: &DbConn,
    gateway: &dyn PaymentGateway,
    config: &PortalConfig,
    event: &Event,
    user_id: i64,
    team_id: Option<i64>,
    amount: i64,
) -> Result<String> {
    let request = OrderRequest {
        amount,
        currency: config.currency.clone(),
        receipt: payments::receipt(&event.public_id, Utc::now().timestamp()),
    };
    let order = gateway.create_order(&request).await?;
    tracing::info!(
        order_id = %order.id,
        receipt = %request.receipt,
        amount,
        "created payment order"
    );

    let public_id = gen_public_id();
    let row_id = public_id.clone();
    let event_id = event.id;
    db.run(move |conn| {
        diesel::insert_into(payment_orders::table)
            .values((
                payment_orders::public_id.eq(row_id),
                payment_orders::gateway_order_id.eq(order.id),
                payment_orders::receipt.eq(request.receipt),
                payment_orders::user_id.eq(user_id),
                payment_orders::event_id.eq(event_id),
                payment_orders::team_id.eq(team_id),
                payment_orders::amount.eq(amount),
                payment_orders::status.eq(OrderStatus::Created.as_str()),
                payment_orders::created_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
    })
    .await?;

    Ok(public_id)
}

/// Marks an order paid and registers whoever it pays for. For a team order
/// that is every member of the (locked) team.
pub fn fulfil(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    order: &PaymentOrder,
    event: &Event,
    payment_ref: &str,
    gateway_payment_id: Option<&str>,
) -> QueryResult<Vec<User>> {
    diesel::update(payment_orders::table.find(order.id))
        .set((
            payment_orders::status.eq(OrderStatus::Paid.as_str()),
            payment_orders::gateway_payment_id.eq(gateway_payment_id),
        ))
        .execute(conn)?;

    let user_ids = match order.team_id {
        Some(team_id) => team_members::table
            .filter(team_members::team_id.eq(team_id))
            .select(team_members::user_id)
            .load::<i64>(conn)?,
        None => vec![order.user_id],
    };

    tracing::info!(order_id = %order.gateway_order_id, "payment order fulfilled");
    enrol(
        conn,
        event,
        order.team_id,
        &user_ids,
        Settlement::Paid { payment_ref },
    )
}

#[get("/payments/<order_id>")]
pub async fn checkout_page(
    order_id: &str,
    user: User,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Either<Markup, Flash<Redirect>>> {
    let order_id = order_id.to_string();
    let user_id = user.id;
    let (order, event, settings) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let (order, event) = payment_orders::table
                    .inner_join(events::table)
                    .filter(payment_orders::public_id.eq(&order_id))
                    .filter(payment_orders::user_id.eq(user_id))
                    .select((PaymentOrder::as_select(), Event::as_select()))
                    .first::<(PaymentOrder, Event)>(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("payment"))?;
                Ok((order, event, SiteSettings::load(conn)?))
            })
        })
        .instrument(span.0)
        .await?;

    if order.status() == Some(OrderStatus::Paid) {
        return Ok(Either::Right(Flash::success(
            Redirect::to("/registrations"),
            "This payment has already been completed.",
        )));
    }

    let amount = format!("{} {}", config.currency, format_amount(order.amount));
    let pay_button = match gateway.checkout() {
        Checkout::Hosted { key_id, script_url } => {
            let options = serde_json::json!({
                "key": key_id,
                "amount": order.amount,
                "currency": config.currency,
                "name": settings.site_title,
                "description": event.name,
                "order_id": order.gateway_order_id,
                "callback_url": config.url("/payments/callback"),
                "redirect": true,
                "prefill": { "name": user.username, "email": user.email },
            })
            .to_string()
            // the options are embedded in a script element
            .replace("</", "<\\/");
            html! {
                script src=(script_url) {}
                button id="pay" class="btn btn-primary btn-lg" { "Pay " (amount) }
                script {
                    (PreEscaped(format!(
                        "var options = {options};\
                         document.getElementById('pay').onclick = function (e) {{\
                             new Razorpay(options).open(); e.preventDefault();\
                         }};"
                    )))
                }
            }
        }
        Checkout::Offline { secret } => {
            let payment_id = format!("pay_{}", short_random(14));
            let signature =
                payments::sign(&order.gateway_order_id, &payment_id, &secret);
            html! {
                div class="alert alert-info" {
                    "Payments are in offline mode. Confirming below records the payment without charging anything."
                }
                form method="post" action="/payments/callback" {
                    input type="hidden" name="order_id" value=(order.gateway_order_id);
                    input type="hidden" name="payment_id" value=(payment_id);
                    input type="hidden" name="signature" value=(signature);
                    button type="submit" class="btn btn-primary btn-lg" { "Confirm payment of " (amount) }
                }
            }
        }
    };

    let markup = html! {
        (page_title("Payment"))
        div class="card" {
            div class="card-body" {
                h5 class="card-title" { (event.name) }
                p { "Receipt " code { (order.receipt) } }
                p class="fs-4" { (amount) }
                @if order.status() == Some(OrderStatus::Failed) {
                    div class="alert alert-warning" {
                        "The last attempt to pay for this order could not be verified. You may try again."
                    }
                }
                (pay_button)
            }
        }
    };
    Ok(Either::Left(page_of_body_and_flash_msg(
        markup,
        flash_of(flash),
        Some(user),
    )))
}

/// A signed payment, as posted back by the checkout.
#[derive(Serialize, Debug)]
pub struct PaymentCallbackForm {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Everything the checkout may post back. A successful payment carries the
/// three signed fields (the hosted checkout uses the `razorpay_` names); an
/// unsuccessful one carries `error[..]` fields instead.
#[derive(FromForm, Debug)]
pub struct CheckoutReturn {
    #[field(name = "order_id")]
    #[field(name = "razorpay_order_id")]
    pub order_id: Option<String>,
    #[field(name = "payment_id")]
    #[field(name = "razorpay_payment_id")]
    pub payment_id: Option<String>,
    #[field(name = "signature")]
    #[field(name = "razorpay_signature")]
    pub signature: Option<String>,
    pub error: Option<GatewayFailure>,
}

impl CheckoutReturn {
    fn signed(&mut self) -> Option<PaymentCallbackForm> {
        if self.order_id.is_none()
            || self.payment_id.is_none()
            || self.signature.is_none()
        {
            return None;
        }
        Some(PaymentCallbackForm {
            order_id: self.order_id.take()?,
            payment_id: self.payment_id.take()?,
            signature: self.signature.take()?,
        })
    }
}

enum Callback {
    AlreadyPaid,
    Invalid(Event),
    Paid(Event, Vec<User>),
}

/// The browser arrives here from the gateway, which is a cross-site POST, so
/// the login cookie is not relied upon: the order identifies the payer.
#[post("/payments/callback", data = "<form>")]
pub async fn payment_callback(
    form: Form<CheckoutReturn>,
    db: DbConn,
    gateway: &State<Gateway>,
    config: &State<PortalConfig>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let mut returned = form.into_inner();
    let Some(form) = returned.signed() else {
        let failure = returned.error.unwrap_or_default();
        return payment_not_completed(failure, db, span).await;
    };
    let valid = payments::verify_signature(
        &form.order_id,
        &form.payment_id,
        &form.signature,
        gateway.signing_secret(),
    );

    let db = Arc::new(db);
    let outcome = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let order = payment_orders::table
                    .filter(payment_orders::gateway_order_id.eq(&form.order_id))
                    .select(PaymentOrder::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("payment order"))?;
                let event = events::table
                    .find(order.event_id)
                    .select(Event::as_select())
                    .first(conn)?;

                if order.status() == Some(OrderStatus::Paid) {
                    return Ok(Callback::AlreadyPaid);
                }

                if !valid {
                    tracing::warn!(
                        order_id = %order.gateway_order_id,
                        "payment callback carried an invalid signature"
                    );
                    diesel::update(payment_orders::table.find(order.id))
                        .set(
                            payment_orders::status
                                .eq(OrderStatus::Failed.as_str()),
                        )
                        .execute(conn)?;
                    return Ok(Callback::Invalid(event));
                }

                let enrolled = fulfil(
                    conn,
                    &order,
                    &event,
                    &form.payment_id,
                    Some(&form.payment_id),
                )?;
                Ok(Callback::Paid(event, enrolled))
            })
        })
        .instrument(span.0)
        .await?;

    Ok(match outcome {
        Callback::AlreadyPaid => Flash::success(
            Redirect::to("/registrations"),
            "This payment has already been recorded.",
        ),
        Callback::Invalid(event) => Flash::error(
            Redirect::to(format!("/events/{}", event.public_id)),
            "We could not verify that payment. You have not been registered; if money was deducted, contact the organisers with your receipt.",
        ),
        Callback::Paid(event, enrolled) => {
            send_confirmations(&db, config, &event, enrolled);
            Flash::success(
                Redirect::to("/registrations"),
                format!("Payment received. You are registered for {}.", event.name),
            )
        }
    })
}

/// What the hosted checkout posts back when a payment does not go through.
#[derive(FromForm, Debug, Default)]
pub struct GatewayFailure {
    pub code: Option<String>,
    pub description: Option<String>,
    /// JSON naming the `order_id` (and the `payment_id`, if one was made).
    pub metadata: Option<String>,
}

#[derive(Deserialize)]
struct FailureMetadata {
    order_id: String,
}

/// The checkout reported a declined or abandoned payment. The order, when
/// the report names one, is marked failed so the participant can try again.
async fn payment_not_completed(
    failure: GatewayFailure,
    db: DbConn,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    tracing::info!(
        code = ?failure.code,
        description = ?failure.description,
        "checkout reported an unsuccessful payment"
    );
    let message = match failure.description.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => {
            format!("The payment was not completed: {reason}")
        }
        _ => "The payment was not completed.".to_string(),
    };
    let Some(order_id) = failure
        .metadata
        .as_deref()
        .and_then(|metadata| serde_json::from_str::<FailureMetadata>(metadata).ok())
        .map(|metadata| metadata.order_id)
    else {
        return Ok(Flash::error(Redirect::to("/registrations"), message));
    };

    let order = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let Some(order) = payment_orders::table
                    .filter(payment_orders::gateway_order_id.eq(&order_id))
                    .select(PaymentOrder::as_select())
                    .first(conn)
                    .optional()?
                else {
                    return Ok(None);
                };
                if order.status() == Some(OrderStatus::Created) {
                    diesel::update(payment_orders::table.find(order.id))
                        .set(
                            payment_orders::status
                                .eq(OrderStatus::Failed.as_str()),
                        )
                        .execute(conn)?;
                }
                Ok(Some(order.public_id))
            })
        })
        .instrument(span.0)
        .await?;

    let to = match order {
        Some(order) => format!("/payments/{order}"),
        None => "/registrations".to_string(),
    };
    Ok(Flash::error(Redirect::to(to), message))
}
