use chrono::Utc;
use db::{
    event::Event,
    promotion::{HomepageImage, Promotion},
    schema::{events, homepage_images, promotions},
    settings::SiteSettings,
    user::User,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::{request::FlashMessage, State};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::page_of_body_and_flash_msg;

use crate::{
    config::PortalConfig,
    error::{Error, Result},
    events::event_card,
    uploads::url_of,
    util::flash_of,
};

/// How many upcoming events the home page lists.
const UPCOMING_EVENTS: i64 = 6;

#[get("/")]
pub async fn index(
    user: Option<User>,
    db: DbConn,
    config: &State<PortalConfig>,
    flash: Option<FlashMessage<'_>>,
    span: TracingSpan,
) -> Result<Markup> {
    let now = Utc::now().naive_utc();
    let (settings, promotions, images, upcoming) = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let settings = SiteSettings::load(conn)?;
                let promotions = promotions::table
                    .filter(promotions::is_active.eq(true))
                    .order_by(promotions::created_at.desc())
                    .select(Promotion::as_select())
                    .load(conn)?;
                let images = homepage_images::table
                    .order_by(homepage_images::position.asc())
                    .then_order_by(homepage_images::id.asc())
                    .select(HomepageImage::as_select())
                    .load(conn)?;
                let upcoming = events::table
                    .filter(events::ends_at.ge(now))
                    .order_by(events::starts_at.asc())
                    .limit(UPCOMING_EVENTS)
                    .select(Event::as_select())
                    .load(conn)?;
                Ok((settings, promotions, images, upcoming))
            })
        })
        .instrument(span.0)
        .await?;

    let markup = html! {
        div class="p-4 mb-4 bg-body-tertiary rounded-3" {
            h1 class="display-5 fw-bold" { (settings.site_title) }
            @if let Some(announcement) = &settings.announcement {
                p class="fs-5" { (announcement) }
            }
            a class="btn btn-primary" href="/events" { "Browse events" }
        }

        @if !images.is_empty() {
            div id="gallery" class="carousel slide mb-4" {
                div class="carousel-inner" {
                    @for (i, image) in images.iter().enumerate() {
                        @let class = if i == 0 { "carousel-item active" } else { "carousel-item" };
                        div class=(class) {
                            img src=(url_of(&image.image_path)) class="d-block w-100 rounded" alt=(image.caption.as_deref().unwrap_or_default());
                            @if let Some(caption) = &image.caption {
                                div class="carousel-caption d-none d-md-block" {
                                    p { (caption) }
                                }
                            }
                        }
                    }
                }
            }
        }

        @for promotion in &promotions {
            div class="card mb-3" {
                div class="row g-0" {
                    @if let Some(image) = &promotion.image_path {
                        div class="col-md-4" {
                            img src=(url_of(image)) class="img-fluid rounded-start" alt=(promotion.title);
                        }
                    }
                    div class="col" {
                        div class="card-body" {
                            h5 class="card-title" { (promotion.title) }
                            p class="card-text" { (promotion.body) }
                            @if let Some(link) = &promotion.link {
                                a href=(link) class="card-link" { "Find out more" }
                            }
                        }
                    }
                }
            }
        }

        @if !upcoming.is_empty() {
            h2 class="h4 mt-4" { "Coming up" }
            div class="row row-cols-1 row-cols-md-3 g-4" {
                @for event in &upcoming {
                    div class="col" { (event_card(event, &config.currency)) }
                }
            }
        }

        @if let Some(contact) = &settings.contact_email {
            p class="mt-5 text-muted" {
                "Questions? Write to " a href={"mailto:" (contact)} { (contact) } "."
            }
        }
    };
    Ok(page_of_body_and_flash_msg(markup, flash_of(flash), user))
}
