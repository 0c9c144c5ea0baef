//! Promotions and homepage images.

use db::{
    promotion::{HomepageImage, Promotion},
    schema::{homepage_images, promotions},
    user::Admin,
    DbConn,
};
use diesel::prelude::*;
use maud::{html, Markup};
use rocket::{
    form::Form,
    fs::TempFile,
    request::FlashMessage,
    response::{Flash, Redirect},
    State,
};
use tracing::Instrument;
use trace_request::TracingSpan;
use ui::bool_cell;
use url::Url;

use super::admin_page;
use crate::{
    config::PortalConfig,
    error::{Error, Result},
    uploads::{remove_image, store_image, url_of},
    util::{gen_public_id, non_empty},
};

/// Promotion links must be absolute `http(s)` URLs.
pub fn validate_link(link: &str) -> bool {
    match Url::parse(link) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host().is_some()
        }
        Err(_) => false,
    }
}

#[get("/admin/promotions")]
pub async fn promotions_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup> {
    let all = db
        .run(|conn| {
            promotions::table
                .order_by(promotions::created_at.desc())
                .select(Promotion::as_select())
                .load::<Promotion>(conn)
        })
        .await?;

    let body = html! {
        div class="row" {
            div class="col-md-7" {
                table class="table align-middle" {
                    thead {
                        tr { th { "Promotion" } th { "Image" } th { "Shown" } th {} }
                    }
                    tbody {
                        @for promotion in &all {
                            tr {
                                td {
                                    b { (promotion.title) }
                                    br;
                                    small class="text-muted" { (promotion.body) }
                                    @if let Some(link) = &promotion.link {
                                        br; a href=(link) { (link) }
                                    }
                                }
                                td {
                                    @if let Some(image) = &promotion.image_path {
                                        img src=(url_of(image)) alt="" style="max-height: 60px";
                                    }
                                }
                                (bool_cell(promotion.is_active, "active", "hidden"))
                                td class="text-end" {
                                    form method="post" action={"/admin/promotions/" (promotion.public_id) "/toggle"} class="d-inline" {
                                        button type="submit" class="btn btn-outline-secondary btn-sm me-1" {
                                            @if promotion.is_active { "Hide" } @else { "Show" }
                                        }
                                    }
                                    form method="post" action={"/admin/promotions/" (promotion.public_id) "/delete"} class="d-inline" {
                                        button type="submit" class="btn btn-outline-danger btn-sm" { "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            div class="col-md-5" {
                h2 class="h5" { "New promotion" }
                form method="post" action="/admin/promotions" enctype="multipart/form-data" {
                    div class="mb-3" {
                        label for="title" class="form-label" { "Title" }
                        input type="text" class="form-control" id="title" name="title" required;
                    }
                    div class="mb-3" {
                        label for="body" class="form-label" { "Text" }
                        textarea class="form-control" id="body" name="body" rows="3" required {}
                    }
                    div class="mb-3" {
                        label for="link" class="form-label" { "Link (optional)" }
                        input type="url" class="form-control" id="link" name="link" placeholder="https://";
                    }
                    div class="mb-3" {
                        label for="image" class="form-label" { "Image (optional)" }
                        input type="file" class="form-control" id="image" name="image" accept="image/png,image/jpeg,image/gif,image/webp";
                    }
                    button type="submit" class="btn btn-primary" { "Publish" }
                }
            }
        }
    };
    Ok(admin_page("Promotions", body, admin, flash))
}

#[derive(FromForm)]
pub struct PromotionForm<'r> {
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub image: Option<TempFile<'r>>,
}

#[post("/admin/promotions", data = "<form>")]
pub async fn create_promotion(
    _admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
    mut form: Form<PromotionForm<'_>>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let refuse = |msg: &str| {
        Ok(Flash::error(Redirect::to("/admin/promotions"), msg.to_string()))
    };

    let title = form.title.trim().to_string();
    let text = form.body.trim().to_string();
    if title.is_empty() || title.chars().count() > 120 || text.is_empty() {
        return refuse("Promotions need a title (up to 120 characters) and some text.");
    }
    let link = non_empty(form.link.as_deref());
    if link.as_deref().is_some_and(|link| !validate_link(link)) {
        return refuse("Links should be full web addresses, such as https://example.com.");
    }

    // a file input left empty still submits an empty part
    let image_path = match form.image.as_mut().filter(|f| f.len() > 0) {
        Some(file) => match store_image(file, &config.upload_dir).await? {
            Ok(name) => Some(name),
            Err(refused) => return refuse(refused.message()),
        },
        None => None,
    };

    db.run(move |conn| {
        diesel::insert_into(promotions::table)
            .values((
                promotions::public_id.eq(gen_public_id()),
                promotions::title.eq(title),
                promotions::body.eq(text),
                promotions::link.eq(link),
                promotions::image_path.eq(image_path),
                promotions::is_active.eq(true),
                promotions::created_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;

    Ok(Flash::success(
        Redirect::to("/admin/promotions"),
        "Promotion published.",
    ))
}

#[post("/admin/promotions/<promotion_id>/toggle")]
pub async fn toggle_promotion(
    promotion_id: &str,
    _admin: Admin,
    db: DbConn,
) -> Result<Flash<Redirect>> {
    let promotion_id = promotion_id.to_string();
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, Error> {
            let promotion = promotions::table
                .filter(promotions::public_id.eq(&promotion_id))
                .select(Promotion::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| Error::not_found("promotion"))?;
            diesel::update(promotions::table.find(promotion.id))
                .set(promotions::is_active.eq(!promotion.is_active))
                .execute(conn)?;
            Ok(())
        })
    })
    .await?;
    Ok(Flash::success(
        Redirect::to("/admin/promotions"),
        "Promotion updated.",
    ))
}

#[post("/admin/promotions/<promotion_id>/delete")]
pub async fn delete_promotion(
    promotion_id: &str,
    _admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
) -> Result<Flash<Redirect>> {
    let promotion_id = promotion_id.to_string();
    let image = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let promotion = promotions::table
                    .filter(promotions::public_id.eq(&promotion_id))
                    .select(Promotion::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("promotion"))?;
                diesel::delete(promotions::table.find(promotion.id))
                    .execute(conn)?;
                Ok(promotion.image_path)
            })
        })
        .await?;
    if let Some(image) = image {
        remove_image(&config.upload_dir, &image).await;
    }
    Ok(Flash::success(
        Redirect::to("/admin/promotions"),
        "Promotion deleted.",
    ))
}

#[get("/admin/images")]
pub async fn images_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup> {
    let all = db
        .run(|conn| {
            homepage_images::table
                .order_by(homepage_images::position.asc())
                .then_order_by(homepage_images::id.asc())
                .select(HomepageImage::as_select())
                .load::<HomepageImage>(conn)
        })
        .await?;
    let next_position = all.last().map(|i| i.position + 1).unwrap_or(0);

    let body = html! {
        div class="row" {
            div class="col-md-7" {
                @if all.is_empty() {
                    p class="text-muted" { "No images yet. The homepage shows no gallery until one is uploaded." }
                }
                @for image in &all {
                    div class="card mb-3" {
                        img src=(url_of(&image.image_path)) class="card-img-top" alt="";
                        div class="card-body d-flex justify-content-between align-items-center" {
                            span {
                                span class="badge text-bg-secondary me-2" { (image.position) }
                                (image.caption.as_deref().unwrap_or_default())
                            }
                            form method="post" action={"/admin/images/" (image.public_id) "/delete"} {
                                button type="submit" class="btn btn-outline-danger btn-sm" { "Delete" }
                            }
                        }
                    }
                }
            }
            div class="col-md-5" {
                h2 class="h5" { "Upload an image" }
                form method="post" action="/admin/images" enctype="multipart/form-data" {
                    div class="mb-3" {
                        label for="image" class="form-label" { "Image" }
                        input type="file" class="form-control" id="image" name="image" accept="image/png,image/jpeg,image/gif,image/webp" required;
                    }
                    div class="mb-3" {
                        label for="caption" class="form-label" { "Caption (optional)" }
                        input type="text" class="form-control" id="caption" name="caption";
                    }
                    div class="mb-3" {
                        label for="position" class="form-label" { "Position" }
                        input type="number" class="form-control" id="position" name="position" value=(next_position);
                    }
                    button type="submit" class="btn btn-primary" { "Upload" }
                }
            }
        }
    };
    Ok(admin_page("Homepage images", body, admin, flash))
}

#[derive(FromForm)]
pub struct HomepageImageForm<'r> {
    pub caption: Option<String>,
    pub position: i64,
    pub image: TempFile<'r>,
}

#[post("/admin/images", data = "<form>")]
pub async fn upload_image(
    _admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
    mut form: Form<HomepageImageForm<'_>>,
    span: TracingSpan,
) -> Result<Flash<Redirect>> {
    let name = match store_image(&mut form.image, &config.upload_dir).await? {
        Ok(name) => name,
        Err(refused) => {
            return Ok(Flash::error(
                Redirect::to("/admin/images"),
                refused.message(),
            ))
        }
    };
    let caption = non_empty(form.caption.as_deref());
    let position = form.position;

    db.run(move |conn| {
        diesel::insert_into(homepage_images::table)
            .values((
                homepage_images::public_id.eq(gen_public_id()),
                homepage_images::caption.eq(caption),
                homepage_images::image_path.eq(name),
                homepage_images::position.eq(position),
                homepage_images::created_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;

    Ok(Flash::success(Redirect::to("/admin/images"), "Image uploaded."))
}

#[post("/admin/images/<image_id>/delete")]
pub async fn delete_image(
    image_id: &str,
    _admin: Admin,
    db: DbConn,
    config: &State<PortalConfig>,
) -> Result<Flash<Redirect>> {
    let image_id = image_id.to_string();
    let name = db
        .run(move |conn| {
            conn.transaction(|conn| -> Result<_, Error> {
                let image = homepage_images::table
                    .filter(homepage_images::public_id.eq(&image_id))
                    .select(HomepageImage::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::not_found("image"))?;
                diesel::delete(homepage_images::table.find(image.id))
                    .execute(conn)?;
                Ok(image.image_path)
            })
        })
        .await?;
    remove_image(&config.upload_dir, &name).await;
    Ok(Flash::success(Redirect::to("/admin/images"), "Image deleted."))
}

#[cfg(test)]
mod tests {
    use super::validate_link;

    #[test]
    fn links() {
        assert!(validate_link("https://example.com/fest"));
        assert!(validate_link("http://example.com"));
        assert!(!validate_link("javascript:alert(1)"));
        assert!(!validate_link("example.com"));
        assert!(!validate_link("ftp://example.com"));
    }
}
