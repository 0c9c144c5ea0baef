use db::{
    schema::site_settings,
    settings::{SiteSettings, SETTINGS_ROW},
    user::{Admin, User},
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
use ui::form_error;

use super::admin_page;
use crate::{error::Result, util::non_empty};

fn settings_form(settings: &SiteSettings, error: Option<&str>) -> Markup {
    html! {
        div class="col-md-8" {
            (form_error(error))
            form method="post" action="/admin/settings" {
                div class="mb-3" {
                    label for="site_title" class="form-label" { "Site title" }
                    input type="text" class="form-control" id="site_title" name="site_title" value=(settings.site_title) required;
                }
                div class="mb-3" {
                    label for="announcement" class="form-label" { "Announcement (shown on the home page)" }
                    textarea class="form-control" id="announcement" name="announcement" rows="3" {
                        (settings.announcement.as_deref().unwrap_or_default())
                    }
                }
                div class="mb-3" {
                    label for="contact_email" class="form-label" { "Contact email" }
                    input type="email" class="form-control" id="contact_email" name="contact_email" value=(settings.contact_email.as_deref().unwrap_or_default());
                }
                div class="form-check mb-3" {
                    input class="form-check-input" type="checkbox" id="registrations_enabled" name="registrations_enabled" value="true" checked[settings.registrations_enabled];
                    label class="form-check-label" for="registrations_enabled" {
                        "Accept new accounts and event registrations"
                    }
                }
                button type="submit" class="btn btn-primary" { "Save" }
            }
        }
    }
}

#[get("/admin/settings")]
pub async fn settings_page(
    admin: Admin,
    db: DbConn,
    flash: Option<FlashMessage<'_>>,
) -> Result<Markup> {
    let settings = db.run(|conn| SiteSettings::load(conn)).await?;
    Ok(admin_page(
        "Settings",
        settings_form(&settings, None),
        admin,
        flash,
    ))
}

#[derive(FromForm, Serialize, Debug)]
pub struct SettingsForm {
    pub site_title: String,
    pub announcement: Option<String>,
    pub contact_email: Option<String>,
    pub registrations_enabled: bool,
}

#[post("/admin/settings", data = "<form>")]
pub async fn save_settings(
    admin: Admin,
    db: DbConn,
    form: Form<SettingsForm>,
    span: TracingSpan,
) -> Result<std::result::Result<Flash<Redirect>, Markup>> {
    let form = form.into_inner();
    let settings = SiteSettings {
        id: SETTINGS_ROW,
        site_title: form.site_title.trim().to_string(),
        announcement: non_empty(form.announcement.as_deref()),
        registrations_enabled: form.registrations_enabled,
        contact_email: non_empty(form.contact_email.as_deref())
            .map(|email| email.to_lowercase()),
    };

    let error = if settings.site_title.is_empty()
        || settings.site_title.chars().count() > 80
    {
        Some("The site title should be between 1 and 80 characters long.")
    } else if settings
        .contact_email
        .as_deref()
        .is_some_and(|email| !User::validate_email(email))
    {
        Some("The contact email is not a valid email address.")
    } else {
        None
    };
    if let Some(error) = error {
        return Ok(Err(admin_page(
            "Settings",
            settings_form(&settings, Some(error)),
            admin,
            None,
        )));
    }

    db.run(move |conn| {
        diesel::update(site_settings::table.find(SETTINGS_ROW))
            .set((
                site_settings::site_title.eq(settings.site_title),
                site_settings::announcement.eq(settings.announcement),
                site_settings::registrations_enabled
                    .eq(settings.registrations_enabled),
                site_settings::contact_email.eq(settings.contact_email),
            ))
            .execute(conn)
    })
    .instrument(span.0)
    .await?;
    tracing::info!(by = admin.0.id, "updated site settings");

    Ok(Ok(Flash::success(
        Redirect::to("/admin/settings"),
        "Settings saved.",
    )))
}
