use config::{Gateway, PortalConfig};
use db::DbConn;
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use maud::Markup;
use rocket::{
    fairing::AdHoc,
    figment::{
        util::map,
        value::{Map, Value},
        Figment,
    },
    response::Redirect,
    Build, Rocket,
};
use trace_request::RequestTracingFairing;
use ui::{error_403, error_404};

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod home_page;
pub mod ideas;
pub mod notifications;
pub mod permissions;
pub mod qr;
pub mod registration;
pub mod resources;
pub mod teams;
pub mod uploads;
pub mod util;

#[cfg(test)]
mod tests;

#[macro_use]
extern crate rocket;

pub const MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("../../migrations");

#[catch(401)]
fn unauthorized() -> Redirect {
    Redirect::to("/login")
}

#[catch(403)]
fn forbidden() -> Markup {
    error_403(Some("You do not have permission to view this page."), None)
}

#[catch(404)]
fn not_found() -> Markup {
    error_404(Some("There is nothing at this address."), None)
}

/// Rocket's figment with the database pointed at `DATABASE_URL` (or
/// `default_db`) and upload-sized request limits.
pub fn portal_figment(default_db: &str) -> Figment {
    let db: Map<_, Value> = map![
        "url" => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| default_db.to_string())
            .into(),
        "pool_size" => 10.into(),
        "timeout" => 5.into(),
    ];

    rocket::Config::figment()
        .merge(("databases", map!["database" => db]))
        .merge((
            "limits",
            map!["file" => "6MiB", "data-form" => "8MiB"],
        ))
}

pub fn make_rocket(default_db: &str) -> Rocket<Build> {
    make_rocket_with(portal_figment(default_db), None)
}

/// Builds the application. `gateway` replaces the payment gateway the
/// configuration would select.
pub fn make_rocket_with(
    figment: Figment,
    gateway: Option<Gateway>,
) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(AdHoc::try_on_ignite("migrations", |rocket| async move {
            let Some(db_conn) = DbConn::get_one(&rocket).await else {
                tracing::error!("no database connection for migrations");
                return Err(rocket);
            };

            let ret: Result<(), Box<dyn std::error::Error + Send + Sync>> =
                db_conn
                    .run(move |conn| {
                        conn.run_pending_migrations(MIGRATIONS)?;
                        Ok(())
                    })
                    .await;

            match ret {
                Ok(_) => Ok(rocket),
                Err(e) => {
                    tracing::error!(error = %e, "could not run migrations");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("portal config", move |rocket| async move {
            let config: PortalConfig =
                match rocket.figment().focus("portal").extract() {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::error!(error = %e, "invalid portal configuration");
                        return Err(rocket);
                    }
                };
            if let Err(e) =
                rocket::tokio::fs::create_dir_all(&config.upload_dir).await
            {
                tracing::error!(
                    error = %e,
                    dir = %config.upload_dir.display(),
                    "could not create the upload directory"
                );
                return Err(rocket);
            }
            tracing::info!(?config, "loaded portal configuration");

            let gateway = match gateway {
                Some(gateway) => gateway,
                None => match config.payments.gateway() {
                    Ok(gateway) => gateway,
                    Err(e) => {
                        tracing::error!(error = e, "invalid payment configuration");
                        return Err(rocket);
                    }
                },
            };
            Ok(rocket.manage(config).manage(gateway))
        }))
        .attach(RequestTracingFairing)
        .register("/", catchers![unauthorized, forbidden, not_found])
        .mount(
            "/",
            routes![
                home_page::index,
                uploads::uploaded_file,
                auth::login::login_page,
                auth::login::do_login,
                auth::logout::logout,
                auth::register::register_page,
                auth::register::do_register,
                auth::profile::profile_page,
                auth::profile::update_profile,
                auth::change_password::change_password_form,
                auth::change_password::do_change_password,
                events::list_events,
                events::event_detail,
                registration::register_individual,
                registration::my_registrations,
                teams::create_team,
                teams::request_to_join,
                teams::decide_join_request,
                teams::leave_team,
                teams::remove_member,
                teams::disband_team,
                teams::lock_team,
                teams::pay_for_team,
                teams::team_page,
                checkout::checkout_page,
                checkout::payment_callback,
                ideas::ideas_page,
                ideas::submit_idea,
                notifications::notifications_page,
                notifications::mark_read,
                notifications::mark_all_read,
                admin::dashboard,
                admin::setup::setup_page,
                admin::setup::do_setup,
                admin::events::events_page,
                admin::events::new_event_page,
                admin::events::create_event,
                admin::events::edit_event_page,
                admin::events::update_event,
                admin::events::delete_event_page,
                admin::events::delete_event,
                admin::events::toggle_registrations,
                admin::events::participants_page,
                admin::events::participants_csv_download,
                admin::events::toggle_attendance,
                admin::users::users_page,
                admin::users::set_role,
                admin::content::promotions_page,
                admin::content::create_promotion,
                admin::content::toggle_promotion,
                admin::content::delete_promotion,
                admin::content::images_page,
                admin::content::upload_image,
                admin::content::delete_image,
                admin::ideas::ideas_admin_page,
                admin::ideas::set_idea_status,
                admin::ideas::delete_idea,
                admin::attendance::attendance_page,
                admin::attendance::scan_pass,
                admin::notify::notify_page,
                admin::notify::send_notification,
                admin::settings::settings_page,
                admin::settings::save_settings,
                admin::payments::payments_page,
                admin::payments::reconcile,
            ],
        )
}
