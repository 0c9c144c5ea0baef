use db::{
    event::Event,
    schema::{events, team_members, teams},
    settings::SiteSettings,
    team::Team,
    user::User,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};

use crate::resources::{EventRef, TeamRef};

#[derive(Debug)]
/// A permission for a given resource on the system.
pub enum Permission {
    RegisterAsNewUser,
    /// Register for an event, individually or by forming a team.
    RegisterForEvent(EventRef),
    /// Decide join requests, remove members, lock and disband.
    ManageTeam(TeamRef),
    ViewTeam(TeamRef),
    AdministerSite,
}

/// Returns whether a requester has the requisite permission on the given
/// object.
#[tracing::instrument(skip(conn))]
pub fn has_permission(
    user: Option<&User>,
    permission: &Permission,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> QueryResult<bool> {
    match permission {
        Permission::RegisterAsNewUser => {
            Ok(SiteSettings::load(conn)?.registrations_enabled)
        }
        Permission::RegisterForEvent(EventRef(event_id)) => {
            if user.is_none() {
                return Ok(false);
            }
            check_event_is_open(conn, *event_id)
        }
        Permission::ManageTeam(TeamRef(team_id)) => {
            let Some(user) = user else {
                return Ok(false);
            };
            let team = teams::table
                .find(team_id)
                .select(Team::as_select())
                .first(conn)
                .optional()?;
            Ok(team.is_some_and(|team| team.is_led_by(user.id)))
        }
        Permission::ViewTeam(TeamRef(team_id)) => match user {
            Some(user) if user.is_admin() => Ok(true),
            Some(user) => diesel::select(diesel::dsl::exists(
                team_members::table
                    .filter(team_members::team_id.eq(team_id))
                    .filter(team_members::user_id.eq(user.id)),
            ))
            .get_result(conn),
            None => Ok(false),
        },
        Permission::AdministerSite => {
            Ok(user.map(|user| user.is_admin()).unwrap_or(false))
        }
    }
}

/// Registrations must be open both site-wide and for the event itself.
#[tracing::instrument(skip(conn))]
fn check_event_is_open(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    event_id: i64,
) -> QueryResult<bool> {
    if !SiteSettings::load(conn)?.registrations_enabled {
        return Ok(false);
    }
    let event = events::table
        .find(event_id)
        .select(Event::as_select())
        .first(conn)
        .optional()?;
    Ok(event.is_some_and(|event| event.registrations_open))
}
