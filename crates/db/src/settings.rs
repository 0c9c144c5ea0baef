use diesel::prelude::*;
use serde::Serialize;

use crate::schema::site_settings;

/// The id of the single row of `site_settings`.
pub const SETTINGS_ROW: i64 = 1;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = site_settings)]
pub struct SiteSettings {
    pub id: i64,
    pub site_title: String,
    pub announcement: Option<String>,
    pub registrations_enabled: bool,
    pub contact_email: Option<String>,
}

impl SiteSettings {
    /// Loads the settings row, which the initial migration creates.
    pub fn load(
        conn: &mut (impl Connection<Backend = diesel::sqlite::Sqlite>
                  + diesel::connection::LoadConnection),
    ) -> QueryResult<SiteSettings> {
        site_settings::table
            .filter(site_settings::id.eq(SETTINGS_ROW))
            .select(SiteSettings::as_select())
            .first(conn)
    }
}
