use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{homepage_images, promotions};

/// A banner shown on the public homepage.
#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = promotions)]
pub struct Promotion {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    /// Name of the uploaded file, relative to the upload directory.
    pub image_path: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = homepage_images)]
pub struct HomepageImage {
    pub id: i64,
    pub public_id: String,
    pub caption: Option<String>,
    pub image_path: String,
    pub position: i64,
    pub created_at: NaiveDateTime,
}
