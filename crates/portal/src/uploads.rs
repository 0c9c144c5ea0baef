//! Images uploaded by administrators for promotions and the homepage.

use std::path::{Path, PathBuf};

use rocket::{fs::NamedFile, fs::TempFile, http::ContentType, State};
use uuid::Uuid;

use crate::{config::PortalConfig, error::Result};

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// File extension for each accepted image type.
fn extension_of(content_type: &ContentType) -> Option<&'static str> {
    if *content_type == ContentType::PNG {
        Some("png")
    } else if *content_type == ContentType::JPEG {
        Some("jpg")
    } else if *content_type == ContentType::GIF {
        Some("gif")
    } else if *content_type == ContentType::WEBP {
        Some("webp")
    } else {
        None
    }
}

/// Why an upload was refused; shown to the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refused {
    Empty,
    TooLarge,
    NotAnImage,
}

impl Refused {
    pub fn message(&self) -> &'static str {
        match self {
            Refused::Empty => "Please choose an image to upload.",
            Refused::TooLarge => "Images may be at most 5 MiB.",
            Refused::NotAnImage => "Only PNG, JPEG, GIF and WebP images are accepted.",
        }
    }
}

pub fn check_image(
    content_type: Option<&ContentType>,
    len: u64,
) -> std::result::Result<&'static str, Refused> {
    if len == 0 {
        return Err(Refused::Empty);
    }
    if len > MAX_IMAGE_BYTES {
        return Err(Refused::TooLarge);
    }
    content_type.and_then(extension_of).ok_or(Refused::NotAnImage)
}

/// Stores an uploaded image under a fresh name and returns that name.
pub async fn store_image(
    file: &mut TempFile<'_>,
    upload_dir: &Path,
) -> Result<std::result::Result<String, Refused>> {
    let extension = match check_image(file.content_type(), file.len()) {
        Ok(extension) => extension,
        Err(refused) => return Ok(Err(refused)),
    };
    let name = format!("{}.{extension}", Uuid::new_v4().simple());
    file.copy_to(upload_dir.join(&name)).await?;
    tracing::info!(%name, bytes = file.len(), "stored uploaded image");
    Ok(Ok(name))
}

/// Removing the file is best effort: the database row is already gone.
pub async fn remove_image(upload_dir: &Path, name: &str) {
    if !is_stored_name(name) {
        tracing::warn!(%name, "refusing to remove a file outside the upload directory");
        return;
    }
    if let Err(e) = rocket::tokio::fs::remove_file(upload_dir.join(name)).await
    {
        tracing::warn!(%name, error = %e, "could not remove uploaded image");
    }
}

/// Names handed out by [`store_image`]: hex, a dot and an extension.
fn is_stored_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && stem.chars().all(|c| c.is_ascii_hexdigit())
                && ["png", "jpg", "gif", "webp"].contains(&ext)
        }
        None => false,
    }
}

pub fn url_of(name: &str) -> String {
    format!("/uploads/{name}")
}

#[get("/uploads/<name>")]
pub async fn uploaded_file(
    name: &str,
    config: &State<PortalConfig>,
) -> Option<NamedFile> {
    if !is_stored_name(name) {
        return None;
    }
    let path: PathBuf = config.upload_dir.join(name);
    NamedFile::open(path).await.ok()
}

#[cfg(test)]
mod tests {
    use rocket::http::ContentType;

    use super::*;

    #[test]
    fn only_small_images_are_accepted() {
        assert_eq!(check_image(Some(&ContentType::PNG), 1024), Ok("png"));
        assert_eq!(check_image(Some(&ContentType::JPEG), 1024), Ok("jpg"));
        assert_eq!(
            check_image(Some(&ContentType::PNG), MAX_IMAGE_BYTES + 1),
            Err(Refused::TooLarge)
        );
        assert_eq!(
            check_image(Some(&ContentType::PDF), 1024),
            Err(Refused::NotAnImage)
        );
        assert_eq!(check_image(None, 1024), Err(Refused::NotAnImage));
        assert_eq!(check_image(Some(&ContentType::PNG), 0), Err(Refused::Empty));
    }

    #[test]
    fn stored_names_cannot_escape_the_upload_directory() {
        assert!(is_stored_name("0123abcd.png"));
        assert!(!is_stored_name("../secret.png"));
        assert!(!is_stored_name("abcd.exe"));
        assert!(!is_stored_name("abcd"));
    }
}
