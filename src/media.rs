use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    error::{Error, HtmlError},
};

/// An uploaded image received as `data:image/<type>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn parse(value: &str) -> Result<Self, String> {
        let (header, payload) = value
            .split_once(',')
            .ok_or_else(|| "Expected a base64 encoded data URL".to_string())?;

        let mime = header
            .strip_prefix("data:image/")
            .and_then(|rest| rest.strip_suffix(";base64"))
            .ok_or_else(|| "Expected a base64 encoded image".to_string())?;

        let extension = IMAGE_EXTENSIONS
            .iter()
            .find(|(subtype, _)| subtype.eq_ignore_ascii_case(mime))
            .map(|(_, extension)| *extension)
            .ok_or_else(|| format!("Unsupported image type: {mime}"))?;

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("Invalid image data: {e}"))?;
        if bytes.is_empty() {
            return Err("The submitted image is empty".to_string());
        }

        Ok(Self { extension, bytes })
    }
}

/// Decodes the `image` field of a request, reporting failures against it.
pub fn decode_image(value: &str) -> Result<ImageUpload, Error> {
    ImageUpload::parse(value).map_err(|e| HtmlError::InvalidRequest.field("image", &e))
}

/// Writes the image under `<media_root>/recipes/` and returns its path
/// relative to `media_root`.
pub async fn store_image(upload: &ImageUpload, media_root: &Path) -> Result<String, Error> {
    let directory = media_root.join(RECIPE_IMAGE_DIR);
    tokio::fs::create_dir_all(&directory).await.map_err(|e| {
        log::error!("Failed to create {}: {e}", directory.display());
        HtmlError::InternalServerError.new("Failed to store image")
    })?;

    let name = format!("{}.{}", uuid::Uuid::new_v4(), upload.extension);
    let path = directory.join(&name);
    tokio::fs::write(&path, &upload.bytes).await.map_err(|e| {
        log::error!("Failed to write {}: {e}", path.display());
        HtmlError::InternalServerError.new("Failed to store image")
    })?;

    Ok(format!("{RECIPE_IMAGE_DIR}/{name}"))
}

/// Best effort; a file left behind is only logged.
pub async fn remove_image(relative: &str, media_root: &Path) {
    if relative.is_empty() {
        return;
    }
    let path = media_root.join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        log::warn!("Failed to remove {}: {e}", path.display());
    }
}

pub fn image_url(media_url: &str, relative: &str) -> String {
    format!("{media_url}{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_url() {
        let upload = ImageUpload::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();

        assert_eq!(upload.extension, "png");
        assert_eq!(&upload.bytes[1..4], b"PNG");
    }

    #[test]
    fn jpeg_is_stored_as_jpg() {
        let upload = ImageUpload::parse("data:image/jpeg;base64,/9j/4AAQ").unwrap();

        assert_eq!(upload.extension, "jpg");
    }

    #[test]
    fn rejects_non_images_and_bad_payloads() {
        assert!(ImageUpload::parse("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(ImageUpload::parse("data:image/png;base64,***").is_err());
        assert!(ImageUpload::parse("iVBORw0KGgo=").is_err());
        assert!(ImageUpload::parse("data:image/png;base64,").is_err());
    }

    #[tokio::test]
    async fn stores_and_removes_files() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let upload = ImageUpload::parse("data:image/gif;base64,R0lGODlh").unwrap();

        let relative = store_image(&upload, &root).await.unwrap();
        assert!(relative.starts_with("recipes/") && relative.ends_with(".gif"));
        assert_eq!(tokio::fs::read(root.join(&relative)).await.unwrap(), b"GIF89a");

        remove_image(&relative, &root).await;
        assert!(!root.join(&relative).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn decoding_failures_are_scoped_to_the_image_field() {
        let error = decode_image("not an image").unwrap_err();

        assert_eq!(error.code, 400);
        assert_eq!(error.field.as_deref(), Some("image"));
        assert!(decode_image("data:image/webp;base64,UklGRg==").is_ok());
    }

    #[test]
    fn urls_join_prefix_and_path() {
        assert_eq!(image_url("/media/", "recipes/a.png"), "/media/recipes/a.png");
    }
}
