use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

use crate::{constants::RECIPE_IMAGE_DIR, error::Error};

/// A decoded image upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Parses a `data:image/<type>;base64,<data>` string.
    pub fn from_data_url(value: &str) -> Result<Self, Error> {
        let invalid = || Error::validation("image", "Upload a valid image.");

        let (header, data) = value
            .trim()
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(invalid)?;

        let subtype = header
            .strip_suffix(";base64")
            .and_then(|mime| mime.strip_prefix("image/"))
            .filter(|subtype| !subtype.is_empty())
            .ok_or_else(invalid)?;

        let extension = match subtype.to_ascii_lowercase().as_str() {
            "png" => "png",
            "jpeg" | "jpg" => "jpg",
            "gif" => "gif",
            "webp" => "webp",
            _ => return Err(invalid()),
        };

        let bytes = STANDARD.decode(data.trim()).map_err(|_| invalid())?;
        if bytes.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            extension: extension.to_string(),
            bytes,
        })
    }
}

/// Accepts image uploads and hands back a retrievable URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, image: ImagePayload) -> Result<String, Error>;
}

/// Writes images below a media directory served under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, image: ImagePayload) -> Result<String, Error> {
        let name = format!("{}.{}", Uuid::new_v4(), image.extension);
        let directory = self.root.join(RECIPE_IMAGE_DIR);

        tokio::fs::create_dir_all(&directory).await?;
        tokio::fs::write(directory.join(&name), &image.bytes).await?;
        log::trace!("> Stored image {name}");

        Ok(format!("{}/{}/{}", self.base_url, RECIPE_IMAGE_DIR, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_is_decoded() {
        let image = ImagePayload::from_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "jpg");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn non_image_payloads_are_rejected() {
        assert!(ImagePayload::from_data_url("aGVsbG8=").is_err());
        assert!(ImagePayload::from_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,!!!").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,").is_err());
    }

    #[test]
    fn unknown_subtypes_are_field_errors() {
        for value in [
            "data:image/../x;base64,aGVsbG8=",
            "data:image/html;base64,aGVsbG8=",
            "data:image/svg+xml;base64,aGVsbG8=",
        ] {
            match ImagePayload::from_data_url(value) {
                Err(Error::Validation { field, .. }) => assert_eq!(field, "image"),
                other => panic!("{value}: unexpected {other:?}"),
            }
        }

        let image = ImagePayload::from_data_url("data:image/WEBP;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "webp");
    }

    #[tokio::test]
    async fn local_store_writes_below_media_root() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", Uuid::new_v4()));
        let store = LocalImageStore::new(&root, "/media/");

        let image = ImagePayload::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        let url = store.store(image).await.unwrap();

        assert!(url.starts_with("/media/recipes/images/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let written = tokio::fs::read(root.join(RECIPE_IMAGE_DIR).join(name))
            .await
            .unwrap();
        assert_eq!(written, b"hello");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
