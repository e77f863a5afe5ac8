use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Prefix of every stored recipe image key.
pub const RECIPE_IMAGE_PREFIX: &str = "uploads/recipe";

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// An upload that decoded successfully.
#[derive(Debug)]
pub struct CheckedImage {
    pub body: Bytes,
    pub ext: &'static str,
    pub content_type: &'static str,
}

/// Accepts the bytes only if they fully decode as a supported format.
pub fn check_image(body: Bytes) -> Result<CheckedImage, &'static str> {
    let format = image::guess_format(&body).map_err(|_| INVALID_IMAGE)?;
    let (ext, content_type) = ext_and_mime(format).ok_or(INVALID_IMAGE)?;
    image::load_from_memory_with_format(&body, format).map_err(|e| {
        debug!(error = %e, "image failed to decode");
        INVALID_IMAGE
    })?;
    Ok(CheckedImage {
        body,
        ext,
        content_type,
    })
}

fn ext_and_mime(format: ImageFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ImageFormat::Jpeg => Some(("jpg", "image/jpeg")),
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        ImageFormat::WebP => Some(("webp", "image/webp")),
        _ => None,
    }
}

/// Fresh storage key; a new name per upload so replaced files never collide.
pub fn recipe_image_key(ext: &str) -> String {
    format!("{}/{}.{}", RECIPE_IMAGE_PREFIX, Uuid::new_v4(), ext)
}

pub async fn store_image(st: &AppState, img: CheckedImage) -> anyhow::Result<String> {
    let key = recipe_image_key(img.ext);
    st.storage
        .put_object(&key, img.body, img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Best effort: a leftover blob is logged, not surfaced to the caller.
pub async fn remove_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to delete stored image");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn accepts_png_and_jpeg() {
        let png = check_image(Bytes::from(fixtures::encoded(ImageFormat::Png))).unwrap();
        assert_eq!((png.ext, png.content_type), ("png", "image/png"));

        let jpg = check_image(Bytes::from(fixtures::encoded(ImageFormat::Jpeg))).unwrap();
        assert_eq!((jpg.ext, jpg.content_type), ("jpg", "image/jpeg"));
    }

    #[test]
    fn rejects_non_images() {
        assert_eq!(check_image(Bytes::from_static(b"notimage")).unwrap_err(), INVALID_IMAGE);
        assert_eq!(check_image(Bytes::new()).unwrap_err(), INVALID_IMAGE);
    }

    #[test]
    fn rejects_truncated_image() {
        let mut png = fixtures::encoded(ImageFormat::Png);
        png.truncate(png.len() / 2);
        assert!(check_image(Bytes::from(png)).is_err());
    }

    #[test]
    fn keys_are_unique_under_prefix() {
        let a = recipe_image_key("png");
        let b = recipe_image_key("png");
        assert_ne!(a, b);
        assert!(a.starts_with("uploads/recipe/"));
        assert!(a.ends_with(".png"));
    }

    #[tokio::test]
    async fn store_then_remove() {
        let storage = Arc::new(MemoryStorage::default());
        let mut state = AppState::fake();
        state.storage = storage.clone();

        let img = check_image(Bytes::from(fixtures::encoded(ImageFormat::Png))).unwrap();
        let key = store_image(&state, img).await.unwrap();
        {
            let objects = storage.objects.lock().unwrap();
            let (_, ct) = objects.get(&key).expect("stored");
            assert_eq!(ct, "image/png");
        }

        remove_image(&state, &key).await;
        assert!(storage.objects.lock().unwrap().is_empty());
    }
}
