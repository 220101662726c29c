use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::storage::StorageClient;

/// A recipe image decoded from a `data:image/<type>;base64,<payload>` URI.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub body: Bytes,
    pub content_type: String,
    pub ext: &'static str,
}

pub fn decode_data_uri(data: &str) -> Result<DecodedImage, ValidationError> {
    let invalid = |msg: &str| ValidationError::field("image", msg);

    let (meta, payload) = data
        .trim()
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| invalid("expected a base64 data URI"))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("expected a base64 data URI"))?
        .to_ascii_lowercase();
    let ext = ext_from_mime(&content_type).ok_or_else(|| invalid("unsupported image type"))?;

    let body = Base64::decode_vec(payload.trim()).map_err(|_| invalid("invalid base64"))?;
    if body.is_empty() {
        return Err(invalid("image is empty"));
    }

    Ok(DecodedImage {
        body: Bytes::from(body),
        content_type,
        ext,
    })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Uploads the image under a fresh `recipes/` key and returns that key.
pub async fn store_recipe_image(
    storage: &dyn StorageClient,
    image: DecodedImage,
) -> anyhow::Result<String> {
    let key = format!("recipes/{}.{}", Uuid::new_v4(), image.ext);
    storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("upload recipe image {key}"))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FakeStorage;

    // PNG signature, 8 bytes.
    const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn decodes_png_data_uri() {
        let img = decode_data_uri(PNG_URI).unwrap();
        assert_eq!(img.ext, "png");
        assert_eq!(img.content_type, "image/png");
        assert_eq!(&img.body[..4], b"\x89PNG");
    }

    #[test]
    fn rejects_plain_urls_and_unknown_types() {
        assert!(decode_data_uri("https://example.com/soup.png").is_err());
        assert!(decode_data_uri("data:application/pdf;base64,iVBORw0KGgo=").is_err());
        assert!(decode_data_uri("data:image/png,iVBORw0KGgo=").is_err());
    }

    #[test]
    fn rejects_broken_payload() {
        assert!(decode_data_uri("data:image/png;base64,***").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[tokio::test]
    async fn stored_key_lives_under_recipes() {
        let key = store_recipe_image(&FakeStorage, decode_data_uri(PNG_URI).unwrap())
            .await
            .unwrap();
        assert!(key.starts_with("recipes/"));
        assert!(key.ends_with(".png"));
    }
}
