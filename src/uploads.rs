//! Product and avatar image uploads.
//!
//! The webview hands over file contents as base64 (optionally a full data
//! URL). The bytes are decoded and verified to be a real PNG or JPEG before
//! they ship to the storage bucket; the returned public URL is what ends up
//! on the product or customer record.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::store::Store;

/// Single storage bucket shared by product and customer images.
pub const BUCKET: &str = "products";

/// Decode a base64 payload, tolerating a `data:image/...;base64,` prefix.
fn decode_payload(data: &str) -> Result<Vec<u8>, PosError> {
    let raw = match data.split_once(";base64,") {
        Some((_, b64)) => b64,
        None => data,
    };
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD
        .decode(compact)
        .map_err(|_| PosError::validation("Dữ liệu ảnh không hợp lệ"))
}

/// Sniff and fully decode the image, returning `(extension, content type)`.
fn validate_image(bytes: &[u8]) -> Result<(&'static str, &'static str), PosError> {
    let format = image::guess_format(bytes)
        .map_err(|_| PosError::validation("File ảnh không hợp lệ"))?;
    let (ext, content_type) = match format {
        ImageFormat::Png => ("png", "image/png"),
        ImageFormat::Jpeg => ("jpg", "image/jpeg"),
        _ => {
            return Err(PosError::validation(
                "Định dạng ảnh không được hỗ trợ (PNG/JPEG)",
            ))
        }
    };
    // A correct magic number is not enough; decode to catch truncated files.
    image::load_from_memory(bytes).map_err(|_| PosError::validation("File ảnh không hợp lệ"))?;
    Ok((ext, content_type))
}

/// Upload an image and return its public URL. `kind` prefixes the object
/// name (`prod` for products, `cust` for customer avatars).
pub async fn upload_image(store: &dyn Store, kind: &str, data: &str) -> Result<String, PosError> {
    let bytes = decode_payload(data)?;
    let (ext, content_type) = validate_image(&bytes)?;

    let path = format!("{}_{}.{}", kind, Uuid::new_v4(), ext);
    store
        .upload_object(BUCKET, &path, bytes, content_type)
        .await?;
    let url = store.public_url(BUCKET, &path)?;

    info!(path, "image uploaded");
    Ok(url)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png_base64() -> String {
        let img = ImageBuffer::from_pixel(2, 2, Rgb::<u8>([220, 160, 60]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        BASE64_STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn uploads_a_valid_png_and_returns_public_url() {
        let store = MemoryStore::new();
        let url = upload_image(&store, "prod", &png_base64()).await.unwrap();
        assert!(url.starts_with("memory://products/prod_"));
        assert!(url.ends_with(".png"));
        assert_eq!(store.uploads().len(), 1);
    }

    #[tokio::test]
    async fn accepts_data_url_prefix() {
        let store = MemoryStore::new();
        let data = format!("data:image/png;base64,{}", png_base64());
        let url = upload_image(&store, "cust", &data).await.unwrap();
        assert!(url.contains("/cust_"));
    }

    #[tokio::test]
    async fn rejects_invalid_base64() {
        let store = MemoryStore::new();
        let err = upload_image(&store, "prod", "not base64 at all!!!")
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.uploads().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_image_bytes() {
        let store = MemoryStore::new();
        let data = BASE64_STANDARD.encode(b"plain text pretending to be an image");
        let err = upload_image(&store, "prod", &data).await.unwrap_err();
        assert!(err.is_validation());
        assert!(store.uploads().is_empty());
    }
}
