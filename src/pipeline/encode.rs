//! Image encoding: `DynamicImage` → base64 PNG data URI.
//!
//! The SVG overlay embeds the rasterised page as its background so the
//! output file is self-contained. PNG keeps the scanned text crisp under
//! the translucent boxes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a `data:image/png;base64,…` URI.
pub fn encode_page(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(format!("data:image/png;base64,{b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let uri = encode_page(&img).expect("encode should succeed");
        let b64 = uri
            .strip_prefix("data:image/png;base64,")
            .expect("png data uri");
        let decoded = STANDARD.decode(b64).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
