//! PNG and base64 encoding of rendered panels.

use std::io::Cursor;

use base64::Engine;
use image::{ImageFormat, RgbImage};

use crate::utils::error::{Result, ThermalSrError};

/// Encode an RGB panel as PNG bytes
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ThermalSrError::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Standard base64 of raw bytes, without a data-URI prefix
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_png_signature_and_decode() {
        let img = RgbImage::from_pixel(5, 3, Rgb([10, 20, 30]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_base64() {
        assert_eq!(to_base64(b"thermal"), "dGhlcm1hbA==");
    }
}
