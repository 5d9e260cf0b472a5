use crate::error::Error;
use crate::pubkey::PublicKey;
use qrcode::render::unicode;
use qrcode::QrCode;
use std::path::Path;

/// Something that can read a QR code out of an image (a camera frame, a
/// screenshot). We only rely on it returning the raw text it found.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, image: &[u8]) -> Result<String, Error>;
}

/// The QR code for a key. The payload is the bare key, no framing.
pub fn qr_code(pubkey: &PublicKey) -> Result<QrCode, Error> {
    Ok(QrCode::new(pubkey.as_str().as_bytes())?)
}

/// Render for a terminal, two modules per character cell
pub fn render_terminal(pubkey: &PublicKey) -> Result<String, Error> {
    let code = qr_code(pubkey)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// Write the code as a PNG
pub fn save_png(pubkey: &PublicKey, path: &Path) -> Result<(), Error> {
    let image = qr_code(pubkey)?
        .render::<image::Luma<u8>>()
        .min_dimensions(256, 256)
        .build();
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render_own_key() {
        let pk = PublicKey::try_from_str(
            "MCowBQYDK2VwAyEAaGHMrIKC3h27SO99YbKEUfUEXDOXjJHYOA5uWHR/rCU=",
        )
        .unwrap();
        let code = qr_code(&pk).unwrap();
        assert!(code.width() >= 21);

        let text = render_terminal(&pk).unwrap();
        assert!(text.lines().count() >= code.width() / 2);
    }

    #[test]
    fn test_save_png() {
        let pk = PublicKey::try_from_str("abc").unwrap();
        let path = std::env::temp_dir().join(format!("murmur-qr-test-{}.png", std::process::id()));
        save_png(&pk, &path).unwrap();
        let img = image::open(&path).unwrap();
        assert!(img.width() >= 256);
        let _ = std::fs::remove_file(&path);
    }
}
