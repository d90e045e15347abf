// totp.rs
// One-time code login: TOTP construction, secret generation and the enrolment QR image.

use std::io::Cursor;

use anyhow::{Context, Result};
use data_encoding::BASE32_NOPAD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use rand::RngCore;
use totp_rs::{Algorithm, Secret, TOTP};

pub const MIN_SECRET_BYTES: usize = 16; // 128 bits
pub const DEFAULT_SECRET_BYTES: usize = 20; // 160 bits

/// TOTP for `email` issued by the society. The decoded secret must be at least 128 bits.
pub fn build_totp(issuer: &str, email: &str, base32_secret: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(base32_secret.to_string())
        .to_bytes()
        .map_err(|e| anyhow::anyhow!("secret is not valid base32: {e:?}"))?;
    if secret.len() < MIN_SECRET_BYTES {
        anyhow::bail!(
            "shared secret too short: {} bytes, need >= {}",
            secret.len(),
            MIN_SECRET_BYTES
        );
    }
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1, // ±1 step of clock drift
        30,
        secret,
        Some(issuer.to_string()),
        email.to_string(),
    )?;
    Ok(totp)
}

/// True when `code` matches the current (or an adjacent) time step.
pub fn verify_code(issuer: &str, email: &str, base32_secret: &str, code: &str) -> Result<bool> {
    let totp = build_totp(issuer, email, base32_secret)?;
    Ok(totp.check_current(code.trim()).unwrap_or(false))
}

pub fn otpauth_url(issuer: &str, email: &str, base32_secret: &str) -> Result<String> {
    Ok(build_totp(issuer, email, base32_secret)?.get_url())
}

pub fn generate_base32_secret_n(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes.max(MIN_SECRET_BYTES)];
    rand::rng().fill_bytes(&mut buf);
    BASE32_NOPAD.encode(&buf)
}

/// PNG of the otpauth URL for authenticator apps.
pub fn qr_png(url: &str, min_size: u32) -> Result<Vec<u8>> {
    let code = QrCode::new(url.as_bytes()).context("failed to build qr")?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(min_size, min_size)
        .build();
    let mut cursor = Cursor::new(Vec::<u8>::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .context("failed to encode qr png")?;
    Ok(cursor.into_inner())
}
