// routes/qrcode.rs
// GET /qrcode -> PNG QR code of the signed-in user's otpauth URL.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::AppState;
use crate::totp::{otpauth_url, qr_png};

/// Builds and returns a PNG QR code so authenticator apps can scan and enrol.
pub async fn qrcode(State(st): State<Arc<AppState>>, session: SessionUser) -> AppResult<Response> {
    let user = session.user();
    let url = otpauth_url(st.issuer(), &user.email, &user.secret)?;
    let png = qr_png(&url, 200)?;
    let mut response = png.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    Ok(response)
}
