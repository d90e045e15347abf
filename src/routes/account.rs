// routes/account.rs
// Profile screen: display name and TOTP secret rotation.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{AppState, rotate_secret, update_display_name};
use crate::totp::otpauth_url;

use super::{EnrolTemplate, Page, home_path, render};

#[derive(Template)]
#[template(path = "account.html")]
struct AccountTemplate {
    page: Page,
    email: String,
    display_name: String,
    role: String,
}

#[derive(Deserialize)]
pub struct AccountForm {
    pub display_name: String,
}

pub async fn account_edit(session: SessionUser) -> AppResult<Html<String>> {
    render(AccountTemplate {
        page: Page::new(&session, "Profile"),
        email: session.email().to_string(),
        display_name: session.user().display_name.clone().unwrap_or_default(),
        role: session.user().role.as_str().to_string(),
    })
}

pub async fn account_update(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Form(form): Form<AccountForm>,
) -> AppResult<Response> {
    let id = session.user_id().ok_or(AppError::Unauthorized)?;
    update_display_name(&st, id, &form.display_name).await?;
    Ok(Redirect::to("/account").into_response())
}

/// Issues a new secret; the old authenticator entry stops working.
pub async fn account_rotate_secret(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let id = session.user_id().ok_or(AppError::Unauthorized)?;
    let secret = rotate_secret(&st, id).await?;
    info!(email = %session.email(), "secret rotated");
    render(EnrolTemplate {
        sacco: st.config.sacco_name.clone(),
        email: session.email().to_string(),
        otpauth_url: otpauth_url(st.issuer(), session.email(), &secret)?,
        secret,
        next: home_path(session.is_admin()).to_string(),
    })
}
