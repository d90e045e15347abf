// routes/auth.rs
// Public screens: login with email + one-time code, member signup, logout.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::session::{SessionUser, session_cookie};
use crate::state::{
    AppState, create_member_user, create_session, delete_session, find_user, link_members_to_user,
};
use crate::totp::{otpauth_url, verify_code};

use super::render;

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    sacco: String,
    email: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
struct SignupTemplate {
    sacco: String,
    email: String,
    display_name: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/enrol.html")]
pub(crate) struct EnrolTemplate {
    pub sacco: String,
    pub email: String,
    pub secret: String,
    pub otpauth_url: String,
    pub next: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

/// Landing page for an authenticated role.
pub fn home_path(admin: bool) -> &'static str {
    if admin { "/admin" } else { "/dashboard" }
}

fn with_session_cookie(mut response: Response, token: &str, ttl: u64) -> Response {
    if let Some(value) = session_cookie(token, ttl) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

pub async fn login_page(State(st): State<Arc<AppState>>) -> AppResult<Response> {
    Ok(render(LoginTemplate {
        sacco: st.config.sacco_name.clone(),
        email: String::new(),
        error: None,
    })?
    .into_response())
}

pub async fn login(
    State(st): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let user = find_user(&st, &form.email).await?;
    let verified = match &user {
        Some(user) => verify_code(st.issuer(), &user.email, &user.secret, form.code.trim())?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        warn!(email = %form.email.trim(), "login rejected");
        let page = render(LoginTemplate {
            sacco: st.config.sacco_name.clone(),
            email: form.email.trim().to_string(),
            error: Some("Invalid email or code".into()),
        })?;
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };

    let token = create_session(&st, &user.email).await?;
    info!(email = %user.email, role = user.role.as_str(), "login");
    Ok(with_session_cookie(
        Redirect::to(home_path(user.role.is_admin())).into_response(),
        &token,
        st.config.session_ttl_seconds,
    ))
}

pub async fn signup_page(State(st): State<Arc<AppState>>) -> AppResult<Response> {
    Ok(render(SignupTemplate {
        sacco: st.config.sacco_name.clone(),
        email: String::new(),
        display_name: String::new(),
        error: None,
    })?
    .into_response())
}

/// Creates the member login, links invited member rows and shows the enrolment code.
pub async fn signup(
    State(st): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    let rejected = |msg: &str| -> AppResult<Response> {
        let page = render(SignupTemplate {
            sacco: st.config.sacco_name.clone(),
            email: email.to_string(),
            display_name: form.display_name.clone(),
            error: Some(msg.to_string()),
        })?;
        Ok((StatusCode::BAD_REQUEST, page).into_response())
    };

    if email.is_empty() || !email.contains('@') {
        return rejected("Please enter a valid email address");
    }
    if find_user(&st, email).await?.is_some() {
        return rejected("An account already exists for this email");
    }

    let user = create_member_user(&st, email, Some(&form.display_name)).await?;
    if let Some(uid) = user.id {
        let linked = link_members_to_user(&st, &user.email, &uid).await?;
        info!(email = %user.email, linked, "signup linked member rows");
    }

    let token = create_session(&st, &user.email).await?;
    let page = render(EnrolTemplate {
        sacco: st.config.sacco_name.clone(),
        otpauth_url: otpauth_url(st.issuer(), &user.email, &user.secret)?,
        email: user.email,
        secret: user.secret,
        next: home_path(false).to_string(),
    })?;
    Ok(with_session_cookie(
        page.into_response(),
        &token,
        st.config.session_ttl_seconds,
    ))
}

pub async fn logout(State(st): State<Arc<AppState>>, session: SessionUser) -> AppResult<Response> {
    delete_session(&st, session.token()).await?;
    Ok(with_session_cookie(Redirect::to("/").into_response(), "", 0))
}
