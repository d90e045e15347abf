use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{
    AppState, InviteOutcome, ROSTER_PERIOD, get_member, invite_member, roster_invite, roster_status,
    sync_roster_member,
};

use super::members::members_url;
use crate::routes::{Page, parse_id, render};

struct RosterLine {
    name: String,
    exists: bool,
    email: String,
    status: String,
}

#[derive(Template)]
#[template(path = "admin/invite.html")]
struct InviteTemplate {
    page: Page,
    roster_period: &'static str,
    roster: Vec<RosterLine>,
}

#[derive(Deserialize)]
pub struct InviteForm {
    pub email: String,
}

#[derive(Deserialize)]
pub struct RosterForm {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

pub async fn invite_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let roster = roster_status(&st)
        .await?
        .into_iter()
        .map(|row| RosterLine {
            exists: row.exists(),
            email: row
                .member
                .as_ref()
                .and_then(|m| m.email.clone())
                .unwrap_or_default(),
            status: row
                .member
                .as_ref()
                .and_then(|m| m.invite_status)
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            name: row.name,
        })
        .collect();

    render(InviteTemplate {
        page: Page::new(&session, "Invite members"),
        roster_period: ROSTER_PERIOD,
        roster,
    })
}

/// Attaches an email to a registry member.
pub async fn member_invite(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<InviteForm>,
) -> AppResult<Response> {
    if !valid_email(&form.email) {
        return Err(AppError::bad_request("Please enter a valid email address"));
    }
    let id = parse_id(&id)?;
    let member = get_member(&st, &id)
        .await?
        .ok_or(AppError::NotFound("member"))?;
    match invite_member(&st, &id, &form.email).await? {
        InviteOutcome::Sent => Ok(Redirect::to(&members_url(&member.period)).into_response()),
        InviteOutcome::EmailTaken(other) => {
            warn!(email = %form.email.trim(), "invite email already in use");
            Err(AppError::bad_request(format!(
                "This email is already used by {other}"
            )))
        }
        InviteOutcome::MemberMissing => Err(AppError::NotFound("member")),
    }
}

pub async fn roster_sync(
    State(st): State<Arc<AppState>>,
    Form(form): Form<RosterForm>,
) -> AppResult<Response> {
    if !st.roster.iter().any(|n| n == &form.name) {
        return Err(AppError::bad_request("Name is not on the roster"));
    }
    sync_roster_member(&st, &form.name).await?;
    Ok(Redirect::to("/admin/invite").into_response())
}

pub async fn roster_send_invite(
    State(st): State<Arc<AppState>>,
    Form(form): Form<RosterForm>,
) -> AppResult<Response> {
    if !valid_email(&form.email) {
        return Err(AppError::bad_request("Please enter a valid email address"));
    }
    if !roster_invite(&st, &form.name, &form.email).await? {
        return Err(AppError::bad_request("Sync this member before inviting"));
    }
    Ok(Redirect::to("/admin/invite").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(valid_email("jane@mitewa.co.ke"));
        assert!(!valid_email("jane"));
        assert!(!valid_email("@mitewa.co.ke"));
        assert!(!valid_email("jane doe@mitewa.co.ke"));
    }
}
