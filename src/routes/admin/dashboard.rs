use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::calc::format_amount;
use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{
    AppState, PeriodOutcome, count_members, count_pending_requests, count_unread_user_messages,
    create_period, list_periods, total_loan_amount, total_savings_amount,
};

use crate::routes::{Page, render};

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    page: Page,
    members: u64,
    loans: String,
    savings: String,
    pending_requests: u64,
    unread_messages: u64,
    periods: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewPeriodForm {
    pub name: String,
    #[serde(default)]
    pub back: Option<String>,
}

pub async fn admin_dashboard(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    render(DashboardTemplate {
        page: Page::new(&session, "Dashboard"),
        members: count_members(&st).await?,
        loans: format_amount(total_loan_amount(&st).await?),
        savings: format_amount(total_savings_amount(&st).await?),
        pending_requests: count_pending_requests(&st).await?,
        unread_messages: count_unread_user_messages(&st).await?,
        periods: list_periods(&st).await?,
    })
}

/// Creates a financial year and returns to the calling screen.
pub async fn periods_create(
    State(st): State<Arc<AppState>>,
    Form(form): Form<NewPeriodForm>,
) -> AppResult<Response> {
    match create_period(&st, &form.name).await? {
        PeriodOutcome::Created(_) => {}
        PeriodOutcome::Empty => return Err(AppError::bad_request("Period name is required")),
        PeriodOutcome::Exists => {
            warn!(period = form.name.trim(), "financial year already exists");
            return Err(AppError::bad_request("This period already exists"));
        }
    }
    let back = form
        .back
        .filter(|b| b.starts_with('/') && !b.starts_with("//"))
        .unwrap_or_else(|| "/admin".to_string());
    Ok(Redirect::to(&back).into_response())
}
