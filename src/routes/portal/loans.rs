use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::calc::{format_amount, format_date, today};
use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{
    AppState, find_member_for_user, list_member_loans, list_user_requests, submit_request,
    validate_request,
};

use crate::routes::{Page, format_timestamp, render};

struct LoanLine {
    date: String,
    amount: String,
    interest: String,
    paid: String,
    balance: String,
    deadline: String,
}

struct RequestLine {
    amount: String,
    purpose: String,
    duration: i32,
    status: &'static str,
    created_at: String,
}

#[derive(Template)]
#[template(path = "portal/loans.html")]
struct MemberLoansTemplate {
    page: Page,
    loans: Vec<LoanLine>,
    requests: Vec<RequestLine>,
    error: Option<String>,
    amount: String,
    purpose: String,
    duration: String,
}

#[derive(Deserialize)]
pub struct LoanRequestForm {
    pub amount: String,
    pub purpose: String,
    pub duration: String,
}

async fn loans_page(
    st: &AppState,
    session: &SessionUser,
    error: Option<String>,
    form: Option<&LoanRequestForm>,
) -> AppResult<Html<String>> {
    let member = find_member_for_user(st, session.user()).await?;
    let loans = match member.and_then(|m| m.id) {
        Some(id) => list_member_loans(st, &id, today()).await?,
        None => Vec::new(),
    };
    let requests = match session.user_id() {
        Some(id) => list_user_requests(st, id).await?,
        None => Vec::new(),
    };

    render(MemberLoansTemplate {
        page: Page::new(session, "My loans"),
        loans: loans
            .iter()
            .map(|l| LoanLine {
                date: format_date(l.date),
                amount: format_amount(l.amount),
                interest: format_amount(l.interest),
                paid: format_amount(l.paid),
                balance: format_amount(l.balance),
                deadline: format_date(l.deadline),
            })
            .collect(),
        requests: requests
            .into_iter()
            .map(|r| RequestLine {
                amount: format_amount(r.amount),
                purpose: r.purpose,
                duration: r.duration,
                status: r.status.as_str(),
                created_at: format_timestamp(r.created_at),
            })
            .collect(),
        error,
        amount: form.map(|f| f.amount.clone()).unwrap_or_default(),
        purpose: form.map(|f| f.purpose.clone()).unwrap_or_default(),
        duration: form.map(|f| f.duration.clone()).unwrap_or_default(),
    })
}

pub async fn member_loans(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    loans_page(&st, &session, None, None).await
}

pub async fn member_loan_request(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Form(form): Form<LoanRequestForm>,
) -> AppResult<Response> {
    let amount: f64 = form.amount.trim().parse().unwrap_or(f64::NAN);
    let duration: i32 = form.duration.trim().parse().unwrap_or(0);
    if let Err(msg) = validate_request(amount, duration, &form.purpose) {
        warn!(email = %session.email(), msg, "loan request rejected");
        let page = loans_page(&st, &session, Some(msg.to_string()), Some(&form)).await?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }
    if session.user_id().is_none() {
        return Err(AppError::Unauthorized);
    }
    submit_request(&st, session.user(), amount, &form.purpose, duration).await?;
    Ok(Redirect::to("/portal/loans").into_response())
}
