use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Form, Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::calc::{format_amount, format_date, today};
use crate::error::{AppError, AppResult};
use crate::import::{file_stem, loans_from_records, loans_sheet};
use crate::models::{Loan, Member};
use crate::session::SessionUser;
use crate::state::{
    AppState, ApprovalOutcome, add_loan_row, approve_request, delete_loan, get_member,
    list_all_members, list_member_loans, list_pending_requests, reject_request, save_loans,
};
use crate::xlsx::{read_records, write_workbook};

use crate::routes::{
    Choice, Page, format_timestamp, parse_id, read_upload, render, xlsx_response,
};

#[derive(Deserialize, Default)]
pub struct MemberQuery {
    #[serde(default)]
    pub member: Option<String>,
}

#[derive(Deserialize)]
pub struct MemberForm {
    pub member_id: String,
}

pub(crate) fn member_choices(members: &[Member], selected: Option<&str>) -> Vec<Choice> {
    members
        .iter()
        .filter_map(|m| {
            let id = m.id?.to_hex();
            Some(Choice {
                selected: selected == Some(id.as_str()),
                label: format!("{} ({})", m.name, m.period),
                value: id,
            })
        })
        .collect()
}

struct LoanRow {
    id: String,
    date: String,
    amount: f64,
    paid: f64,
    interest: f64,
    balance: String,
    deadline: String,
}

#[derive(Template)]
#[template(path = "admin/loans/index.html")]
struct LoansTemplate {
    page: Page,
    members: Vec<Choice>,
    member_id: String,
    member_name: String,
    loans: Vec<LoanRow>,
    total_amount: String,
    total_balance: String,
}

fn loans_url(member_id: &str) -> String {
    format!("/admin/loans?member={member_id}")
}

pub async fn loans_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<MemberQuery>,
) -> AppResult<Html<String>> {
    let members = list_all_members(&st).await?;
    let selected = q.member.as_deref().filter(|m| !m.is_empty());

    let mut loans = Vec::new();
    let mut member_name = String::new();
    if let Some(raw) = selected {
        let id = parse_id(raw)?;
        let member = get_member(&st, &id)
            .await?
            .ok_or(AppError::NotFound("member"))?;
        member_name = member.name;
        loans = list_member_loans(&st, &id, today()).await?;
    }

    render(LoansTemplate {
        page: Page::new(&session, "Loans"),
        members: member_choices(&members, selected),
        member_id: selected.unwrap_or_default().to_string(),
        member_name,
        total_amount: format_amount(loans.iter().map(|l| l.amount).sum()),
        total_balance: format_amount(loans.iter().map(|l| l.balance).sum()),
        loans: loans
            .into_iter()
            .map(|l| LoanRow {
                id: l.id.map(|id| id.to_hex()).unwrap_or_default(),
                date: format_date(l.date),
                amount: l.amount,
                paid: l.paid,
                interest: l.interest,
                balance: format_amount(l.balance),
                deadline: format_date(l.deadline),
            })
            .collect(),
    })
}

pub async fn loans_add(
    State(st): State<Arc<AppState>>,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    add_loan_row(&st, &parse_id(&form.member_id)?).await?;
    Ok(Redirect::to(&loans_url(&form.member_id)).into_response())
}

/// Bulk save; interest and balance are recomputed server side.
pub async fn loans_save(
    State(st): State<Arc<AppState>>,
    Json(rows): Json<Vec<Loan>>,
) -> AppResult<Json<Value>> {
    let saved = save_loans(&st, rows, today()).await?;
    Ok(Json(json!({ "ok": true, "saved": saved })))
}

pub async fn loans_delete(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    delete_loan(&st, &parse_id(&id)?).await?;
    Ok(Redirect::to(&loans_url(&form.member_id)).into_response())
}

pub async fn loans_export(
    State(st): State<Arc<AppState>>,
    Query(q): Query<MemberQuery>,
) -> AppResult<Response> {
    let raw = q
        .member
        .ok_or_else(|| AppError::bad_request("Select a member first"))?;
    let id = parse_id(&raw)?;
    let member = get_member(&st, &id)
        .await?
        .ok_or(AppError::NotFound("member"))?;
    let loans = list_member_loans(&st, &id, today()).await?;
    let sheet = loans_sheet(&member.name, &loans);
    let bytes = write_workbook("Loans", &sheet.header, &sheet.rows)?;
    Ok(xlsx_response(
        &format!("{}_loans.xlsx", file_stem(&member.name)),
        bytes,
    ))
}

/// Rows naming a known member go to that member, the rest to the selected one.
pub async fn loans_import(
    State(st): State<Arc<AppState>>,
    Query(q): Query<MemberQuery>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let raw = q
        .member
        .ok_or_else(|| AppError::bad_request("Select a member first"))?;
    let fallback = parse_id(&raw)?;
    let records = read_records(&read_upload(multipart).await?)?;
    let members = list_all_members(&st).await?;
    let loans = loans_from_records(&records, &members, fallback, today());
    let imported = save_loans(&st, loans, today()).await?;
    info!(imported, "loans imported");
    Ok(Json(json!({ "ok": true, "imported": imported })))
}

struct RequestRow {
    id: String,
    email: String,
    amount: String,
    purpose: String,
    duration: i32,
    created_at: String,
}

#[derive(Template)]
#[template(path = "admin/loans/requests.html")]
struct RequestsTemplate {
    page: Page,
    requests: Vec<RequestRow>,
}

pub async fn loan_requests_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let requests = list_pending_requests(&st)
        .await?
        .into_iter()
        .filter_map(|r| {
            Some(RequestRow {
                id: r.id?.to_hex(),
                email: r.user_email,
                amount: format_amount(r.amount),
                purpose: r.purpose,
                duration: r.duration,
                created_at: format_timestamp(r.created_at),
            })
        })
        .collect();
    render(RequestsTemplate {
        page: Page::new(&session, "Loan requests"),
        requests,
    })
}

pub async fn loan_requests_approve(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    match approve_request(&st, &parse_id(&id)?, today()).await? {
        ApprovalOutcome::Approved(_) => Ok(Redirect::to("/admin/loans/requests").into_response()),
        ApprovalOutcome::NotPending => Err(AppError::bad_request("Request is no longer pending")),
        ApprovalOutcome::NoLinkedMember => Err(AppError::bad_request(
            "No member record is linked to this user",
        )),
        ApprovalOutcome::Missing => Err(AppError::NotFound("loan request")),
    }
}

pub async fn loan_requests_reject(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    if !reject_request(&st, &parse_id(&id)?).await? {
        return Err(AppError::bad_request("Request is no longer pending"));
    }
    Ok(Redirect::to("/admin/loans/requests").into_response())
}
