use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Form, Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::{Value, json};
use tracing::info;

use crate::calc::{format_amount, format_date, today};
use crate::error::{AppError, AppResult};
use crate::import::{file_stem, savings_from_records, savings_sheet};
use crate::models::Saving;
use crate::session::SessionUser;
use crate::state::{
    AppState, add_saving_row, delete_saving, get_member, list_all_members, list_member_savings,
    save_savings,
};
use crate::xlsx::{read_records, write_workbook};

use super::loans::{MemberForm, MemberQuery, member_choices};
use crate::routes::{Choice, Page, parse_id, read_upload, render, xlsx_response};

struct SavingRow {
    id: String,
    date: String,
    due_date: String,
    amount: f64,
    interest: String,
    balance: String,
}

#[derive(Template)]
#[template(path = "admin/savings/index.html")]
struct SavingsTemplate {
    page: Page,
    members: Vec<Choice>,
    member_id: String,
    member_name: String,
    savings: Vec<SavingRow>,
    total_amount: String,
    total_balance: String,
}

fn savings_url(member_id: &str) -> String {
    format!("/admin/savings?member={member_id}")
}

pub async fn savings_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<MemberQuery>,
) -> AppResult<Html<String>> {
    let members = list_all_members(&st).await?;
    let selected = q.member.as_deref().filter(|m| !m.is_empty());

    let mut savings = Vec::new();
    let mut member_name = String::new();
    if let Some(raw) = selected {
        let id = parse_id(raw)?;
        let member = get_member(&st, &id)
            .await?
            .ok_or(AppError::NotFound("member"))?;
        member_name = member.name;
        savings = list_member_savings(&st, &id, today()).await?;
    }

    render(SavingsTemplate {
        page: Page::new(&session, "Savings"),
        members: member_choices(&members, selected),
        member_id: selected.unwrap_or_default().to_string(),
        member_name,
        total_amount: format_amount(savings.iter().map(|s| s.amount).sum()),
        total_balance: format_amount(savings.iter().map(|s| s.balance).sum()),
        savings: savings
            .into_iter()
            .map(|s| SavingRow {
                id: s.id.map(|id| id.to_hex()).unwrap_or_default(),
                date: format_date(s.date),
                due_date: format_date(s.due_date),
                amount: s.amount,
                interest: format_amount(s.interest),
                balance: format_amount(s.balance),
            })
            .collect(),
    })
}

pub async fn savings_add(
    State(st): State<Arc<AppState>>,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    add_saving_row(&st, &parse_id(&form.member_id)?, today()).await?;
    Ok(Redirect::to(&savings_url(&form.member_id)).into_response())
}

pub async fn savings_save(
    State(st): State<Arc<AppState>>,
    Json(rows): Json<Vec<Saving>>,
) -> AppResult<Json<Value>> {
    let saved = save_savings(&st, rows, today()).await?;
    Ok(Json(json!({ "ok": true, "saved": saved })))
}

pub async fn savings_delete(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    delete_saving(&st, &parse_id(&id)?).await?;
    Ok(Redirect::to(&savings_url(&form.member_id)).into_response())
}

pub async fn savings_export(
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
    let savings = list_member_savings(&st, &id, today()).await?;
    let sheet = savings_sheet(&member.name, &savings);
    let bytes = write_workbook("Savings", &sheet.header, &sheet.rows)?;
    Ok(xlsx_response(
        &format!("{}_savings.xlsx", file_stem(&member.name)),
        bytes,
    ))
}

pub async fn savings_import(
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
    let savings = savings_from_records(&records, &members, fallback, today());
    let imported = save_savings(&st, savings, today()).await?;
    info!(imported, "savings imported");
    Ok(Json(json!({ "ok": true, "imported": imported })))
}
