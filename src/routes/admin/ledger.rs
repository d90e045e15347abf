use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Multipart, Query, State},
    response::{Html, Response},
};
use serde_json::{Value, json};
use tracing::info;

use crate::calc::{format_amount, ledger_totals, period_id};
use crate::error::AppResult;
use crate::import::ledger_sheet;
use crate::models::{LedgerField, LedgerRow};
use crate::session::SessionUser;
use crate::state::{AppState, delete_ledger, import_ledger, load_ledger, resolve_period, save_ledger};
use crate::xlsx::{read_records, write_workbook};

use crate::routes::{
    Choice, Page, PeriodQuery, encode_query, period_choices, read_upload, render, xlsx_response,
};

struct LedgerCell {
    key: &'static str,
    value: f64,
}

struct LedgerLine {
    no: usize,
    cells: Vec<LedgerCell>,
}

#[derive(Template)]
#[template(path = "admin/ledger.html")]
struct LedgerTemplate {
    page: Page,
    period: String,
    period_query: String,
    periods: Vec<Choice>,
    headers: Vec<String>,
    rows: Vec<LedgerLine>,
    totals: Vec<String>,
}

pub async fn ledger_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Html<String>> {
    let (periods, period) = resolve_period(&st, q.period.as_deref()).await?;
    let rows = load_ledger(&st, &period).await?;

    render(LedgerTemplate {
        page: Page::new(&session, "Collections & expenses"),
        periods: period_choices(&periods, &period),
        period_query: encode_query(&period),
        period,
        headers: LedgerField::ALL.iter().map(LedgerField::header).collect(),
        totals: ledger_totals(&rows).into_iter().map(format_amount).collect(),
        rows: rows
            .iter()
            .enumerate()
            .map(|(i, r)| LedgerLine {
                no: i + 1,
                cells: LedgerField::ALL
                    .iter()
                    .map(|f| LedgerCell {
                        key: f.key(),
                        value: r.get(*f),
                    })
                    .collect(),
            })
            .collect(),
    })
}

pub async fn ledger_save(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
    Json(rows): Json<Vec<LedgerRow>>,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    save_ledger(&st, &period, rows).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn ledger_delete(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let deleted = delete_ledger(&st, &period).await?;
    info!(%period, deleted, "ledger deleted");
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

pub async fn ledger_import(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let records = read_records(&read_upload(multipart).await?)?;
    let imported = import_ledger(&st, &period, &records).await?;
    info!(imported, %period, "ledger imported");
    Ok(Json(json!({ "ok": true, "imported": imported })))
}

pub async fn ledger_export(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Response> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let rows = load_ledger(&st, &period).await?;
    let sheet = ledger_sheet(&rows);
    let bytes = write_workbook("General Ledger", &sheet.header, &sheet.rows)?;
    Ok(xlsx_response(
        &format!("General_Ledger_{}.xlsx", period_id(&period)),
        bytes,
    ))
}
