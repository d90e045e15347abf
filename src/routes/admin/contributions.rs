use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Multipart, Query, State},
    response::{Html, Response},
};
use serde_json::{Value, json};
use tracing::info;

use crate::calc::{contribution_total, format_amount, grid_totals, normalize_months, period_id};
use crate::error::{AppError, AppResult};
use crate::import::{contributions_from_records, contributions_sheet};
use crate::models::{Contribution, ContributionKind, MONTHS};
use crate::session::SessionUser;
use crate::state::{
    AppState, GridRow, export_rows, import_grid, load_grid, resolve_period, save_grid,
};
use crate::xlsx::{read_records, write_workbook};

use crate::routes::{
    Choice, Page, PeriodQuery, encode_query, period_choices, read_upload, render, xlsx_response,
};

struct KindLine {
    kind: &'static str,
    field: &'static str,
    months: Vec<f64>,
    total: String,
}

struct GridLine {
    member_id: String,
    name: String,
    lines: Vec<KindLine>,
}

#[derive(Template)]
#[template(path = "admin/contributions.html")]
struct ContributionsTemplate {
    page: Page,
    period: String,
    period_query: String,
    periods: Vec<Choice>,
    months: Vec<&'static str>,
    rows: Vec<GridLine>,
    month_totals: Vec<String>,
    invest_total: String,
    risk_total: String,
    grand_total: String,
}

fn grid_line(row: &GridRow) -> GridLine {
    GridLine {
        member_id: row.member_id.map(|id| id.to_hex()).unwrap_or_default(),
        name: row.name.clone(),
        lines: ContributionKind::ALL
            .iter()
            .map(|kind| {
                let months = normalize_months(row.months(*kind));
                KindLine {
                    kind: kind.as_str(),
                    field: match kind {
                        ContributionKind::Invest => "invest",
                        ContributionKind::Risk => "risk",
                    },
                    total: format_amount(contribution_total(&months)),
                    months,
                }
            })
            .collect(),
    }
}

pub async fn contributions_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Html<String>> {
    let (periods, period) = resolve_period(&st, q.period.as_deref()).await?;
    let grid = load_grid(&st, &period).await?;
    let records: Vec<Contribution> = export_rows(&grid, &period)
        .into_iter()
        .map(|(_, c)| c)
        .collect();
    let totals = grid_totals(&records);

    render(ContributionsTemplate {
        page: Page::new(&session, "Risk & investment"),
        periods: period_choices(&periods, &period),
        months: MONTHS.to_vec(),
        rows: grid.iter().map(grid_line).collect(),
        month_totals: totals.months.into_iter().map(format_amount).collect(),
        invest_total: format_amount(totals.invest),
        risk_total: format_amount(totals.risk),
        grand_total: format_amount(totals.grand),
        period_query: encode_query(&period),
        period,
    })
}

pub async fn contributions_save(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
    Json(rows): Json<Vec<GridRow>>,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let saved = save_grid(&st, &period, rows).await?;
    Ok(Json(json!({ "ok": true, "saved": saved })))
}

pub async fn contributions_import(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let records = read_records(&read_upload(multipart).await?)?;
    let imported = contributions_from_records(&records);
    if imported.is_empty() {
        return Err(AppError::bad_request(
            "No rows with NAMES and an INVEST or RISK category found",
        ));
    }
    let count = import_grid(&st, &period, imported).await?;
    info!(count, %period, "contributions imported");
    Ok(Json(json!({ "ok": true, "imported": count })))
}

pub async fn contributions_export(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Response> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let grid = load_grid(&st, &period).await?;
    let sheet = contributions_sheet(&export_rows(&grid, &period));
    let bytes = write_workbook("Contributions", &sheet.header, &sheet.rows)?;
    Ok(xlsx_response(
        &format!("Member_Contributions_{}.xlsx", period_id(&period)),
        bytes,
    ))
}
