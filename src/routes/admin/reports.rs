use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::calc::analyse_ledger;
use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::{
    AppState, load_ledger, load_report, report_file_name, resolve_period, save_report,
    template_content, word_document,
};

use crate::routes::{
    Choice, Page, PeriodQuery, download, encode_query, format_timestamp, period_choices, render,
};

#[derive(Template)]
#[template(path = "admin/reports.html")]
struct ReportEditorTemplate {
    page: Page,
    period: String,
    periods: Vec<Choice>,
    content: String,
    last_updated: Option<String>,
}

#[derive(Deserialize)]
pub struct ReportForm {
    pub period: String,
    pub content: String,
}

/// Saved content, or the template seeded from the period ledger.
async fn report_content(st: &AppState, period: &str) -> AppResult<(String, Option<String>)> {
    if let Some(report) = load_report(st, period).await? {
        return Ok((report.content, Some(format_timestamp(report.last_updated))));
    }
    let ledger = load_ledger(st, period).await?;
    Ok((
        template_content(&st.config.sacco_name, period, &analyse_ledger(&ledger)),
        None,
    ))
}

pub async fn reports_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Html<String>> {
    let (periods, period) = resolve_period(&st, q.period.as_deref()).await?;
    let (content, last_updated) = report_content(&st, &period).await?;
    render(ReportEditorTemplate {
        page: Page::new(&session, "Treasurer's report"),
        periods: period_choices(&periods, &period),
        period,
        content,
        last_updated,
    })
}

pub async fn reports_save(
    State(st): State<Arc<AppState>>,
    Form(form): Form<ReportForm>,
) -> AppResult<Response> {
    save_report(&st, &form.period, &form.content).await?;
    Ok(Redirect::to(&format!("/admin/reports?period={}", encode_query(&form.period))).into_response())
}

pub async fn reports_export(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Response> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let (content, _) = report_content(&st, &period).await?;
    let title = format!("{} Treasurer's Report {}", st.config.sacco_name, period);
    Ok(download(
        "application/msword",
        &report_file_name(&st.config.sacco_name, &period),
        word_document(&title, &content).into_bytes(),
    ))
}
