use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};

use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::{AppState, list_report_periods, load_report};

use crate::routes::{Choice, Page, PeriodQuery, format_timestamp, period_choices, render};

#[derive(Template)]
#[template(path = "portal/reports.html")]
struct MemberReportTemplate {
    page: Page,
    periods: Vec<Choice>,
    period: String,
    content: Option<String>,
    last_updated: String,
}

/// Read-only view of saved treasurer reports.
pub async fn member_reports(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Html<String>> {
    let periods = list_report_periods(&st).await?;
    let period = q
        .period
        .filter(|p| periods.contains(p))
        .or_else(|| periods.first().cloned())
        .unwrap_or_default();

    let report = if period.is_empty() {
        None
    } else {
        load_report(&st, &period).await?
    };

    render(MemberReportTemplate {
        page: Page::new(&session, "Reports"),
        periods: period_choices(&periods, &period),
        last_updated: report
            .as_ref()
            .map(|r| format_timestamp(r.last_updated))
            .unwrap_or_default(),
        content: report.map(|r| r.content),
        period,
    })
}
