use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};

use crate::calc::{analyse_ledger, format_amount};
use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::{AppState, load_ledger, resolve_period};

use crate::routes::{Choice, Page, PeriodQuery, period_choices, render};

struct QuarterLine {
    no: usize,
    label: &'static str,
    loan: String,
    invest: String,
    total: String,
    loan_out: String,
}

#[derive(Template)]
#[template(path = "admin/analysis.html")]
struct AnalysisTemplate {
    page: Page,
    period: String,
    periods: Vec<Choice>,
    quarters: Vec<QuarterLine>,
    total_loan: String,
    total_invest: String,
    total_contributions: String,
    total_loan_out: String,
    total_expenses: String,
    total_dividends: String,
}

pub async fn analysis_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Html<String>> {
    let (periods, period) = resolve_period(&st, q.period.as_deref()).await?;
    let analysis = analyse_ledger(&load_ledger(&st, &period).await?);

    render(AnalysisTemplate {
        page: Page::new(&session, "Analysis"),
        periods: period_choices(&periods, &period),
        period,
        quarters: analysis
            .quarters
            .iter()
            .enumerate()
            .map(|(i, q)| QuarterLine {
                no: i + 1,
                label: q.label,
                loan: format_amount(q.loan),
                invest: format_amount(q.invest),
                total: format_amount(q.loan + q.invest),
                loan_out: format_amount(q.loan_out),
            })
            .collect(),
        total_loan: format_amount(analysis.total_loan),
        total_invest: format_amount(analysis.total_invest),
        total_contributions: format_amount(analysis.total_loan + analysis.total_invest),
        total_loan_out: format_amount(analysis.total_loan_out),
        total_expenses: format_amount(analysis.total_expenses),
        total_dividends: format_amount(analysis.total_dividends),
    })
}
