use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc};
use tracing::info;

use crate::calc::{DEFAULT_PERIOD, period_id, period_label};
use crate::models::FinancialYear;

use super::AppState;

/// Sorted period labels; the default period stands in when none exist.
pub async fn list_periods(state: &AppState) -> Result<Vec<String>> {
    let years: Vec<FinancialYear> = state.financial_years.find(doc! {}).await?.try_collect().await?;
    let mut labels: Vec<String> = years
        .into_iter()
        .map(|y| {
            if y.name.trim().is_empty() {
                period_label(&y.id)
            } else {
                y.name
            }
        })
        .collect();
    labels.sort();
    labels.dedup();
    if labels.is_empty() {
        labels.push(DEFAULT_PERIOD.to_string());
    }
    Ok(labels)
}

/// Requested period when given, else the latest one.
pub async fn resolve_period(state: &AppState, requested: Option<&str>) -> Result<(Vec<String>, String)> {
    let periods = list_periods(state).await?;
    let selected = requested
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .or_else(|| periods.last().cloned())
        .unwrap_or_else(|| DEFAULT_PERIOD.to_string());
    Ok((periods, selected))
}

#[derive(Debug, PartialEq, Eq)]
pub enum PeriodOutcome {
    Created(String),
    Empty,
    Exists,
}

pub async fn create_period(state: &AppState, label: &str) -> Result<PeriodOutcome> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(PeriodOutcome::Empty);
    }
    let id = period_id(label);
    if state.financial_years.find_one(doc! { "_id": &id }).await?.is_some() {
        return Ok(PeriodOutcome::Exists);
    }
    state
        .financial_years
        .insert_one(FinancialYear {
            id,
            name: label.to_string(),
            created_at: Some(DateTime::now()),
        })
        .await?;
    info!(period = label, "financial year created");
    Ok(PeriodOutcome::Created(label.to_string()))
}
