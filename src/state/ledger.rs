use anyhow::Result;
use mongodb::bson::doc;
use tracing::info;

use crate::calc::period_id;
use crate::import::merge_ledger_records;
use crate::models::{GeneralLedger, LEDGER_ROWS, LedgerRow};
use crate::xlsx::Record;

use super::AppState;

/// The period's 24 rows; missing ledgers and short ones are padded with zeros.
pub async fn load_ledger(state: &AppState, period: &str) -> Result<Vec<LedgerRow>> {
    let mut rows = state
        .general_ledgers
        .find_one(doc! { "_id": period_id(period) })
        .await?
        .map(|l| l.rows)
        .unwrap_or_default();
    rows.resize(LEDGER_ROWS, LedgerRow::default());
    Ok(rows)
}

pub async fn save_ledger(state: &AppState, period: &str, mut rows: Vec<LedgerRow>) -> Result<()> {
    rows.resize(LEDGER_ROWS, LedgerRow::default());
    let id = period_id(period);
    state
        .general_ledgers
        .replace_one(
            doc! { "_id": &id },
            GeneralLedger {
                id: id.clone(),
                period: period.to_string(),
                rows,
            },
        )
        .upsert(true)
        .await?;
    info!(period, "ledger saved");
    Ok(())
}

pub async fn delete_ledger(state: &AppState, period: &str) -> Result<bool> {
    let res = state
        .general_ledgers
        .delete_one(doc! { "_id": period_id(period) })
        .await?;
    Ok(res.deleted_count > 0)
}

/// Overlays spreadsheet rows on the stored ledger and saves it. Returns rows taken.
pub async fn import_ledger(state: &AppState, period: &str, records: &[Record]) -> Result<usize> {
    let mut rows = load_ledger(state, period).await?;
    let taken = merge_ledger_records(records, &mut rows);
    save_ledger(state, period, rows).await?;
    Ok(taken)
}
