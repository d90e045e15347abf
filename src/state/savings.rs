use anyhow::Result;
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use tracing::info;

use crate::calc::recalc_saving;
use crate::models::Saving;

use super::AppState;

pub async fn list_member_savings(
    state: &AppState,
    member_id: &ObjectId,
    today: NaiveDate,
) -> Result<Vec<Saving>> {
    let mut savings: Vec<Saving> = state
        .savings
        .find(doc! { "member_id": member_id })
        .sort(doc! { "date": 1, "_id": 1 })
        .await?
        .try_collect()
        .await?;
    for saving in &mut savings {
        recalc_saving(saving, today);
    }
    Ok(savings)
}

pub async fn total_savings_amount(state: &AppState) -> Result<f64> {
    let savings: Vec<Saving> = state.savings.find(doc! {}).await?.try_collect().await?;
    Ok(savings.iter().map(|s| s.amount).sum())
}

pub async fn add_saving_row(state: &AppState, member_id: &ObjectId, today: NaiveDate) -> Result<Saving> {
    let mut saving = Saving {
        id: None,
        member_id: *member_id,
        date: Some(today),
        due_date: None,
        amount: 0.0,
        interest: 0.0,
        balance: 0.0,
    };
    saving.id = state.savings.insert_one(&saving).await?.inserted_id.as_object_id();
    Ok(saving)
}

pub async fn save_savings(state: &AppState, rows: Vec<Saving>, today: NaiveDate) -> Result<usize> {
    let count = rows.len();
    for mut saving in rows {
        recalc_saving(&mut saving, today);
        match saving.id {
            Some(id) => {
                state
                    .savings
                    .replace_one(doc! { "_id": id }, &saving)
                    .upsert(true)
                    .await?;
            }
            None => {
                state.savings.insert_one(&saving).await?;
            }
        }
    }
    info!(count, "savings saved");
    Ok(count)
}

pub async fn delete_saving(state: &AppState, id: &ObjectId) -> Result<bool> {
    Ok(state.savings.delete_one(doc! { "_id": id }).await?.deleted_count > 0)
}
