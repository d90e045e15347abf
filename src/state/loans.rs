use anyhow::Result;
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use tracing::info;

use crate::calc::recalc_loan;
use crate::models::Loan;

use super::AppState;

/// A member's loans, recalculated for `today`, oldest first.
pub async fn list_member_loans(
    state: &AppState,
    member_id: &ObjectId,
    today: NaiveDate,
) -> Result<Vec<Loan>> {
    let mut loans: Vec<Loan> = state
        .loans
        .find(doc! { "member_id": member_id })
        .sort(doc! { "date": 1, "_id": 1 })
        .await?
        .try_collect()
        .await?;
    for loan in &mut loans {
        recalc_loan(loan, today);
    }
    Ok(loans)
}

pub async fn total_loan_amount(state: &AppState) -> Result<f64> {
    let loans: Vec<Loan> = state.loans.find(doc! {}).await?.try_collect().await?;
    Ok(loans.iter().map(|l| l.amount).sum())
}

pub async fn add_loan_row(state: &AppState, member_id: &ObjectId) -> Result<Loan> {
    let mut loan = Loan {
        id: None,
        member_id: *member_id,
        date: None,
        amount: 0.0,
        interest: 0.0,
        paid: 0.0,
        balance: 0.0,
        deadline: None,
    };
    loan.id = state.loans.insert_one(&loan).await?.inserted_id.as_object_id();
    Ok(loan)
}

/// Recalculates every row, then replaces rows with an id and inserts the rest.
pub async fn save_loans(state: &AppState, rows: Vec<Loan>, today: NaiveDate) -> Result<usize> {
    let count = rows.len();
    for mut loan in rows {
        recalc_loan(&mut loan, today);
        match loan.id {
            Some(id) => {
                state
                    .loans
                    .replace_one(doc! { "_id": id }, &loan)
                    .upsert(true)
                    .await?;
            }
            None => {
                state.loans.insert_one(&loan).await?;
            }
        }
    }
    info!(count, "loans saved");
    Ok(count)
}

pub async fn delete_loan(state: &AppState, id: &ObjectId) -> Result<bool> {
    Ok(state.loans.delete_one(doc! { "_id": id }).await?.deleted_count > 0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoanSummary {
    pub outstanding: f64,
    pub active: usize,
}

pub fn summarize_loans(loans: &[Loan]) -> LoanSummary {
    LoanSummary {
        outstanding: loans.iter().map(|l| l.balance).sum(),
        active: loans.iter().filter(|l| l.balance > 0.0).count(),
    }
}
