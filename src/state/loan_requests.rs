use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use tracing::{info, warn};

use crate::calc::approval_deadline;
use crate::models::{Loan, LoanRequest, RequestStatus, User};

use super::{AppState, find_member_for_user, get_user_by_id};

pub const MIN_REQUEST_AMOUNT: f64 = 100.0;

/// Amount at least 100, duration at least one month, purpose required.
pub fn validate_request(amount: f64, duration: i32, purpose: &str) -> Result<(), &'static str> {
    if !amount.is_finite() || amount < MIN_REQUEST_AMOUNT {
        return Err("Minimum loan amount is 100");
    }
    if duration < 1 {
        return Err("Duration must be at least 1 month");
    }
    if purpose.trim().is_empty() {
        return Err("Please describe the purpose of the loan");
    }
    Ok(())
}

pub async fn submit_request(
    state: &AppState,
    user: &User,
    amount: f64,
    purpose: &str,
    duration: i32,
) -> Result<ObjectId> {
    let user_id = user.id.context("user missing _id")?;
    let res = state
        .loan_requests
        .insert_one(LoanRequest {
            id: None,
            user_id,
            user_email: user.email.clone(),
            amount,
            purpose: purpose.trim().to_string(),
            duration,
            status: RequestStatus::Pending,
            created_at: DateTime::now(),
            approved_at: None,
            rejected_at: None,
        })
        .await?;
    info!(email = %user.email, amount, "loan request submitted");
    res.inserted_id
        .as_object_id()
        .context("loan request insert missing _id")
}

pub async fn list_pending_requests(state: &AppState) -> Result<Vec<LoanRequest>> {
    Ok(state
        .loan_requests
        .find(doc! { "status": RequestStatus::Pending.as_str() })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?)
}

pub async fn list_user_requests(state: &AppState, user_id: &ObjectId) -> Result<Vec<LoanRequest>> {
    Ok(state
        .loan_requests
        .find(doc! { "user_id": user_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?)
}

pub async fn count_pending_requests(state: &AppState) -> Result<u64> {
    Ok(state
        .loan_requests
        .count_documents(doc! { "status": RequestStatus::Pending.as_str() })
        .await?)
}

#[derive(Debug, PartialEq)]
pub enum ApprovalOutcome {
    Approved(ObjectId),
    NotPending,
    NoLinkedMember,
    Missing,
}

/// Creates the loan for the requester's member (interest 0, paid 0, balance = amount,
/// deadline `months × 30` days out) and marks the request approved.
pub async fn approve_request(
    state: &AppState,
    id: &ObjectId,
    today: NaiveDate,
) -> Result<ApprovalOutcome> {
    let Some(request) = state.loan_requests.find_one(doc! { "_id": id }).await? else {
        return Ok(ApprovalOutcome::Missing);
    };
    if request.status != RequestStatus::Pending {
        return Ok(ApprovalOutcome::NotPending);
    }

    let requester = match get_user_by_id(state, &request.user_id).await? {
        Some(user) => user,
        None => User {
            id: Some(request.user_id),
            email: request.user_email.clone(),
            secret: String::new(),
            role: Default::default(),
            display_name: None,
            created_at: None,
        },
    };
    let Some(member_id) = find_member_for_user(state, &requester).await?.and_then(|m| m.id) else {
        warn!(email = %request.user_email, "loan request has no linked member");
        return Ok(ApprovalOutcome::NoLinkedMember);
    };

    let months = u32::try_from(request.duration.max(1)).unwrap_or(1);
    let res = state
        .loans
        .insert_one(Loan {
            id: None,
            member_id,
            date: Some(today),
            amount: request.amount,
            interest: 0.0,
            paid: 0.0,
            balance: request.amount,
            deadline: Some(approval_deadline(today, months)),
        })
        .await?;
    let loan_id = res
        .inserted_id
        .as_object_id()
        .context("loan insert missing _id")?;

    state
        .loan_requests
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": RequestStatus::Approved.as_str(),
                "approved_at": DateTime::now(),
            } },
        )
        .await?;
    info!(email = %request.user_email, amount = request.amount, "loan request approved");
    Ok(ApprovalOutcome::Approved(loan_id))
}

pub async fn reject_request(state: &AppState, id: &ObjectId) -> Result<bool> {
    let res = state
        .loan_requests
        .update_one(
            doc! { "_id": id, "status": RequestStatus::Pending.as_str() },
            doc! { "$set": {
                "status": RequestStatus::Rejected.as_str(),
                "rejected_at": DateTime::now(),
            } },
        )
        .await?;
    Ok(res.modified_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation() {
        assert!(validate_request(100.0, 1, "school fees").is_ok());
        assert!(validate_request(99.99, 1, "school fees").is_err());
        assert!(validate_request(500.0, 0, "school fees").is_err());
        assert!(validate_request(500.0, 3, "   ").is_err());
        assert!(validate_request(f64::NAN, 3, "x").is_err());
    }
}
