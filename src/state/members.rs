use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::{
    Collection,
    bson::{DateTime, Document, doc, oid::ObjectId},
};
use tracing::info;

use crate::calc;
use crate::dedup::{self, DELETE_BATCH, DuplicateScan};
use crate::import::StatementImport;
use crate::models::{InviteStatus, Member, MemberColumn, User};

use super::{AppState, normalize_email, save_loans, save_savings};

/// Period the roster sync files members under.
pub const ROSTER_PERIOD: &str = "2024/2025";

pub async fn list_members(state: &AppState, period: &str) -> Result<Vec<Member>> {
    let cursor = state
        .members
        .find(doc! { "period": period })
        .sort(doc! { "no": 1 })
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn list_all_members(state: &AppState) -> Result<Vec<Member>> {
    let cursor = state
        .members
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn count_members(state: &AppState) -> Result<u64> {
    Ok(state.members.count_documents(doc! {}).await?)
}

pub async fn get_member(state: &AppState, id: &ObjectId) -> Result<Option<Member>> {
    Ok(state.members.find_one(doc! { "_id": id }).await?)
}

/// Highest `no` in the period plus one.
pub async fn next_member_no(state: &AppState, period: &str) -> Result<i64> {
    let last = state
        .members
        .find_one(doc! { "period": period })
        .sort(doc! { "no": -1 })
        .await?;
    Ok(last.map(|m| m.no).unwrap_or(0) + 1)
}

pub async fn add_member_row(state: &AppState, period: &str) -> Result<Member> {
    let mut member = Member {
        no: next_member_no(state, period).await?,
        period: period.to_string(),
        created_at: Some(DateTime::now()),
        ..Member::default()
    };
    let res = state.members.insert_one(&member).await?;
    member.id = res.inserted_id.as_object_id();
    Ok(member)
}

pub async fn insert_member(state: &AppState, name: &str, period: &str) -> Result<ObjectId> {
    let member = Member {
        no: next_member_no(state, period).await?,
        name: name.trim().to_string(),
        period: period.to_string(),
        created_at: Some(DateTime::now()),
        ..Member::default()
    };
    let res = state.members.insert_one(&member).await?;
    res.inserted_id
        .as_object_id()
        .context("member insert missing _id")
}

fn editable_fields(member: &Member) -> Document {
    let mut set = doc! {
        "no": member.no,
        "name": member.name.trim(),
        "period": &member.period,
    };
    for col in MemberColumn::ALL {
        set.insert(col.key(), col.get(member));
    }
    set
}

/// Upserts rows with an id and inserts the rest. Link and invite fields are left alone.
pub async fn save_members(state: &AppState, rows: &[Member]) -> Result<usize> {
    for row in rows {
        match row.id {
            Some(id) => {
                state
                    .members
                    .update_one(
                        doc! { "_id": id },
                        doc! {
                            "$set": editable_fields(row),
                            "$setOnInsert": { "created_at": DateTime::now() },
                        },
                    )
                    .upsert(true)
                    .await?;
            }
            None => {
                let mut fresh = row.clone();
                fresh.created_at = Some(DateTime::now());
                state.members.insert_one(&fresh).await?;
            }
        }
    }
    info!(count = rows.len(), "members saved");
    Ok(rows.len())
}

/// Deletes `ids` from `coll` in `$in` batches of `DELETE_BATCH`.
pub(crate) async fn delete_ids<T: Send + Sync>(
    coll: &Collection<T>,
    field: &str,
    ids: &[ObjectId],
) -> Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_BATCH) {
        let res = coll.delete_many(doc! { field: { "$in": chunk } }).await?;
        deleted += res.deleted_count;
    }
    Ok(deleted)
}

/// Removes members together with their loans, savings and contributions.
pub async fn delete_members(state: &AppState, ids: &[ObjectId]) -> Result<u64> {
    delete_ids(&state.loans, "member_id", ids).await?;
    delete_ids(&state.savings, "member_id", ids).await?;
    delete_ids(&state.contributions, "member_id", ids).await?;
    let deleted = delete_ids(&state.members, "_id", ids).await?;
    info!(deleted, "members deleted");
    Ok(deleted)
}

pub async fn delete_member(state: &AppState, id: &ObjectId) -> Result<u64> {
    delete_members(state, std::slice::from_ref(id)).await
}

/// Deletes the members of `period` the registry lists for `search`.
pub async fn delete_listed_members(state: &AppState, period: &str, search: &str) -> Result<u64> {
    let listed = calc::filter_and_sort_members(list_members(state, period).await?, search, None);
    let ids: Vec<ObjectId> = listed
        .into_iter()
        .filter_map(|m| m.id)
        .collect();
    delete_members(state, &ids).await
}

/// Replaces the member's loans and savings with the tables of an imported
/// statement. A table missing from the import is left untouched.
pub async fn replace_member_statement(
    state: &AppState,
    member_id: ObjectId,
    import: StatementImport,
    today: NaiveDate,
) -> Result<(usize, usize)> {
    let mut loans = 0;
    if let Some(rows) = import.loans {
        state.loans.delete_many(doc! { "member_id": member_id }).await?;
        loans = save_loans(state, rows, today).await?;
    }
    let mut savings = 0;
    if let Some(rows) = import.savings {
        state.savings.delete_many(doc! { "member_id": member_id }).await?;
        savings = save_savings(state, rows, today).await?;
    }
    info!(%member_id, loans, savings, "statement imported");
    Ok((loans, savings))
}

/// Member row of a login: linked `uid` first, then the email on file.
pub async fn find_member_for_user(state: &AppState, user: &User) -> Result<Option<Member>> {
    if let Some(uid) = user.id {
        if let Some(member) = state.members.find_one(doc! { "uid": uid }).await? {
            return Ok(Some(member));
        }
    }
    Ok(state
        .members
        .find_one(doc! { "email": normalize_email(&user.email) })
        .await?)
}

#[derive(Debug)]
pub enum InviteOutcome {
    Sent,
    EmailTaken(String),
    MemberMissing,
}

/// Attaches an email to a member unless another member already uses it.
pub async fn invite_member(state: &AppState, id: &ObjectId, email: &str) -> Result<InviteOutcome> {
    let email = normalize_email(email);
    if let Some(other) = state
        .members
        .find_one(doc! { "email": &email, "_id": { "$ne": id } })
        .await?
    {
        return Ok(InviteOutcome::EmailTaken(other.name));
    }
    let res = state
        .members
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "email": &email,
                "invite_status": InviteStatus::Sent.as_str(),
                "invited_at": DateTime::now(),
            } },
        )
        .await?;
    if res.matched_count == 0 {
        return Ok(InviteOutcome::MemberMissing);
    }
    info!(%email, "member invited");
    Ok(InviteOutcome::Sent)
}

pub async fn scan_duplicates(state: &AppState) -> Result<DuplicateScan> {
    let cursor = state.members.find(doc! {}).sort(doc! { "_id": 1 }).await?;
    let members: Vec<Member> = cursor.try_collect().await?;
    Ok(dedup::find_duplicates(members))
}

/// Deletes every record that is not its group's keeper.
pub async fn remove_duplicates(state: &AppState) -> Result<u64> {
    let scan = scan_duplicates(state).await?;
    let ids = scan.removable_ids();
    if ids.is_empty() {
        return Ok(0);
    }
    let deleted = delete_ids(&state.members, "_id", &ids).await?;
    info!(deleted, groups = scan.stats.groups, "duplicate members removed");
    Ok(deleted)
}

#[derive(Debug, Clone)]
pub struct RosterRow {
    pub name: String,
    pub member: Option<Member>,
}

impl RosterRow {
    pub fn exists(&self) -> bool {
        self.member.is_some()
    }
}

/// Default roster joined with the registry by exact name.
pub async fn roster_status(state: &AppState) -> Result<Vec<RosterRow>> {
    let members = list_all_members(state).await?;
    Ok(state
        .roster
        .iter()
        .map(|name| RosterRow {
            name: name.clone(),
            member: members.iter().find(|m| &m.name == name).cloned(),
        })
        .collect())
}

/// Files a roster member under `ROSTER_PERIOD`, creating the row when absent.
pub async fn sync_roster_member(state: &AppState, name: &str) -> Result<ObjectId> {
    if let Some(existing) = state.members.find_one(doc! { "name": name }).await? {
        let id = existing.id.context("member missing _id")?;
        state
            .members
            .update_one(doc! { "_id": id }, doc! { "$set": { "period": ROSTER_PERIOD } })
            .await?;
        return Ok(id);
    }
    insert_member(state, name, ROSTER_PERIOD).await
}

/// Stores the email on a roster member and marks it invited; signup links it later.
pub async fn roster_invite(state: &AppState, name: &str, email: &str) -> Result<bool> {
    let res = state
        .members
        .update_one(
            doc! { "name": name },
            doc! { "$set": {
                "email": normalize_email(email),
                "invite_status": InviteStatus::Invited.as_str(),
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

/// Registry view used by the members screen.
pub async fn members_view(
    state: &AppState,
    period: &str,
    search: &str,
    sort_by: Option<MemberColumn>,
) -> Result<(Vec<Member>, Vec<f64>)> {
    let members = calc::filter_and_sort_members(list_members(state, period).await?, search, sort_by);
    let totals = calc::member_totals(&members);
    Ok((members, totals))
}
