use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Form, Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::calc::{format_amount, format_date, today};
use crate::error::{AppError, AppResult};
use crate::import::{
    file_stem, members_export_name, members_from_records, members_sheet, statement_from_rows,
};
use crate::models::{Member, MemberColumn};
use crate::session::SessionUser;
use crate::state::{
    AppState, add_member_row, delete_listed_members, delete_member, get_member, list_member_loans,
    list_member_savings, list_members, members_view, replace_member_statement, resolve_period,
    save_members,
};
use crate::statement::{Statement, compile_pdf};
use crate::xlsx::{read_first_sheet, read_records, write_workbook};

use crate::routes::{
    Choice, Page, PeriodQuery, download, encode_query, parse_id, period_choices, read_upload,
    render, xlsx_response,
};

pub(crate) fn members_url(period: &str) -> String {
    format!("/admin/members?period={}", encode_query(period))
}

struct CellView {
    key: &'static str,
    value: f64,
}

struct MemberView {
    id: String,
    no: i64,
    name: String,
    values: Vec<CellView>,
    email: String,
    invite_status: String,
}

#[derive(Template)]
#[template(path = "admin/members/index.html")]
struct MembersTemplate {
    page: Page,
    period: String,
    period_query: String,
    periods: Vec<Choice>,
    search: String,
    sorts: Vec<Choice>,
    columns: Vec<&'static str>,
    members: Vec<MemberView>,
    totals: Vec<String>,
}

#[derive(Deserialize)]
pub struct DeleteAllForm {
    pub period: String,
    #[serde(default)]
    pub search: String,
}

#[derive(Deserialize)]
pub struct MembersQuery {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort: String,
}

#[derive(Deserialize)]
pub struct PeriodForm {
    pub period: String,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn member_view(m: Member) -> MemberView {
    MemberView {
        id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
        no: m.no,
        values: MemberColumn::ALL
            .iter()
            .map(|c| CellView {
                key: c.key(),
                value: c.get(&m),
            })
            .collect(),
        email: m.email.unwrap_or_default(),
        invite_status: m
            .invite_status
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        name: m.name,
    }
}

pub async fn members_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<MembersQuery>,
) -> AppResult<Html<String>> {
    let (periods, period) = resolve_period(&st, q.period.as_deref()).await?;
    let sort_by = MemberColumn::from_key(&q.sort);
    let (members, totals) = members_view(&st, &period, &q.search, sort_by).await?;

    let mut sorts = vec![Choice {
        value: String::new(),
        label: "No.".into(),
        selected: sort_by.is_none(),
    }];
    sorts.extend(MemberColumn::ALL.iter().map(|c| Choice {
        value: c.key().to_string(),
        label: c.label().to_string(),
        selected: Some(*c) == sort_by,
    }));

    render(MembersTemplate {
        page: Page::new(&session, "Members"),
        periods: period_choices(&periods, &period),
        period_query: encode_query(&period),
        period,
        search: q.search,
        sorts,
        columns: MemberColumn::ALL.iter().map(MemberColumn::label).collect(),
        members: members.into_iter().map(member_view).collect(),
        totals: totals.into_iter().map(format_amount).collect(),
    })
}

pub async fn members_add(
    State(st): State<Arc<AppState>>,
    Form(form): Form<PeriodForm>,
) -> AppResult<Response> {
    add_member_row(&st, &form.period).await?;
    Ok(Redirect::to(&members_url(&form.period)).into_response())
}

/// Bulk save of the edited grid.
pub async fn members_save(
    State(st): State<Arc<AppState>>,
    Json(rows): Json<Vec<Member>>,
) -> AppResult<Json<Value>> {
    let saved = save_members(&st, &rows).await?;
    Ok(Json(json!({ "ok": true, "saved": saved })))
}

pub async fn members_delete(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<PeriodForm>,
) -> AppResult<Response> {
    delete_member(&st, &parse_id(&id)?).await?;
    Ok(Redirect::to(&members_url(&form.period)).into_response())
}

pub async fn members_delete_all(
    State(st): State<Arc<AppState>>,
    Form(form): Form<DeleteAllForm>,
) -> AppResult<Response> {
    let deleted = delete_listed_members(&st, &form.period, &form.search).await?;
    info!(deleted, period = %form.period, search = %form.search, "listed members deleted");
    Ok(Redirect::to(&members_url(&form.period)).into_response())
}

pub async fn members_import(
    State(st): State<Arc<AppState>>,
    Query(q): Query<PeriodQuery>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let records = read_records(&read_upload(multipart).await?)?;
    let existing = list_members(&st, &period).await?.len();
    let imported = members_from_records(&records, &period, existing);
    if imported.is_empty() {
        return Err(AppError::bad_request("No member rows found in the file"));
    }
    save_members(&st, &imported).await?;
    info!(count = imported.len(), %period, "members imported");
    Ok(Json(json!({ "ok": true, "imported": imported.len() })))
}

pub async fn members_export(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ExportQuery>,
) -> AppResult<Response> {
    let (_, period) = resolve_period(&st, q.period.as_deref()).await?;
    let members = list_members(&st, &period).await?;
    let sheet = members_sheet(&members, &period);
    let bytes = write_workbook("Members", &sheet.header, &sheet.rows)?;
    let title = q
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Members Data");
    Ok(xlsx_response(&members_export_name(title, &period), bytes))
}

struct LoanLine {
    date: String,
    amount: String,
    interest: String,
    paid: String,
    balance: String,
    deadline: String,
}

struct SavingLine {
    date: String,
    due_date: String,
    amount: String,
    interest: String,
    balance: String,
}

#[derive(Template)]
#[template(path = "admin/members/statement.html")]
struct StatementTemplate {
    page: Page,
    id: String,
    name: String,
    no: i64,
    period: String,
    loans: Vec<LoanLine>,
    savings: Vec<SavingLine>,
    loan_balance: String,
    savings_balance: String,
}

async fn load_statement_parts(
    st: &AppState,
    id: &str,
) -> AppResult<(Member, Vec<crate::models::Loan>, Vec<crate::models::Saving>)> {
    let id = parse_id(id)?;
    let member = get_member(st, &id)
        .await?
        .ok_or(AppError::NotFound("member"))?;
    let loans = list_member_loans(st, &id, today()).await?;
    let savings = list_member_savings(st, &id, today()).await?;
    Ok((member, loans, savings))
}

pub async fn member_statement(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let (member, loans, savings) = load_statement_parts(&st, &id).await?;
    let statement = Statement {
        sacco: &st.config.sacco_name,
        member: &member,
        loans: &loans,
        savings: &savings,
    };
    let loan_balance = format_amount(statement.loan_balance());
    let savings_balance = format_amount(statement.savings_balance());

    render(StatementTemplate {
        page: Page::new(&session, "Member statement"),
        id,
        loans: loans
            .iter()
            .map(|l| LoanLine {
                date: format_date(l.date),
                amount: format_amount(l.amount),
                interest: format_amount(l.interest),
                paid: format_amount(l.paid),
                balance: format_amount(l.balance),
                deadline: format_date(l.deadline),
            })
            .collect(),
        savings: savings
            .iter()
            .map(|s| SavingLine {
                date: format_date(s.date),
                due_date: format_date(s.due_date),
                amount: format_amount(s.amount),
                interest: format_amount(s.interest),
                balance: format_amount(s.balance),
            })
            .collect(),
        loan_balance,
        savings_balance,
        name: member.name,
        no: member.no,
        period: member.period,
    })
}

pub async fn member_statement_xlsx(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (member, loans, savings) = load_statement_parts(&st, &id).await?;
    let bytes = Statement {
        sacco: &st.config.sacco_name,
        member: &member,
        loans: &loans,
        savings: &savings,
    }
    .to_xlsx()?;
    let name = format!("{}_statement.xlsx", file_stem(&member.name));
    Ok(xlsx_response(&name, bytes))
}

/// Uploaded statement workbook; its loans and savings tables replace the member's.
pub async fn member_statement_import(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    get_member(&st, &id)
        .await?
        .ok_or(AppError::NotFound("member"))?;
    let rows = read_first_sheet(&read_upload(multipart).await?)?;
    let import = statement_from_rows(rows, id, today());
    if import.loans.is_none() && import.savings.is_none() {
        return Err(AppError::bad_request("No loans or savings table found in the file"));
    }
    let (loans, savings) = replace_member_statement(&st, id, import, today()).await?;
    Ok(Json(json!({
        "ok": true,
        "imported": loans + savings,
        "loans": loans,
        "savings": savings,
    })))
}

pub async fn member_statement_pdf(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (member, loans, savings) = load_statement_parts(&st, &id).await?;
    let source = Statement {
        sacco: &st.config.sacco_name,
        member: &member,
        loans: &loans,
        savings: &savings,
    }
    .typst_source();
    let pdf = compile_pdf(&st.config.typst_bin, &source).await?;
    let name = format!("{}_statement.pdf", file_stem(&member.name));
    Ok(download("application/pdf", &name, pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_survive_query_encoding() {
        assert_eq!(members_url("2024/2025"), "/admin/members?period=2024%2F2025");
        assert_eq!(members_url("FY 2024&x"), "/admin/members?period=FY+2024%26x");
    }
}
