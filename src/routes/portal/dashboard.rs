use std::sync::Arc;

use askama::Template;
use axum::{extract::State, response::Html};

use crate::calc::{format_amount, today};
use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::{
    AppState, count_unread_admin_messages, find_member_for_user, list_member_loans, summarize_loans,
};

use crate::routes::{Page, render};

#[derive(Template)]
#[template(path = "portal/dashboard.html")]
struct MemberDashboardTemplate {
    page: Page,
    linked: bool,
    member_name: String,
    period: String,
    shares: String,
    outstanding: String,
    active_loans: usize,
    unread_messages: u64,
}

pub async fn member_dashboard(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let member = find_member_for_user(&st, session.user()).await?;
    let unread_messages = match session.user_id() {
        Some(id) => count_unread_admin_messages(&st, id).await?,
        None => 0,
    };

    let (linked, member_name, period, shares, summary) = match member {
        Some(member) => {
            let loans = match member.id {
                Some(id) => list_member_loans(&st, &id, today()).await?,
                None => Vec::new(),
            };
            (
                true,
                member.name,
                member.period,
                member.amount_of_shares,
                summarize_loans(&loans),
            )
        }
        None => (false, String::new(), String::new(), 0.0, Default::default()),
    };

    render(MemberDashboardTemplate {
        page: Page::new(&session, "My account"),
        linked,
        member_name,
        period,
        shares: format_amount(shares),
        outstanding: format_amount(summary.outstanding),
        active_loans: summary.active,
        unread_messages,
    })
}
