use std::sync::Arc;

use askama::Template;
use axum::{extract::State, response::Html};

use crate::calc::{format_amount, format_date, today};
use crate::error::AppResult;
use crate::models::MemberColumn;
use crate::session::SessionUser;
use crate::state::{AppState, find_member_for_user, list_member_savings};

use crate::routes::{Page, render};

struct FigureLine {
    label: &'static str,
    value: String,
}

struct SavingLine {
    date: String,
    due_date: String,
    amount: String,
    interest: String,
    balance: String,
}

#[derive(Template)]
#[template(path = "portal/shares.html")]
struct SharesTemplate {
    page: Page,
    linked: bool,
    name: String,
    period: String,
    figures: Vec<FigureLine>,
    savings: Vec<SavingLine>,
    savings_balance: String,
}

/// The member's share record and savings list.
pub async fn member_shares(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let member = find_member_for_user(&st, session.user()).await?;
    let savings = match member.as_ref().and_then(|m| m.id) {
        Some(id) => list_member_savings(&st, &id, today()).await?,
        None => Vec::new(),
    };

    let figures = member
        .as_ref()
        .map(|m| {
            MemberColumn::ALL
                .iter()
                .map(|c| FigureLine {
                    label: c.label(),
                    value: format_amount(c.get(m)),
                })
                .collect()
        })
        .unwrap_or_default();

    render(SharesTemplate {
        page: Page::new(&session, "My shares"),
        linked: member.is_some(),
        name: member.as_ref().map(|m| m.name.clone()).unwrap_or_default(),
        period: member.map(|m| m.period).unwrap_or_default(),
        figures,
        savings_balance: format_amount(savings.iter().map(|s| s.balance).sum()),
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
    })
}
