use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::dedup::score;
use crate::error::AppResult;
use crate::session::SessionUser;
use crate::state::{AppState, remove_duplicates, scan_duplicates};

use crate::routes::{Page, render};

struct RecordLine {
    id: String,
    period: String,
    email: String,
    score: u32,
    keep: bool,
}

struct GroupLine {
    name: String,
    records: Vec<RecordLine>,
}

#[derive(Template)]
#[template(path = "admin/maintenance.html")]
struct MaintenanceTemplate {
    page: Page,
    total: usize,
    groups: usize,
    removable: usize,
    duplicates: Vec<GroupLine>,
}

pub async fn maintenance_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let scan = scan_duplicates(&st).await?;
    let duplicates = scan
        .groups
        .iter()
        .map(|g| GroupLine {
            name: g.name.clone(),
            records: g
                .members
                .iter()
                .enumerate()
                .map(|(i, m)| RecordLine {
                    id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
                    period: m.period.clone(),
                    email: m.email.clone().unwrap_or_default(),
                    score: score(m),
                    keep: i == 0,
                })
                .collect(),
        })
        .collect();

    render(MaintenanceTemplate {
        page: Page::new(&session, "Maintenance"),
        total: scan.stats.total,
        groups: scan.stats.groups,
        removable: scan.stats.removable,
        duplicates,
    })
}

pub async fn maintenance_dedup(State(st): State<Arc<AppState>>) -> AppResult<Response> {
    remove_duplicates(&st).await?;
    Ok(Redirect::to("/admin/maintenance").into_response())
}
