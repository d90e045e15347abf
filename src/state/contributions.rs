use std::collections::HashMap;

use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calc::{contribution_total, normalize_months};
use crate::import::ImportedContribution;
use crate::models::{Contribution, ContributionKind, MONTHS};

use super::{AppState, insert_member, list_members};

/// One member line of the risk & investment grid. Rows without `member_id`
/// are roster or imported names that get a member record on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    #[serde(default)]
    pub member_id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub invest: Vec<f64>,
    #[serde(default)]
    pub risk: Vec<f64>,
}

impl GridRow {
    pub fn blank(member_id: Option<ObjectId>, name: &str) -> Self {
        Self {
            member_id,
            name: name.to_string(),
            invest: vec![0.0; MONTHS.len()],
            risk: vec![0.0; MONTHS.len()],
        }
    }

    pub fn months(&self, kind: ContributionKind) -> &[f64] {
        match kind {
            ContributionKind::Invest => &self.invest,
            ContributionKind::Risk => &self.risk,
        }
    }

    fn months_mut(&mut self, kind: ContributionKind) -> &mut Vec<f64> {
        match kind {
            ContributionKind::Invest => &mut self.invest,
            ContributionKind::Risk => &mut self.risk,
        }
    }

    /// INVEST and RISK records for this row (member id zeroed when unsaved).
    pub fn to_contributions(&self, period: &str) -> Vec<Contribution> {
        ContributionKind::ALL
            .iter()
            .map(|kind| {
                let months = normalize_months(self.months(*kind));
                Contribution {
                    id: None,
                    member_id: self.member_id.unwrap_or_else(|| ObjectId::from_bytes([0; 12])),
                    period: period.to_string(),
                    kind: *kind,
                    total: contribution_total(&months),
                    months,
                }
            })
            .collect()
    }
}

/// Members of the period with their contributions; the default roster stands in
/// for a period with no members yet.
pub async fn load_grid(state: &AppState, period: &str) -> Result<Vec<GridRow>> {
    let members = list_members(state, period).await?;
    if members.is_empty() {
        return Ok(state
            .roster
            .iter()
            .map(|name| GridRow::blank(None, name))
            .collect());
    }

    let stored: Vec<Contribution> = state
        .contributions
        .find(doc! { "period": period })
        .await?
        .try_collect()
        .await?;
    let mut by_member: HashMap<(ObjectId, ContributionKind), Vec<f64>> = HashMap::new();
    for c in stored {
        by_member.insert((c.member_id, c.kind), normalize_months(&c.months));
    }

    Ok(members
        .into_iter()
        .map(|m| {
            let mut row = GridRow::blank(m.id, &m.name);
            if let Some(id) = m.id {
                for kind in ContributionKind::ALL {
                    if let Some(months) = by_member.remove(&(id, kind)) {
                        *row.months_mut(kind) = months;
                    }
                }
            }
            row
        })
        .collect())
}

/// Creates members for unsaved rows, then upserts one record per member and kind.
pub async fn save_grid(state: &AppState, period: &str, rows: Vec<GridRow>) -> Result<usize> {
    let count = rows.len();
    for mut row in rows {
        let member_id = match row.member_id {
            Some(id) => id,
            None if row.name.trim().is_empty() => continue,
            None => insert_member(state, &row.name, period).await?,
        };
        row.member_id = Some(member_id);

        for c in row.to_contributions(period) {
            state
                .contributions
                .update_one(
                    doc! { "member_id": member_id, "period": period, "kind": c.kind.as_str() },
                    doc! { "$set": { "months": c.months.clone(), "total": c.total } },
                )
                .upsert(true)
                .await?;
        }
    }
    info!(count, period, "contributions saved");
    Ok(count)
}

/// Overlays imported rows on the current grid by upper-cased name, appending
/// unknown names, and persists the result.
pub async fn import_grid(
    state: &AppState,
    period: &str,
    imported: Vec<ImportedContribution>,
) -> Result<usize> {
    let mut grid = load_grid(state, period).await?;
    let count = imported.len();
    for item in imported {
        let key = item.name.trim().to_uppercase();
        let idx = match grid.iter().position(|r| r.name.trim().to_uppercase() == key) {
            Some(idx) => idx,
            None => {
                grid.push(GridRow::blank(None, item.name.trim()));
                grid.len() - 1
            }
        };
        *grid[idx].months_mut(item.kind) = normalize_months(&item.months);
    }
    save_grid(state, period, grid).await?;
    Ok(count)
}

/// Export rows: INVEST then RISK for every member line.
pub fn export_rows(grid: &[GridRow], period: &str) -> Vec<(String, Contribution)> {
    grid.iter()
        .flat_map(|row| {
            row.to_contributions(period)
                .into_iter()
                .map(|c| (row.name.clone(), c))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_expand_to_invest_then_risk() {
        let mut row = GridRow::blank(None, "MR. KIHIU");
        row.invest[0] = 100.0;
        row.risk = vec![5.0, 5.0];
        let out = export_rows(&[row], "2024/2025");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1.kind, ContributionKind::Invest);
        assert_eq!(out[0].1.total, 100.0);
        assert_eq!(out[1].1.months.len(), 12);
        assert_eq!(out[1].1.total, 10.0);
    }
}
