// dedup.rs
// Duplicate-member detection: group by normalized name, keep the best record of each group.

use std::collections::BTreeMap;

use mongodb::bson::oid::ObjectId;

use crate::models::Member;

/// Upper bound of ids per bulk delete.
pub const DELETE_BATCH: usize = 450;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateStats {
    pub total: usize,
    pub groups: usize,
    pub removable: usize,
}

#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub name: String,
    /// Ranked best first; the first record is the one kept.
    pub members: Vec<Member>,
}

impl DuplicateGroup {
    pub fn keeper(&self) -> Option<&Member> {
        self.members.first()
    }

    pub fn removable(&self) -> &[Member] {
        self.members.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateScan {
    pub stats: DuplicateStats,
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateScan {
    /// Ids of every record that loses its group.
    pub fn removable_ids(&self) -> Vec<ObjectId> {
        self.groups
            .iter()
            .flat_map(|g| g.removable().iter().filter_map(|m| m.id))
            .collect()
    }
}

pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "UNKNOWN".to_string()
    } else {
        trimmed.to_uppercase()
    }
}

/// Linked login 10, invited email 5, any shares 1.
pub fn score(member: &Member) -> u32 {
    let mut score = 0;
    if member.uid.is_some() {
        score += 10;
    }
    if member.email.as_deref().is_some_and(|e| !e.trim().is_empty()) {
        score += 5;
    }
    if member.no_of_shares != 0.0 {
        score += 1;
    }
    score
}

pub fn find_duplicates(members: Vec<Member>) -> DuplicateScan {
    let total = members.len();
    let mut grouped: BTreeMap<String, Vec<Member>> = BTreeMap::new();
    for member in members {
        grouped
            .entry(normalize_name(&member.name))
            .or_default()
            .push(member);
    }

    let groups: Vec<DuplicateGroup> = grouped
        .into_iter()
        .filter(|(_, list)| list.len() > 1)
        .map(|(name, mut list)| {
            // stable: equal scores keep their original order
            list.sort_by_key(|m| std::cmp::Reverse(score(m)));
            DuplicateGroup {
                name,
                members: list,
            }
        })
        .collect();

    DuplicateScan {
        stats: DuplicateStats {
            total,
            groups: groups.len(),
            removable: groups.iter().map(|g| g.members.len() - 1).sum(),
        },
        groups,
    }
}
