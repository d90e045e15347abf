use anyhow::{Context, Result};
use mongodb::{Database, bson::doc};
use std::fs;
use tracing::warn;

use crate::models::{RosterEntry, SeedUser, User};

use super::COLLECTIONS;

pub(super) async fn is_database_empty(db: &Database) -> Result<bool> {
    let count = db.collection::<User>("users").estimated_document_count().await?;
    Ok(count == 0)
}

pub(super) fn load_default_users(path: &str) -> Result<Vec<SeedUser>> {
    let users_json =
        fs::read_to_string(path).with_context(|| format!("cannot read users file {path}"))?;
    let users = serde_json::from_str::<Vec<SeedUser>>(&users_json)?;
    Ok(users)
}

/// Roster names; a missing file means no roster.
pub(super) fn load_roster(path: &str) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let entries = serde_json::from_str::<Vec<RosterEntry>>(&contents)
                .with_context(|| format!("invalid roster file {path}"))?;
            Ok(entries.into_iter().map(|e| e.name).collect())
        }
        Err(err) => {
            warn!(%path, error = %err, "roster file not loaded");
            Ok(Vec::new())
        }
    }
}

pub(super) async fn ensure_collections(db: &Database) -> Result<()> {
    let existing = db.list_collection_names().await?;
    for name in COLLECTIONS {
        if !existing.iter().any(|n| n == name) {
            db.create_collection(name).await?;
        }
    }
    Ok(())
}

pub(super) async fn seed_default_users(db: &Database, users: &[SeedUser]) -> Result<()> {
    let users_coll = db.collection::<User>("users");

    for user in users {
        users_coll
            .update_one(
                doc! { "email": &user.email },
                doc! {
                    "$set": {
                        "email": &user.email,
                        "secret": &user.secret,
                        "role": user.role.as_str(),
                        "display_name": user.display_name.clone(),
                    },
                    "$setOnInsert": { "created_at": mongodb::bson::DateTime::now() },
                },
            )
            .upsert(true)
            .await?;
    }
    Ok(())
}
