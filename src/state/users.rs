use anyhow::{Context, Result};
use data_encoding::BASE32_NOPAD;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rand::RngCore;
use std::time::{Duration, SystemTime};
use tracing::info;

use crate::models::{InviteStatus, Session, User, UserRole};
use crate::totp::{DEFAULT_SECRET_BYTES, generate_base32_secret_n};

use super::AppState;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_user(state: &AppState, email: &str) -> Result<Option<User>> {
    Ok(state
        .users
        .find_one(doc! { "email": normalize_email(email) })
        .await?)
}

pub async fn get_user_by_id(state: &AppState, id: &ObjectId) -> Result<Option<User>> {
    Ok(state.users.find_one(doc! { "_id": id }).await?)
}

/// Registers a member login with a fresh TOTP secret. Fails when the email is taken.
pub async fn create_member_user(
    state: &AppState,
    email: &str,
    display_name: Option<&str>,
) -> Result<User> {
    let email = normalize_email(email);
    if find_user(state, &email).await?.is_some() {
        anyhow::bail!("an account already exists for {email}");
    }

    let mut user = User {
        id: None,
        email,
        secret: generate_base32_secret_n(DEFAULT_SECRET_BYTES),
        role: UserRole::Member,
        display_name: display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        created_at: Some(DateTime::now()),
    };
    let res = state.users.insert_one(&user).await?;
    user.id = Some(
        res.inserted_id
            .as_object_id()
            .context("user insert missing _id")?,
    );
    info!(email = %user.email, "member account created");
    Ok(user)
}

/// Links every member row carrying `email` to the login and marks it activated.
pub async fn link_members_to_user(state: &AppState, email: &str, uid: &ObjectId) -> Result<u64> {
    let res = state
        .members
        .update_many(
            doc! { "email": normalize_email(email) },
            doc! { "$set": { "uid": uid, "invite_status": InviteStatus::Activated.as_str() } },
        )
        .await?;
    Ok(res.modified_count)
}

pub async fn update_display_name(state: &AppState, id: &ObjectId, name: &str) -> Result<()> {
    state
        .users
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "display_name": name.trim() } },
        )
        .await?;
    Ok(())
}

/// Replaces the TOTP secret and returns the new one.
pub async fn rotate_secret(state: &AppState, id: &ObjectId) -> Result<String> {
    let secret = generate_base32_secret_n(DEFAULT_SECRET_BYTES);
    state
        .users
        .update_one(doc! { "_id": id }, doc! { "$set": { "secret": &secret } })
        .await?;
    Ok(secret)
}

pub async fn create_session(state: &AppState, email: &str) -> Result<String> {
    let email = normalize_email(email);
    let _ = state
        .sessions
        .delete_many(doc! { "user_email": &email })
        .await;

    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = BASE32_NOPAD.encode(&token_bytes);

    let expires_at = DateTime::from_system_time(
        SystemTime::now() + Duration::from_secs(state.config.session_ttl_seconds),
    );

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            user_email: email,
            expires_at,
        })
        .await?;

    Ok(token)
}

pub async fn find_user_by_session(state: &AppState, token: &str) -> Result<Option<User>> {
    let Some(session) = state.sessions.find_one(doc! { "token": token }).await? else {
        return Ok(None);
    };
    if session.expires_at.to_system_time() <= SystemTime::now() {
        let _ = state.sessions.delete_one(doc! { "token": token }).await;
        return Ok(None);
    }
    find_user(state, &session.user_email).await
}

pub async fn delete_session(state: &AppState, token: &str) -> Result<()> {
    state.sessions.delete_one(doc! { "token": token }).await?;
    Ok(())
}
