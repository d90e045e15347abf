use std::collections::HashMap;

use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use tracing::info;

use crate::models::{ADMIN_SENDER_ID, ChatMessage, MessageStatus, TypingState, User};

use super::AppState;

/// A typing flag older than this counts as stopped.
pub const TYPING_WINDOW_MS: i64 = 3_000;

#[derive(Debug, Clone)]
pub struct Conversation {
    pub user_id: ObjectId,
    pub name: String,
    pub last_message: String,
    pub last_at: DateTime,
    /// The member sent something the admin has not read yet.
    pub unread: bool,
}

/// One entry per conversation owner, most recent first.
pub async fn conversations(state: &AppState) -> Result<Vec<Conversation>> {
    let messages: Vec<ChatMessage> = state
        .chats
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let mut order: Vec<ObjectId> = Vec::new();
    let mut by_user: HashMap<ObjectId, Conversation> = HashMap::new();
    for msg in messages {
        let unread = !msg.from_admin() && msg.status == MessageStatus::Sent;
        match by_user.get_mut(&msg.user_id) {
            Some(conv) => {
                conv.unread |= unread;
                if conv.name.is_empty() && !msg.from_admin() {
                    conv.name = msg.sender_name.clone();
                }
            }
            None => {
                order.push(msg.user_id);
                by_user.insert(
                    msg.user_id,
                    Conversation {
                        user_id: msg.user_id,
                        name: if msg.from_admin() {
                            String::new()
                        } else {
                            msg.sender_name.clone()
                        },
                        last_message: msg.text,
                        last_at: msg.created_at,
                        unread,
                    },
                );
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| by_user.remove(&id))
        .map(|mut conv| {
            if conv.name.is_empty() {
                conv.name = "Member".to_string();
            }
            conv
        })
        .collect())
}

pub async fn list_conversation(state: &AppState, user_id: &ObjectId) -> Result<Vec<ChatMessage>> {
    Ok(state
        .chats
        .find(doc! { "user_id": user_id })
        .sort(doc! { "created_at": 1 })
        .await?
        .try_collect()
        .await?)
}

async fn insert_message(
    state: &AppState,
    user_id: &ObjectId,
    sender_id: String,
    sender_name: &str,
    text: &str,
) -> Result<Option<ObjectId>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let res = state
        .chats
        .insert_one(ChatMessage {
            id: None,
            sender_id,
            user_id: *user_id,
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            status: MessageStatus::Sent,
            created_at: DateTime::now(),
        })
        .await?;
    Ok(res.inserted_id.as_object_id())
}

/// Blank text is ignored and yields `None`.
pub async fn send_admin_reply(
    state: &AppState,
    user_id: &ObjectId,
    text: &str,
) -> Result<Option<ObjectId>> {
    let id = insert_message(state, user_id, ADMIN_SENDER_ID.to_string(), "Admin", text).await?;
    if id.is_some() {
        info!(user = %user_id, "admin reply sent");
    }
    Ok(id)
}

pub async fn send_user_message(state: &AppState, user: &User, text: &str) -> Result<Option<ObjectId>> {
    let Some(user_id) = user.id else {
        return Ok(None);
    };
    let name = user.display_name.as_deref().unwrap_or(&user.email);
    insert_message(state, &user_id, user_id.to_hex(), name, text).await
}

/// Marks the other side's messages in the conversation as read.
pub async fn mark_read(state: &AppState, user_id: &ObjectId, reader_is_admin: bool) -> Result<u64> {
    let sender = if reader_is_admin {
        doc! { "$ne": ADMIN_SENDER_ID }
    } else {
        doc! { "$eq": ADMIN_SENDER_ID }
    };
    let res = state
        .chats
        .update_many(
            doc! { "user_id": user_id, "sender_id": sender, "status": "sent" },
            doc! { "$set": { "status": "read" } },
        )
        .await?;
    Ok(res.modified_count)
}

pub async fn count_unread_user_messages(state: &AppState) -> Result<u64> {
    Ok(state
        .chats
        .count_documents(doc! { "sender_id": { "$ne": ADMIN_SENDER_ID }, "status": "sent" })
        .await?)
}

pub async fn count_unread_admin_messages(state: &AppState, user_id: &ObjectId) -> Result<u64> {
    Ok(state
        .chats
        .count_documents(doc! { "user_id": user_id, "sender_id": ADMIN_SENDER_ID, "status": "sent" })
        .await?)
}

/// `admin_<uid>` while the admin types to a member, `user_<uid>` the other way.
pub fn typing_key(user_id: &ObjectId, admin: bool) -> String {
    let side = if admin { "admin" } else { "user" };
    format!("{side}_{}", user_id.to_hex())
}

pub async fn set_typing(state: &AppState, key: &str, is_typing: bool) -> Result<()> {
    state
        .typing_states
        .replace_one(
            doc! { "_id": key },
            TypingState {
                id: key.to_string(),
                is_typing,
                updated_at: DateTime::now(),
            },
        )
        .upsert(true)
        .await?;
    Ok(())
}

pub fn typing_active(typing: &TypingState, now: DateTime) -> bool {
    typing.is_typing && now.timestamp_millis() - typing.updated_at.timestamp_millis() <= TYPING_WINDOW_MS
}

pub async fn is_typing(state: &AppState, key: &str) -> Result<bool> {
    Ok(state
        .typing_states
        .find_one(doc! { "_id": key })
        .await?
        .map(|t| typing_active(&t, DateTime::now()))
        .unwrap_or(false))
}
