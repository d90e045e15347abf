use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Form, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{
    AppState, conversations, get_user_by_id, is_typing, list_conversation, mark_read,
    send_admin_reply, set_typing, typing_key,
};

use crate::routes::{ChatLine, Page, format_timestamp, parse_id, render};

struct ConversationLine {
    user_id: String,
    name: String,
    last_message: String,
    last_at: String,
    unread: bool,
    active: bool,
}

#[derive(Template)]
#[template(path = "admin/messages.html")]
struct MessagesTemplate {
    page: Page,
    conversations: Vec<ConversationLine>,
    user_id: String,
    user_name: String,
    messages: Vec<ChatLine>,
}

#[derive(Deserialize)]
pub struct ConversationQuery {
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatForm {
    pub text: String,
}

#[derive(Deserialize)]
pub struct TypingBody {
    pub typing: bool,
}

pub async fn messages_index(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Query(q): Query<ConversationQuery>,
) -> AppResult<Html<String>> {
    let selected = match q.user.as_deref().filter(|u| !u.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    let mut messages = Vec::new();
    let mut user_name = String::new();
    if let Some(user_id) = &selected {
        mark_read(&st, user_id, true).await?;
        messages = list_conversation(&st, user_id).await?;
        user_name = match get_user_by_id(&st, user_id).await? {
            Some(user) => user.display_name.unwrap_or(user.email),
            None => "Member".to_string(),
        };
    }

    let conversations = conversations(&st)
        .await?
        .into_iter()
        .map(|c| ConversationLine {
            active: Some(c.user_id) == selected,
            user_id: c.user_id.to_hex(),
            name: c.name,
            last_message: c.last_message,
            last_at: format_timestamp(c.last_at),
            unread: c.unread,
        })
        .collect();

    render(MessagesTemplate {
        page: Page::new(&session, "Messages"),
        conversations,
        user_id: selected.map(|id| id.to_hex()).unwrap_or_default(),
        user_name,
        messages: messages.into_iter().map(ChatLine::from).collect(),
    })
}

/// Polled by the open conversation: messages (marked read) and the member's typing flag.
pub async fn messages_poll(
    State(st): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> AppResult<Json<Value>> {
    let user_id = parse_id(&user)?;
    mark_read(&st, &user_id, true).await?;
    let messages: Vec<ChatLine> = list_conversation(&st, &user_id)
        .await?
        .into_iter()
        .map(ChatLine::from)
        .collect();
    let typing = is_typing(&st, &typing_key(&user_id, false)).await?;
    Ok(Json(json!({ "messages": messages, "typing": typing })))
}

pub async fn messages_reply(
    State(st): State<Arc<AppState>>,
    Path(user): Path<String>,
    Form(form): Form<ChatForm>,
) -> AppResult<Response> {
    let user_id = parse_id(&user)?;
    if send_admin_reply(&st, &user_id, &form.text).await?.is_none() {
        return Err(AppError::bad_request("Message is empty"));
    }
    set_typing(&st, &typing_key(&user_id, true), false).await?;
    Ok(Redirect::to(&format!("/admin/messages?user={}", user_id.to_hex())).into_response())
}

pub async fn messages_typing(
    State(st): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<TypingBody>,
) -> AppResult<Json<Value>> {
    let user_id = parse_id(&user)?;
    set_typing(&st, &typing_key(&user_id, true), body.typing).await?;
    Ok(Json(json!({ "ok": true })))
}
