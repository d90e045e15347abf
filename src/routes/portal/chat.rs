use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::{Value, json};

use crate::error::{AppError, AppResult};
use crate::session::SessionUser;
use crate::state::{
    AppState, is_typing, list_conversation, mark_read, send_user_message, set_typing, typing_key,
};

use crate::routes::admin::{ChatForm, TypingBody};
use crate::routes::{ChatLine, Page, render};

#[derive(Template)]
#[template(path = "portal/chat.html")]
struct ChatTemplate {
    page: Page,
    messages: Vec<ChatLine>,
}

pub async fn member_chat(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Html<String>> {
    let user_id = *session.user_id().ok_or(AppError::Unauthorized)?;
    mark_read(&st, &user_id, false).await?;
    let messages = list_conversation(&st, &user_id)
        .await?
        .into_iter()
        .map(ChatLine::from)
        .collect();
    render(ChatTemplate {
        page: Page::new(&session, "Chat with the office"),
        messages,
    })
}

pub async fn member_chat_poll(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
) -> AppResult<Json<Value>> {
    let user_id = *session.user_id().ok_or(AppError::Unauthorized)?;
    mark_read(&st, &user_id, false).await?;
    let messages: Vec<ChatLine> = list_conversation(&st, &user_id)
        .await?
        .into_iter()
        .map(ChatLine::from)
        .collect();
    let typing = is_typing(&st, &typing_key(&user_id, true)).await?;
    Ok(Json(json!({ "messages": messages, "typing": typing })))
}

pub async fn member_chat_send(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Form(form): Form<ChatForm>,
) -> AppResult<Response> {
    let user_id = *session.user_id().ok_or(AppError::Unauthorized)?;
    if send_user_message(&st, session.user(), &form.text).await?.is_none() {
        return Err(AppError::bad_request("Message is empty"));
    }
    set_typing(&st, &typing_key(&user_id, false), false).await?;
    Ok(Redirect::to("/portal/chat").into_response())
}

pub async fn member_chat_typing(
    State(st): State<Arc<AppState>>,
    session: SessionUser,
    Json(body): Json<TypingBody>,
) -> AppResult<Json<Value>> {
    let user_id = *session.user_id().ok_or(AppError::Unauthorized)?;
    set_typing(&st, &typing_key(&user_id, false), body.typing).await?;
    Ok(Json(json!({ "ok": true })))
}
