// routes/mod.rs
// Route modules plus the helpers shared by every screen.

use askama::Template;
use axum::{
    body::Body,
    extract::Multipart,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::ChatMessage;
use crate::session::SessionUser;

pub mod account;
pub mod admin;
pub mod auth;
pub mod portal;
pub mod qrcode;

pub use account::*;
pub use auth::*;
pub use qrcode::qrcode;

pub(crate) fn render<T: Template>(tpl: T) -> AppResult<Html<String>> {
    Ok(Html(tpl.render()?))
}

/// Layout data for `base.html`.
pub(crate) struct Page {
    pub title: String,
    pub user: String,
    pub admin: bool,
}

impl Page {
    pub fn new(session: &SessionUser, title: &str) -> Self {
        Self {
            title: title.to_string(),
            user: session.display_name().to_string(),
            admin: session.is_admin(),
        }
    }
}

/// Option of a `<select>`.
pub(crate) struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub(crate) fn period_choices(periods: &[String], selected: &str) -> Vec<Choice> {
    periods
        .iter()
        .map(|p| Choice {
            value: p.clone(),
            label: p.clone(),
            selected: p == selected,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    #[serde(default)]
    pub period: Option<String>,
}

pub(crate) fn parse_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request("invalid id"))
}

pub(crate) fn format_timestamp(dt: bson::DateTime) -> String {
    let dt: DateTime<Utc> = dt.to_chrono();
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// Chat message as the polling endpoints return it.
#[derive(Debug, Serialize)]
pub(crate) struct ChatLine {
    pub from_admin: bool,
    pub sender_name: String,
    pub text: String,
    pub read: bool,
    pub at: String,
}

impl From<ChatMessage> for ChatLine {
    fn from(msg: ChatMessage) -> Self {
        Self {
            from_admin: msg.from_admin(),
            read: msg.status == crate::models::MessageStatus::Read,
            at: format_timestamp(msg.created_at),
            sender_name: msg.sender_name,
            text: msg.text,
        }
    }
}

/// Form-encodes a query value (`2024/2025` -> `2024%2F2025`).
pub(crate) fn encode_query(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Bytes of the first file field of a multipart upload.
pub(crate) async fn read_upload(mut multipart: Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        return Ok(bytes.to_vec());
    }
    Err(AppError::bad_request("no file uploaded"))
}

pub(crate) fn download(content_type: &'static str, filename: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    let mut response = (StatusCode::OK, Body::from(bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

pub(crate) fn xlsx_response(filename: &str, bytes: Vec<u8>) -> Response {
    download(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        filename,
        bytes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_form_encoded() {
        assert_eq!(encode_query("2024/2025"), "2024%2F2025");
        assert_eq!(encode_query("a b&c"), "a+b%26c");
    }

    #[test]
    fn selected_period_is_marked() {
        let choices = period_choices(&["2023/2024".into(), "2024/2025".into()], "2024/2025");
        assert!(!choices[0].selected);
        assert!(choices[1].selected);
    }

    #[test]
    fn downloads_are_attachments() {
        let resp = xlsx_response("Members_Data_2024-2025.xlsx", vec![1, 2, 3]);
        let disp = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disp, "attachment; filename=\"Members_Data_2024-2025.xlsx\"");
    }
}
