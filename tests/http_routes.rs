#[path = "common/mod.rs"]
mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt; // for oneshot

use saccodesk::{
    models::{Loan, Member, Saving},
    router,
    session::SESSION_COOKIE_NAME,
    state::{
        add_member_row, create_session, get_member, list_member_loans, list_member_savings,
        list_members, list_user_requests, save_loans, save_members, save_savings,
    },
};

struct Reply {
    status: StatusCode,
    content_type: String,
    disposition: String,
    body: String,
    bytes: Vec<u8>,
}

async fn send(app: Router, req: Request<Body>) -> Reply {
    let res = app.oneshot(req).await.expect("request failed");
    let status = res.status();
    let header_text = |name: header::HeaderName| {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let content_type = header_text(header::CONTENT_TYPE);
    let disposition = header_text(header::CONTENT_DISPOSITION);
    let bytes = to_bytes(res.into_body(), 4 * 1024 * 1024)
        .await
        .expect("body read failed")
        .to_vec();
    Reply {
        status,
        content_type,
        disposition,
        body: String::from_utf8_lossy(&bytes).to_string(),
        bytes,
    }
}

fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(path: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json(path: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_file(path: &str, token: &str, file: &[u8]) -> Request<Body> {
    let boundary = "saccodesk-upload";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.xlsx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn sessions_gate_the_portal_and_the_back_office() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());

    let reply = send(app.clone(), get("/", None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("MITEWA"));

    let reply = send(app.clone(), get("/dashboard", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(app.clone(), get("/dashboard", Some("not-a-session"))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let member = ctx.member("portal@example.com").await;
    let member_token = create_session(&ctx.state, &member.email).await.unwrap();
    let reply = send(app.clone(), get("/admin", Some(&member_token))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = send(app.clone(), get("/admin/members", Some(&member_token))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let login = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("email={}&code=000000x", common::ADMIN_EMAIL)))
        .unwrap();
    let reply = send(app.clone(), login).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn admin_pages_render() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();
    let member = add_member_row(&ctx.state, "2024/2025").await.unwrap();
    let member_id = member.id.unwrap().to_hex();

    let pages = [
        "/admin".to_string(),
        "/admin/members?period=2024/2025".to_string(),
        format!("/admin/members/{member_id}/statement"),
        format!("/admin/loans?member={member_id}"),
        "/admin/loans/requests".to_string(),
        format!("/admin/savings?member={member_id}"),
        "/admin/contributions".to_string(),
        "/admin/ledger".to_string(),
        "/admin/reports".to_string(),
        "/admin/analysis".to_string(),
        "/admin/messages".to_string(),
        "/admin/maintenance".to_string(),
        "/admin/invite".to_string(),
        "/account".to_string(),
    ];
    for path in pages {
        let reply = send(app.clone(), get(&path, Some(&token))).await;
        assert_eq!(reply.status, StatusCode::OK, "GET {path} must return 200");
        assert!(reply.content_type.starts_with("text/html"), "GET {path}");
    }

    let reply = send(app.clone(), get("/admin/contributions", Some(&token))).await;
    assert!(reply.body.contains(&ctx.state.roster[0].replace('\'', "&#39;")));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn admin_bulk_save_and_downloads() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();
    let member = add_member_row(&ctx.state, "2024/2025").await.unwrap();
    let id = member.id.unwrap();

    let rows = json!([{
        "_id": { "$oid": id.to_hex() },
        "no": 1,
        "name": "MR. NDUNGU P. K",
        "no_of_shares": 4,
        "amount_of_shares": 8000,
        "period": "2024/2025"
    }]);
    let reply = send(app.clone(), post_json("/admin/members/save", &token, rows)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let saved: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(saved["saved"], 1);
    let stored = get_member(&ctx.state, &id).await.unwrap().unwrap();
    assert_eq!(stored.name, "MR. NDUNGU P. K");
    assert_eq!(stored.amount_of_shares, 8_000.0);

    let reply = send(
        app.clone(),
        get("/admin/members/export?period=2024/2025", Some(&token)),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type.contains("spreadsheetml"));

    let reply = send(
        app.clone(),
        get("/admin/reports/export?period=2024/2025", Some(&token)),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type, "application/msword");
    assert!(reply.body.contains("Treasurer's Report for the Year 2024/2025"));

    let reply = send(
        app.clone(),
        post_form("/admin/periods", &token, "name=2030%2F2031&back=%2Fadmin%2Fledger"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let reply = send(
        app.clone(),
        post_form("/admin/periods", &token, "name=2030%2F2031&back=%2Fadmin"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn member_portal_requests_and_chat() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let member = ctx.member("portal@example.com").await;
    let uid = member.id.unwrap();
    let token = create_session(&ctx.state, &member.email).await.unwrap();
    let admin_token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();

    for path in [
        "/dashboard",
        "/portal/loans",
        "/portal/shares",
        "/portal/reports",
        "/portal/chat",
    ] {
        let reply = send(app.clone(), get(path, Some(&token))).await;
        assert_eq!(reply.status, StatusCode::OK, "GET {path} must return 200");
    }

    let reply = send(
        app.clone(),
        post_form(
            "/portal/loans/request",
            &token,
            "amount=50&purpose=seed&duration=3",
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body.contains("Minimum loan amount is 100"));

    let reply = send(
        app.clone(),
        post_form(
            "/portal/loans/request",
            &token,
            "amount=2500&purpose=school+fees&duration=6",
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let requests = list_user_requests(&ctx.state, &uid).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 2_500.0);

    let reply = send(
        app.clone(),
        post_form("/portal/chat", &token, "text=Hello+office"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let reply = send(
        app.clone(),
        post_json("/portal/chat/typing", &token, json!({ "typing": true })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let poll = format!("/admin/messages/{}/poll", uid.to_hex());
    let reply = send(app.clone(), get(&poll, Some(&admin_token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let data: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(data["typing"], true);
    assert_eq!(data["messages"][0]["text"], "Hello office");
    assert_eq!(data["messages"][0]["from_admin"], false);

    let reply = send(
        app.clone(),
        post_form(&format!("/admin/messages/{}", uid.to_hex()), &admin_token, "text=+"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn loan_grid_keeps_entered_interest() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();
    let member = add_member_row(&ctx.state, "2024/2025").await.unwrap();
    let id = member.id.unwrap();

    save_loans(
        &ctx.state,
        vec![Loan {
            id: None,
            member_id: id,
            date: Some(day(2025, 1, 5)),
            amount: 1_000.0,
            interest: 0.0,
            paid: 0.0,
            balance: 0.0,
            deadline: Some(day(2099, 1, 1)),
        }],
        day(2025, 1, 5),
    )
    .await
    .unwrap();
    let loan_id = list_member_loans(&ctx.state, &id, day(2025, 1, 5)).await.unwrap()[0]
        .id
        .unwrap();

    let page = send(
        app.clone(),
        get(&format!("/admin/loans?member={}", id.to_hex()), Some(&token)),
    )
    .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(r#"data-field="interest""#));

    let rows = json!([{
        "_id": { "$oid": loan_id.to_hex() },
        "member_id": { "$oid": id.to_hex() },
        "date": "2025-01-05",
        "amount": 1000,
        "paid": 0,
        "interest": 120,
        "deadline": "2099-01-01"
    }]);
    let reply = send(app.clone(), post_json("/admin/loans/save", &token, rows)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let loans = list_member_loans(&ctx.state, &id, day(2025, 6, 1)).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].interest, 120.0);
    assert_eq!(loans[0].balance, 1_120.0);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn delete_all_only_removes_the_searched_members() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();
    let period = "2024/2025";
    let rows: Vec<Member> = ["MR. WANJAU", "MRS. WANJAU", "MR. KIHIU"]
        .iter()
        .enumerate()
        .map(|(i, name)| Member {
            no: i as i64 + 1,
            name: name.to_string(),
            period: period.to_string(),
            ..Member::default()
        })
        .collect();
    save_members(&ctx.state, &rows).await.unwrap();

    let page = send(
        app.clone(),
        get("/admin/members?period=2024%2F2025&search=wanj", Some(&token)),
    )
    .await;
    assert!(page.body.contains(r#"name="search" value="wanj""#));

    let reply = send(
        app.clone(),
        post_form(
            "/admin/members/delete-all",
            &token,
            "period=2024%2F2025&search=wanj",
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let left = list_members(&ctx.state, period).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name, "MR. KIHIU");

    let reply = send(
        app.clone(),
        post_form("/admin/members/delete-all", &token, "period=2024%2F2025"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(list_members(&ctx.state, period).await.unwrap().is_empty());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn contributions_export_is_named_for_the_period() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();

    let reply = send(
        app.clone(),
        get("/admin/contributions/export?period=2024%2F2025", Some(&token)),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.disposition,
        "attachment; filename=\"Member_Contributions_2024-2025.xlsx\""
    );

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn statement_workbook_imports_back_for_the_member() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let app = router(ctx.state.clone());
    let token = create_session(&ctx.state, common::ADMIN_EMAIL).await.unwrap();
    let member = add_member_row(&ctx.state, "2024/2025").await.unwrap();
    let id = member.id.unwrap();
    let today = day(2025, 1, 10);

    save_loans(
        &ctx.state,
        vec![Loan {
            id: None,
            member_id: id,
            date: Some(day(2025, 1, 5)),
            amount: 4_000.0,
            interest: 120.0,
            paid: 1_000.0,
            balance: 0.0,
            deadline: Some(day(2099, 1, 1)),
        }],
        today,
    )
    .await
    .unwrap();
    save_savings(
        &ctx.state,
        vec![Saving {
            id: None,
            member_id: id,
            date: Some(day(2025, 1, 1)),
            due_date: Some(day(2099, 1, 1)),
            amount: 700.0,
            interest: 0.0,
            balance: 0.0,
        }],
        today,
    )
    .await
    .unwrap();

    let export = send(
        app.clone(),
        get(
            &format!("/admin/members/{}/statement.xlsx", id.to_hex()),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(export.status, StatusCode::OK);

    let path = format!("/admin/members/{}/statement/import", id.to_hex());
    let reply = send(app.clone(), post_file(&path, &token, &export.bytes)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let result: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(result["loans"], 1);
    assert_eq!(result["savings"], 1);

    let loans = list_member_loans(&ctx.state, &id, today).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].interest, 120.0);
    assert_eq!(loans[0].balance, 3_120.0);
    let savings = list_member_savings(&ctx.state, &id, today).await.unwrap();
    assert_eq!(savings.len(), 1);
    assert_eq!(savings[0].amount, 700.0);

    let reply = send(app.clone(), post_file(&path, &token, b"not a workbook")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    common::teardown(Some(ctx)).await;
}
