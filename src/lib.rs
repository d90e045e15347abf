// lib.rs
// SACCO back office and member portal: modules plus the router shared by main and the tests.
//
// Public:
// - GET  /          login form          POST /login
// - GET  /signup    member signup       POST /signup
// Any session:
// - POST /logout, GET /qrcode, GET|POST /account, POST /account/secret
// Members (portal):
// - /dashboard, /portal/loans, /portal/shares, /portal/reports, /portal/chat
// Admins only:
// - /admin and /admin/{members,loans,savings,contributions,ledger,reports,analysis,messages,maintenance,invite}

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

pub mod calc;
pub mod config;
pub mod dedup;
pub mod error;
pub mod import;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod statement;
pub mod totp;
pub mod xlsx;

use routes::{admin, portal};
use state::AppState;

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(admin::admin_dashboard))
        .route("/admin/periods", post(admin::periods_create))
        .route("/admin/members", get(admin::members_index))
        .route("/admin/members/add", post(admin::members_add))
        .route("/admin/members/save", post(admin::members_save))
        .route("/admin/members/delete-all", post(admin::members_delete_all))
        .route("/admin/members/import", post(admin::members_import))
        .route("/admin/members/export", get(admin::members_export))
        .route("/admin/members/{id}/delete", post(admin::members_delete))
        .route("/admin/members/{id}/invite", post(admin::member_invite))
        .route("/admin/members/{id}/statement", get(admin::member_statement))
        .route(
            "/admin/members/{id}/statement.xlsx",
            get(admin::member_statement_xlsx),
        )
        .route(
            "/admin/members/{id}/statement.pdf",
            get(admin::member_statement_pdf),
        )
        .route(
            "/admin/members/{id}/statement/import",
            post(admin::member_statement_import),
        )
        .route("/admin/loans", get(admin::loans_index))
        .route("/admin/loans/add", post(admin::loans_add))
        .route("/admin/loans/save", post(admin::loans_save))
        .route("/admin/loans/import", post(admin::loans_import))
        .route("/admin/loans/export", get(admin::loans_export))
        .route("/admin/loans/{id}/delete", post(admin::loans_delete))
        .route("/admin/loans/requests", get(admin::loan_requests_index))
        .route(
            "/admin/loans/requests/{id}/approve",
            post(admin::loan_requests_approve),
        )
        .route(
            "/admin/loans/requests/{id}/reject",
            post(admin::loan_requests_reject),
        )
        .route("/admin/savings", get(admin::savings_index))
        .route("/admin/savings/add", post(admin::savings_add))
        .route("/admin/savings/save", post(admin::savings_save))
        .route("/admin/savings/import", post(admin::savings_import))
        .route("/admin/savings/export", get(admin::savings_export))
        .route("/admin/savings/{id}/delete", post(admin::savings_delete))
        .route("/admin/contributions", get(admin::contributions_index))
        .route("/admin/contributions/save", post(admin::contributions_save))
        .route(
            "/admin/contributions/import",
            post(admin::contributions_import),
        )
        .route(
            "/admin/contributions/export",
            get(admin::contributions_export),
        )
        .route("/admin/ledger", get(admin::ledger_index))
        .route("/admin/ledger/save", post(admin::ledger_save))
        .route("/admin/ledger/delete", post(admin::ledger_delete))
        .route("/admin/ledger/import", post(admin::ledger_import))
        .route("/admin/ledger/export", get(admin::ledger_export))
        .route("/admin/reports", get(admin::reports_index))
        .route("/admin/reports/save", post(admin::reports_save))
        .route("/admin/reports/export", get(admin::reports_export))
        .route("/admin/analysis", get(admin::analysis_index))
        .route("/admin/messages", get(admin::messages_index))
        .route("/admin/messages/{user}", post(admin::messages_reply))
        .route("/admin/messages/{user}/poll", get(admin::messages_poll))
        .route("/admin/messages/{user}/typing", post(admin::messages_typing))
        .route("/admin/maintenance", get(admin::maintenance_index))
        .route("/admin/maintenance/dedup", post(admin::maintenance_dedup))
        .route("/admin/invite", get(admin::invite_index))
        .route("/admin/invite/sync", post(admin::roster_sync))
        .route("/admin/invite/send", post(admin::roster_send_invite))
        .route_layer(middleware::from_fn(session::require_admin))
}

fn member_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", post(routes::logout))
        .route("/qrcode", get(routes::qrcode))
        .route(
            "/account",
            get(routes::account_edit).post(routes::account_update),
        )
        .route("/account/secret", post(routes::account_rotate_secret))
        .route("/dashboard", get(portal::member_dashboard))
        .route("/portal/loans", get(portal::member_loans))
        .route("/portal/loans/request", post(portal::member_loan_request))
        .route("/portal/shares", get(portal::member_shares))
        .route("/portal/reports", get(portal::member_reports))
        .route(
            "/portal/chat",
            get(portal::member_chat).post(portal::member_chat_send),
        )
        .route("/portal/chat/poll", get(portal::member_chat_poll))
        .route("/portal/chat/typing", post(portal::member_chat_typing))
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(admin_routes())
        .merge(member_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/", get(routes::login_page))
        .route("/login", post(routes::login))
        .route("/signup", get(routes::signup_page).post(routes::signup))
        .merge(protected)
        .with_state(state)
}
