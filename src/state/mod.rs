// state module: AppState, initialization, and re-exports of the per-collection helpers.

use anyhow::Result;
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::config::AppConfig;
use crate::models::{
    ChatMessage, Contribution, FinancialYear, GeneralLedger, Loan, LoanRequest, Member, Report,
    Saving, Session, TypingState, User,
};

mod seed;
mod users;
mod members;
mod periods;
mod loans;
mod savings;
mod loan_requests;
mod contributions;
mod ledger;
mod reports;
mod messages;

pub use users::*;
pub use members::*;
pub use periods::*;
pub use loans::*;
pub use savings::*;
pub use loan_requests::*;
pub use contributions::*;
pub use ledger::*;
pub use reports::*;
pub use messages::*;

pub const COLLECTIONS: [&str; 12] = [
    "users",
    "sessions",
    "members",
    "loans",
    "savings",
    "loan_requests",
    "chats",
    "typing_states",
    "reports",
    "financial_years",
    "contributions",
    "general_ledgers",
];

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Default member names offered by the roster tools and empty contribution grids.
    pub roster: Vec<String>,
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub members: Collection<Member>,
    pub loans: Collection<Loan>,
    pub savings: Collection<Saving>,
    pub loan_requests: Collection<LoanRequest>,
    pub chats: Collection<ChatMessage>,
    pub typing_states: Collection<TypingState>,
    pub reports: Collection<Report>,
    pub financial_years: Collection<FinancialYear>,
    pub contributions: Collection<Contribution>,
    pub general_ledgers: Collection<GeneralLedger>,
}

impl AppState {
    /// Collection handles only; nothing touches the server until a query runs.
    pub fn from_database(db: &Database, config: AppConfig) -> Self {
        Self {
            config,
            roster: Vec::new(),
            users: db.collection("users"),
            sessions: db.collection("sessions"),
            members: db.collection("members"),
            loans: db.collection("loans"),
            savings: db.collection("savings"),
            loan_requests: db.collection("loan_requests"),
            chats: db.collection("chats"),
            typing_states: db.collection("typing_states"),
            reports: db.collection("reports"),
            financial_years: db.collection("financial_years"),
            contributions: db.collection("contributions"),
            general_ledgers: db.collection("general_ledgers"),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.config.sacco_name
    }
}

pub async fn init_state(config: AppConfig) -> Result<AppState> {
    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.mongodb_db);

    seed::ensure_collections(&db).await?;

    if seed::is_database_empty(&db).await? {
        let default_users = seed::load_default_users(&config.users_file)?;
        seed::seed_default_users(&db, &default_users).await?;
        info!(count = default_users.len(), "seeded users");
    }

    let roster = seed::load_roster(&config.roster_file)?;
    let mut state = AppState::from_database(&db, config);
    state.roster = roster;
    Ok(state)
}
