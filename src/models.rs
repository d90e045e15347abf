// models.rs
// Domain models for seed data (users.json, roster) and MongoDB collections.

use chrono::NaiveDate;
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Sender id used for every message written by the back office.
pub const ADMIN_SENDER_ID: &str = "admin";

/// User roles for authorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn default_admin() -> Self {
        UserRole::Admin
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Member
    }
}

/// User definition as stored in users.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub secret: String,
    #[serde(default = "UserRole::default_admin")]
    pub role: UserRole,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Entry of the default member roster file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
}

/// Login account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub secret: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
}

/// Session document linking a token to a user and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Sent,
    Invited,
    Activated,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Sent => "sent",
            InviteStatus::Invited => "invited",
            InviteStatus::Activated => "activated",
        }
    }
}

/// Member registry row for one financial period.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Member {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub no: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub no_of_shares: f64,
    #[serde(default)]
    pub amount_of_shares: f64,
    #[serde(default)]
    pub dividend: f64,
    #[serde(default)]
    pub hon: f64,
    #[serde(default)]
    pub investment_arrears: f64,
    #[serde(default)]
    pub risk_fund_arrears: f64,
    #[serde(default)]
    pub arrears_on_shares: f64,
    #[serde(default)]
    pub arrears_on_loans: f64,
    #[serde(default)]
    pub prev_year_arrears_balance: f64,
    #[serde(default)]
    pub absenteeism: f64,
    #[serde(default)]
    pub arrears_on_welfare: f64,
    #[serde(default)]
    pub less_advanced: f64,
    #[serde(default)]
    pub net_pay_amount: f64,
    #[serde(default)]
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Linked login (`users._id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_status: Option<InviteStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub member_id: ObjectId,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub interest: f64,
    #[serde(default)]
    pub paid: f64,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Saving {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub member_id: ObjectId,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub interest: f64,
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_email: String,
    pub amount: f64,
    pub purpose: String,
    /// Months.
    pub duration: i32,
    pub status: RequestStatus,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
}

/// Chat message; `user_id` names the conversation (the member's login).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender_id: String,
    pub user_id: ObjectId,
    pub sender_name: String,
    pub text: String,
    pub status: MessageStatus,
    pub created_at: DateTime,
}

impl ChatMessage {
    pub fn from_admin(&self) -> bool {
        self.sender_id == ADMIN_SENDER_ID
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingState {
    #[serde(rename = "_id")]
    pub id: String,
    pub is_typing: bool,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: String,
    pub year: String,
    pub content: String,
    pub last_updated: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialYear {
    /// Period id (`2024-2025`).
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime>,
}

/// Contribution category of the risk & investment grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContributionKind {
    #[serde(rename = "INVEST")]
    Invest,
    #[serde(rename = "RISK")]
    Risk,
}

impl ContributionKind {
    pub const ALL: [ContributionKind; 2] = [ContributionKind::Invest, ContributionKind::Risk];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionKind::Invest => "INVEST",
            ContributionKind::Risk => "RISK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "INVEST" => Some(ContributionKind::Invest),
            "RISK" => Some(ContributionKind::Risk),
            _ => None,
        }
    }
}

/// Months of the financial year, August first.
pub const MONTHS: [&str; 12] = [
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub member_id: ObjectId,
    pub period: String,
    pub kind: ContributionKind,
    /// Twelve amounts in `MONTHS` order.
    #[serde(default)]
    pub months: Vec<f64>,
    #[serde(default)]
    pub total: f64,
}

/// Columns of the collections & expenses ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerField {
    CollectionFromShares,
    SharesArears,
    LoanGivenOut,
    LoanRefund,
    LoanArrears,
    CollectionFromRiskRefund,
    RiskFundArears,
    PreviousYearArearsRecovery,
    PreviousYearsBalances,
    WelfareBalances,
    WelfareSavings,
    Expenses,
}

impl LedgerField {
    pub const ALL: [LedgerField; 12] = [
        LedgerField::CollectionFromShares,
        LedgerField::SharesArears,
        LedgerField::LoanGivenOut,
        LedgerField::LoanRefund,
        LedgerField::LoanArrears,
        LedgerField::CollectionFromRiskRefund,
        LedgerField::RiskFundArears,
        LedgerField::PreviousYearArearsRecovery,
        LedgerField::PreviousYearsBalances,
        LedgerField::WelfareBalances,
        LedgerField::WelfareSavings,
        LedgerField::Expenses,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            LedgerField::CollectionFromShares => "collection_from_shares",
            LedgerField::SharesArears => "shares_arears",
            LedgerField::LoanGivenOut => "loan_given_out",
            LedgerField::LoanRefund => "loan_refund",
            LedgerField::LoanArrears => "loan_arrears",
            LedgerField::CollectionFromRiskRefund => "collection_from_risk_refund",
            LedgerField::RiskFundArears => "risk_fund_arears",
            LedgerField::PreviousYearArearsRecovery => "previous_year_arears_recovery",
            LedgerField::PreviousYearsBalances => "previous_years_balances",
            LedgerField::WelfareBalances => "welfare_balances",
            LedgerField::WelfareSavings => "welfare_savings",
            LedgerField::Expenses => "expenses",
        }
    }

    /// Spreadsheet header: key with spaces, upper-cased.
    pub fn header(&self) -> String {
        self.key().replace('_', " ").to_uppercase()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerRow {
    #[serde(default)]
    pub collection_from_shares: f64,
    #[serde(default)]
    pub shares_arears: f64,
    #[serde(default)]
    pub loan_given_out: f64,
    #[serde(default)]
    pub loan_refund: f64,
    #[serde(default)]
    pub loan_arrears: f64,
    #[serde(default)]
    pub collection_from_risk_refund: f64,
    #[serde(default)]
    pub risk_fund_arears: f64,
    #[serde(default)]
    pub previous_year_arears_recovery: f64,
    #[serde(default)]
    pub previous_years_balances: f64,
    #[serde(default)]
    pub welfare_balances: f64,
    #[serde(default)]
    pub welfare_savings: f64,
    #[serde(default)]
    pub expenses: f64,
}

impl LedgerRow {
    pub fn get(&self, field: LedgerField) -> f64 {
        match field {
            LedgerField::CollectionFromShares => self.collection_from_shares,
            LedgerField::SharesArears => self.shares_arears,
            LedgerField::LoanGivenOut => self.loan_given_out,
            LedgerField::LoanRefund => self.loan_refund,
            LedgerField::LoanArrears => self.loan_arrears,
            LedgerField::CollectionFromRiskRefund => self.collection_from_risk_refund,
            LedgerField::RiskFundArears => self.risk_fund_arears,
            LedgerField::PreviousYearArearsRecovery => self.previous_year_arears_recovery,
            LedgerField::PreviousYearsBalances => self.previous_years_balances,
            LedgerField::WelfareBalances => self.welfare_balances,
            LedgerField::WelfareSavings => self.welfare_savings,
            LedgerField::Expenses => self.expenses,
        }
    }

    pub fn set(&mut self, field: LedgerField, value: f64) {
        let slot = match field {
            LedgerField::CollectionFromShares => &mut self.collection_from_shares,
            LedgerField::SharesArears => &mut self.shares_arears,
            LedgerField::LoanGivenOut => &mut self.loan_given_out,
            LedgerField::LoanRefund => &mut self.loan_refund,
            LedgerField::LoanArrears => &mut self.loan_arrears,
            LedgerField::CollectionFromRiskRefund => &mut self.collection_from_risk_refund,
            LedgerField::RiskFundArears => &mut self.risk_fund_arears,
            LedgerField::PreviousYearArearsRecovery => &mut self.previous_year_arears_recovery,
            LedgerField::PreviousYearsBalances => &mut self.previous_years_balances,
            LedgerField::WelfareBalances => &mut self.welfare_balances,
            LedgerField::WelfareSavings => &mut self.welfare_savings,
            LedgerField::Expenses => &mut self.expenses,
        };
        *slot = value;
    }
}

/// Fixed number of rows in a period ledger.
pub const LEDGER_ROWS: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralLedger {
    /// Period id (`2024-2025`).
    #[serde(rename = "_id")]
    pub id: String,
    pub period: String,
    #[serde(default)]
    pub rows: Vec<LedgerRow>,
}

/// Numeric columns of the member registry, in table/export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberColumn {
    NoOfShares,
    AmountOfShares,
    Dividend,
    Hon,
    InvestmentArrears,
    RiskFundArrears,
    ArrearsOnShares,
    ArrearsOnLoans,
    PrevYearArrearsBalance,
    Absenteeism,
    ArrearsOnWelfare,
    LessAdvanced,
    NetPayAmount,
}

impl MemberColumn {
    pub const ALL: [MemberColumn; 13] = [
        MemberColumn::NoOfShares,
        MemberColumn::AmountOfShares,
        MemberColumn::Dividend,
        MemberColumn::Hon,
        MemberColumn::InvestmentArrears,
        MemberColumn::RiskFundArrears,
        MemberColumn::ArrearsOnShares,
        MemberColumn::ArrearsOnLoans,
        MemberColumn::PrevYearArrearsBalance,
        MemberColumn::Absenteeism,
        MemberColumn::ArrearsOnWelfare,
        MemberColumn::LessAdvanced,
        MemberColumn::NetPayAmount,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MemberColumn::NoOfShares => "no_of_shares",
            MemberColumn::AmountOfShares => "amount_of_shares",
            MemberColumn::Dividend => "dividend",
            MemberColumn::Hon => "hon",
            MemberColumn::InvestmentArrears => "investment_arrears",
            MemberColumn::RiskFundArrears => "risk_fund_arrears",
            MemberColumn::ArrearsOnShares => "arrears_on_shares",
            MemberColumn::ArrearsOnLoans => "arrears_on_loans",
            MemberColumn::PrevYearArrearsBalance => "prev_year_arrears_balance",
            MemberColumn::Absenteeism => "absenteeism",
            MemberColumn::ArrearsOnWelfare => "arrears_on_welfare",
            MemberColumn::LessAdvanced => "less_advanced",
            MemberColumn::NetPayAmount => "net_pay_amount",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.key() == key)
    }

    /// Header written on export.
    pub fn label(&self) -> &'static str {
        match self {
            MemberColumn::NoOfShares => "No. of Shares",
            MemberColumn::AmountOfShares => "Amount Shares",
            MemberColumn::Dividend => "Dividend",
            MemberColumn::Hon => "HON",
            MemberColumn::InvestmentArrears => "Investment Arrears",
            MemberColumn::RiskFundArrears => "Risk Fund Arrears",
            MemberColumn::ArrearsOnShares => "Arrears on Shares",
            MemberColumn::ArrearsOnLoans => "Arrears on loans",
            MemberColumn::PrevYearArrearsBalance => "Previous Year Arrears Balance",
            MemberColumn::Absenteeism => "Absenteeism",
            MemberColumn::ArrearsOnWelfare => "Arrears On Welfare",
            MemberColumn::LessAdvanced => "Less Advanced",
            MemberColumn::NetPayAmount => "Net Pay Amount",
        }
    }

    /// Headers accepted on import, first match wins.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            MemberColumn::NoOfShares => &[
                "NO OF SHARES",
                "noOfShares",
                "Shares Count",
                "No. of Shares",
            ],
            MemberColumn::AmountOfShares => &[
                "AMOUNT OF SHARES",
                "amountOfShares",
                "Shares Amount",
                "Amount Shares",
            ],
            MemberColumn::Dividend => &["DIVIDEND"],
            MemberColumn::Hon => &["HON"],
            MemberColumn::InvestmentArrears => &["INVESTMENT ARREARS", "investmentArrears"],
            MemberColumn::RiskFundArrears => &["RISK FUND ARREARS", "riskFundArrears"],
            MemberColumn::ArrearsOnShares => &["ARREARS ON SHARES", "arrearsOnShares"],
            MemberColumn::ArrearsOnLoans => &["ARREARS ON LOANS", "arrearsOnLoans"],
            MemberColumn::PrevYearArrearsBalance => &[
                "PREVIOUS YEAR ARREARS BALANCE",
                "prevYearArrearsBalance",
                "PREV ARREARS",
            ],
            MemberColumn::Absenteeism => &["ABSENTEEISM"],
            MemberColumn::ArrearsOnWelfare => &["ARREARS ON WELFARE", "arrearsOnWelfare"],
            MemberColumn::LessAdvanced => &["LESS ADVANCED", "lessAdvanced"],
            MemberColumn::NetPayAmount => &["NET PAY AMOUNT", "netPayAmount"],
        }
    }

    pub fn get(&self, member: &Member) -> f64 {
        match self {
            MemberColumn::NoOfShares => member.no_of_shares,
            MemberColumn::AmountOfShares => member.amount_of_shares,
            MemberColumn::Dividend => member.dividend,
            MemberColumn::Hon => member.hon,
            MemberColumn::InvestmentArrears => member.investment_arrears,
            MemberColumn::RiskFundArrears => member.risk_fund_arrears,
            MemberColumn::ArrearsOnShares => member.arrears_on_shares,
            MemberColumn::ArrearsOnLoans => member.arrears_on_loans,
            MemberColumn::PrevYearArrearsBalance => member.prev_year_arrears_balance,
            MemberColumn::Absenteeism => member.absenteeism,
            MemberColumn::ArrearsOnWelfare => member.arrears_on_welfare,
            MemberColumn::LessAdvanced => member.less_advanced,
            MemberColumn::NetPayAmount => member.net_pay_amount,
        }
    }

    pub fn set(&self, member: &mut Member, value: f64) {
        let slot = match self {
            MemberColumn::NoOfShares => &mut member.no_of_shares,
            MemberColumn::AmountOfShares => &mut member.amount_of_shares,
            MemberColumn::Dividend => &mut member.dividend,
            MemberColumn::Hon => &mut member.hon,
            MemberColumn::InvestmentArrears => &mut member.investment_arrears,
            MemberColumn::RiskFundArrears => &mut member.risk_fund_arrears,
            MemberColumn::ArrearsOnShares => &mut member.arrears_on_shares,
            MemberColumn::ArrearsOnLoans => &mut member.arrears_on_loans,
            MemberColumn::PrevYearArrearsBalance => &mut member.prev_year_arrears_balance,
            MemberColumn::Absenteeism => &mut member.absenteeism,
            MemberColumn::ArrearsOnWelfare => &mut member.arrears_on_welfare,
            MemberColumn::LessAdvanced => &mut member.less_advanced,
            MemberColumn::NetPayAmount => &mut member.net_pay_amount,
        };
        *slot = value;
    }
}
