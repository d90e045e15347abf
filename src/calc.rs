// calc.rs
// Interest accrual, balances and totals. Everything here is pure; callers pass `today`.

use chrono::{Days, NaiveDate, Utc};

use crate::models::{
    Contribution, ContributionKind, LedgerField, LedgerRow, Loan, MONTHS, Member, MemberColumn,
    Saving,
};

/// Default financial year shown when none has been created yet.
pub const DEFAULT_PERIOD: &str = "2023/2024";

/// Flat penalty applied to overdue unpaid loans.
pub const OVERDUE_LOAN_RATE: f64 = 0.01;
/// Interest earned by a saving once its due date is reached.
pub const MATURED_SAVING_RATE: f64 = 0.10;
/// Loan deadlines count 30-day months.
pub const DAYS_PER_MONTH: u64 = 30;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses operator or spreadsheet text, keeping only digits, `.` and `-`.
pub fn to_number(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// `2024/2025` -> `2024-2025`.
pub fn period_id(label: &str) -> String {
    label.trim().replace('/', "-")
}

/// `2024-2025` -> `2024/2025`.
pub fn period_label(id: &str) -> String {
    id.trim().replace('-', "/")
}

/// Splits `2024/2025` into its two years; a label without `/` repeats itself.
pub fn period_years(label: &str) -> (String, String) {
    match label.split_once('/') {
        Some((a, b)) => (a.trim().to_string(), b.trim().to_string()),
        None => (label.trim().to_string(), label.trim().to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figures {
    pub interest: f64,
    pub balance: f64,
}

/// Loan rule: fully paid loans carry nothing, overdue ones get the flat 1 %,
/// otherwise the entered interest stands.
pub fn loan_figures(
    amount: f64,
    interest: f64,
    paid: f64,
    deadline: Option<NaiveDate>,
    today: NaiveDate,
) -> Figures {
    if paid >= amount {
        return Figures {
            interest: 0.0,
            balance: 0.0,
        };
    }
    let interest = match deadline {
        Some(deadline) if deadline < today => amount * OVERDUE_LOAN_RATE,
        _ => interest,
    };
    Figures {
        interest,
        balance: amount + interest - paid,
    }
}

pub fn recalc_loan(loan: &mut Loan, today: NaiveDate) {
    let figures = loan_figures(loan.amount, loan.interest, loan.paid, loan.deadline, today);
    loan.interest = figures.interest;
    loan.balance = figures.balance;
}

/// Savings rule: 10 % once `today` reaches the due date.
pub fn saving_figures(amount: f64, due_date: Option<NaiveDate>, today: NaiveDate) -> Figures {
    let interest = match due_date {
        Some(due) if today >= due => amount * MATURED_SAVING_RATE,
        _ => 0.0,
    };
    Figures {
        interest,
        balance: amount + interest,
    }
}

pub fn recalc_saving(saving: &mut Saving, today: NaiveDate) {
    let figures = saving_figures(saving.amount, saving.due_date, today);
    saving.interest = figures.interest;
    saving.balance = figures.balance;
}

/// Deadline of a loan created from an approved request.
pub fn approval_deadline(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_add_days(Days::new(u64::from(months) * DAYS_PER_MONTH))
        .unwrap_or(NaiveDate::MAX)
}

/// Column sums of the member registry, in `MemberColumn::ALL` order.
pub fn member_totals(members: &[Member]) -> Vec<f64> {
    MemberColumn::ALL
        .iter()
        .map(|col| members.iter().map(|m| col.get(m)).sum())
        .collect()
}

/// Filters by name substring (case-insensitive) and sorts by `no`, then by
/// `sort_by` ascending when another column is chosen.
pub fn filter_and_sort_members(
    members: Vec<Member>,
    search: &str,
    sort_by: Option<MemberColumn>,
) -> Vec<Member> {
    let needle = search.trim().to_lowercase();
    let mut out: Vec<Member> = members
        .into_iter()
        .filter(|m| needle.is_empty() || m.name.to_lowercase().contains(&needle))
        .collect();
    out.sort_by_key(|m| m.no);
    if let Some(col) = sort_by {
        out.sort_by(|a, b| col.get(a).total_cmp(&col.get(b)));
    }
    out
}

pub fn contribution_total(months: &[f64]) -> f64 {
    months.iter().sum()
}

/// Pads or truncates to the twelve months of the year.
pub fn normalize_months(months: &[f64]) -> Vec<f64> {
    let mut out = months.to_vec();
    out.resize(MONTHS.len(), 0.0);
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridTotals {
    pub months: Vec<f64>,
    pub invest: f64,
    pub risk: f64,
    pub grand: f64,
}

/// Per-month column totals across INVEST and RISK rows, plus the grand total.
pub fn grid_totals(rows: &[Contribution]) -> GridTotals {
    let mut months = vec![0.0; MONTHS.len()];
    let mut invest = 0.0;
    let mut risk = 0.0;
    for row in rows {
        for (slot, value) in months.iter_mut().zip(row.months.iter()) {
            *slot += value;
        }
        let total = contribution_total(&row.months);
        match row.kind {
            ContributionKind::Invest => invest += total,
            ContributionKind::Risk => risk += total,
        }
    }
    GridTotals {
        months,
        invest,
        risk,
        grand: invest + risk,
    }
}

/// Ledger column sums, in `LedgerField::ALL` order.
pub fn ledger_totals(rows: &[LedgerRow]) -> Vec<f64> {
    LedgerField::ALL
        .iter()
        .map(|field| rows.iter().map(|r| r.get(*field)).sum())
        .collect()
}

pub const QUARTERS: [&str; 4] = ["Aug–Oct", "Nov–Jan", "Feb–Apr", "May–Jul"];

#[derive(Debug, Clone, PartialEq)]
pub struct Quarter {
    pub label: &'static str,
    pub loan: f64,
    pub invest: f64,
    pub loan_out: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Analysis {
    pub quarters: Vec<Quarter>,
    pub total_loan: f64,
    pub total_invest: f64,
    pub total_loan_out: f64,
    pub total_expenses: f64,
    pub total_dividends: f64,
}

/// Quarterly view of a ledger: the first four rows are the quarters.
/// Expenses and welfare balances (dividends) sum over every row.
pub fn analyse_ledger(rows: &[LedgerRow]) -> Analysis {
    let quarters: Vec<Quarter> = if rows.len() >= QUARTERS.len() {
        QUARTERS
            .iter()
            .zip(rows.iter())
            .map(|(label, row)| Quarter {
                label,
                loan: row.loan_given_out,
                invest: row.collection_from_shares,
                loan_out: row.loan_given_out,
            })
            .collect()
    } else {
        Vec::new()
    };

    Analysis {
        total_loan: quarters.iter().map(|q| q.loan).sum(),
        total_invest: quarters.iter().map(|q| q.invest).sum(),
        total_loan_out: quarters.iter().map(|q| q.loan_out).sum(),
        total_expenses: rows.iter().map(|r| r.expenses).sum(),
        total_dividends: rows.iter().map(|r| r.welfare_balances).sum(),
        quarters,
    }
}

/// `1234567.5` -> `1,234,567.50`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn to_number_strips_noise() {
        assert_eq!(to_number("KES 1,250.50"), 1250.5);
        assert_eq!(to_number("-300"), -300.0);
        assert_eq!(to_number(""), 0.0);
        assert_eq!(to_number("n/a"), 0.0);
        assert_eq!(to_number("1.2.3"), 0.0);
    }

    #[test]
    fn period_id_and_label() {
        assert_eq!(period_id("2024/2025"), "2024-2025");
        assert_eq!(period_label("2024-2025"), "2024/2025");
        assert_eq!(
            period_years("2023/2024"),
            ("2023".to_string(), "2024".to_string())
        );
    }

    #[test]
    fn fully_paid_loan_has_no_interest_or_balance() {
        let today = d(2025, 3, 1);
        let f = loan_figures(1000.0, 50.0, 1000.0, Some(d(2024, 1, 1)), today);
        assert_eq!(f, Figures { interest: 0.0, balance: 0.0 });
        let f = loan_figures(1000.0, 50.0, 1200.0, None, today);
        assert_eq!(f.balance, 0.0);
    }

    #[test]
    fn overdue_loan_gets_one_percent() {
        let today = d(2025, 3, 1);
        let f = loan_figures(5000.0, 0.0, 1000.0, Some(d(2025, 2, 28)), today);
        assert_eq!(f.interest, 50.0);
        assert_eq!(f.balance, 4050.0);
    }

    #[test]
    fn loan_due_today_keeps_entered_interest() {
        let today = d(2025, 3, 1);
        let f = loan_figures(5000.0, 120.0, 0.0, Some(today), today);
        assert_eq!(f.interest, 120.0);
        assert_eq!(f.balance, 5120.0);
    }

    #[test]
    fn recalc_loan_updates_in_place() {
        let mut loan = Loan {
            id: None,
            member_id: ObjectId::new(),
            date: Some(d(2024, 1, 1)),
            amount: 2000.0,
            interest: 0.0,
            paid: 500.0,
            balance: 0.0,
            deadline: Some(d(2024, 6, 1)),
        };
        recalc_loan(&mut loan, d(2025, 1, 1));
        assert_eq!(loan.interest, 20.0);
        assert_eq!(loan.balance, 1520.0);
    }

    #[test]
    fn saving_without_due_date_earns_nothing() {
        let f = saving_figures(800.0, None, d(2030, 1, 1));
        assert_eq!(f.interest, 0.0);
        assert_eq!(f.balance, 800.0);
    }

    #[test]
    fn saving_matures_on_due_date() {
        let due = d(2025, 6, 30);
        assert_eq!(saving_figures(1000.0, Some(due), d(2025, 6, 29)).interest, 0.0);
        let f = saving_figures(1000.0, Some(due), due);
        assert_eq!(f.interest, 100.0);
        assert_eq!(f.balance, 1100.0);
    }

    #[test]
    fn approval_deadline_uses_thirty_day_months() {
        assert_eq!(approval_deadline(d(2025, 1, 1), 3), d(2025, 4, 1));
        assert_eq!(approval_deadline(d(2025, 1, 31), 1), d(2025, 3, 2));
    }

    fn member(no: i64, name: &str, shares: f64, dividend: f64) -> Member {
        Member {
            no,
            name: name.to_string(),
            no_of_shares: shares,
            dividend,
            ..Member::default()
        }
    }

    #[test]
    fn members_filter_sort_and_total() {
        let members = vec![
            member(3, "Wanjiru", 10.0, 5.0),
            member(1, "Kamau", 30.0, 1.0),
            member(2, "Wambui", 20.0, 9.0),
        ];
        let sorted = filter_and_sort_members(members.clone(), "", None);
        let nos: Vec<i64> = sorted.iter().map(|m| m.no).collect();
        assert_eq!(nos, vec![1, 2, 3]);

        let filtered = filter_and_sort_members(members.clone(), "wa", Some(MemberColumn::Dividend));
        let names: Vec<&str> = filtered.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Wanjiru", "Wambui"]);

        let totals = member_totals(&members);
        assert_eq!(totals.len(), MemberColumn::ALL.len());
        assert_eq!(totals[0], 60.0);
        assert_eq!(totals[2], 15.0);
    }

    #[test]
    fn grid_totals_split_by_kind() {
        let mut invest = vec![0.0; 12];
        invest[0] = 100.0;
        invest[11] = 50.0;
        let mut risk = vec![0.0; 12];
        risk[0] = 10.0;
        let rows = vec![
            Contribution {
                id: None,
                member_id: ObjectId::new(),
                period: "2024/2025".into(),
                kind: ContributionKind::Invest,
                total: contribution_total(&invest),
                months: invest,
            },
            Contribution {
                id: None,
                member_id: ObjectId::new(),
                period: "2024/2025".into(),
                kind: ContributionKind::Risk,
                total: contribution_total(&risk),
                months: risk,
            },
        ];
        let totals = grid_totals(&rows);
        assert_eq!(totals.months[0], 110.0);
        assert_eq!(totals.months[11], 50.0);
        assert_eq!(totals.invest, 150.0);
        assert_eq!(totals.risk, 10.0);
        assert_eq!(totals.grand, 160.0);
        assert_eq!(normalize_months(&[1.0, 2.0]).len(), 12);
    }

    #[test]
    fn analysis_needs_four_rows() {
        let mut rows = vec![LedgerRow::default(); 3];
        rows[0].expenses = 40.0;
        let a = analyse_ledger(&rows);
        assert!(a.quarters.is_empty());
        assert_eq!(a.total_expenses, 40.0);

        let mut rows = vec![LedgerRow::default(); 24];
        for (i, row) in rows.iter_mut().enumerate().take(4) {
            row.loan_given_out = 100.0 * (i as f64 + 1.0);
            row.collection_from_shares = 10.0;
        }
        rows[10].welfare_balances = 7.0;
        let a = analyse_ledger(&rows);
        assert_eq!(a.quarters.len(), 4);
        assert_eq!(a.quarters[1].label, "Nov–Jan");
        assert_eq!(a.total_loan, 1000.0);
        assert_eq!(a.total_invest, 40.0);
        assert_eq!(a.total_dividends, 7.0);
        assert_eq!(ledger_totals(&rows)[2], 1000.0);
    }

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-1500.0), "-1,500.00");
    }
}
