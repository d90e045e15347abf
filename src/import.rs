// import.rs
// Spreadsheet column conventions: header aliases for import, header lists for export.

use chrono::{DateTime, Days, NaiveDate};
use mongodb::bson::oid::ObjectId;
use slug::slugify;

use crate::{
    calc::{self, contribution_total, recalc_loan, recalc_saving},
    models::{
        Contribution, ContributionKind, LEDGER_ROWS, LedgerField, LedgerRow, Loan, MONTHS, Member,
        MemberColumn, Saving,
    },
    xlsx::{Cell, Record, Row, sheet_to_records},
};

const NAME_ALIASES: &[&str] = &["NAME", "Member Name"];
const NO_ALIASES: &[&str] = &["NO", "No."];
const MEMBER_ALIASES: &[&str] = &["MEMBER", "NAME"];
const DATE_ALIASES: &[&str] = &["DATE"];
const AMOUNT_ALIASES: &[&str] = &["AMOUNT"];
const INTEREST_ALIASES: &[&str] = &["INTEREST"];
const PAID_ALIASES: &[&str] = &["PAID"];
const DEADLINE_ALIASES: &[&str] = &["DEADLINE", "DUE DATE"];
const DUE_DATE_ALIASES: &[&str] = &["DUE_DATE", "DUE DATE", "DueDate"];

/// First alias whose cell is present and non-empty.
pub fn pick<'a>(record: &'a Record, aliases: &[&str]) -> Option<&'a Cell> {
    aliases.iter().find_map(|alias| record.get(alias))
}

pub fn pick_text(record: &Record, aliases: &[&str]) -> String {
    pick(record, aliases).map(Cell::as_text).unwrap_or_default()
}

pub fn pick_number(record: &Record, aliases: &[&str]) -> f64 {
    pick(record, aliases).map(Cell::as_number).unwrap_or(0.0)
}

pub fn pick_date(record: &Record, aliases: &[&str]) -> Option<NaiveDate> {
    pick(record, aliases).and_then(parse_date)
}

/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, RFC 3339 timestamps and Excel serial days.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(n) => excel_serial_date(*n),
        Cell::Text(text) => parse_date_text(text),
        _ => None,
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Some(d) = text
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    {
        return Some(d);
    }
    text.parse::<f64>().ok().and_then(excel_serial_date)
}

/// Day 0 of the 1900 date system as Excel counts it (with its leap-year bug).
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

fn is_total_label(name: &str) -> bool {
    matches!(name.trim().to_uppercase().as_str(), "TOTAL" | "SUBTOTAL")
}

/// Registry rows for `period`. Missing or zero `NO` becomes `existing + index + 1`.
pub fn members_from_records(records: &[Record], period: &str, existing: usize) -> Vec<Member> {
    records
        .iter()
        .filter(|r| !pick_text(r, NAME_ALIASES).is_empty())
        .filter(|r| !is_total_label(&pick_text(r, NAME_ALIASES)))
        .enumerate()
        .map(|(i, r)| {
            let no = pick_number(r, NO_ALIASES);
            let mut member = Member {
                no: if no > 0.0 {
                    no as i64
                } else {
                    (existing + i + 1) as i64
                },
                name: pick_text(r, NAME_ALIASES),
                period: period.to_string(),
                ..Member::default()
            };
            for col in MemberColumn::ALL {
                col.set(&mut member, pick_number(r, col.aliases()));
            }
            member
        })
        .collect()
}

/// Finds a member by case-insensitive name, else falls back to the selected one.
fn resolve_member(name: &str, members: &[Member], fallback: ObjectId) -> ObjectId {
    let wanted = name.trim().to_lowercase();
    members
        .iter()
        .find(|m| m.name.trim().to_lowercase() == wanted)
        .and_then(|m| m.id)
        .unwrap_or(fallback)
}

pub fn loans_from_records(
    records: &[Record],
    members: &[Member],
    fallback: ObjectId,
    today: NaiveDate,
) -> Vec<Loan> {
    records
        .iter()
        .filter(|r| !pick_text(r, MEMBER_ALIASES).is_empty())
        .map(|r| {
            let mut loan = Loan {
                id: None,
                member_id: resolve_member(&pick_text(r, MEMBER_ALIASES), members, fallback),
                date: pick_date(r, DATE_ALIASES),
                amount: pick_number(r, AMOUNT_ALIASES),
                interest: pick_number(r, INTEREST_ALIASES),
                paid: pick_number(r, PAID_ALIASES),
                balance: 0.0,
                deadline: pick_date(r, DEADLINE_ALIASES),
            };
            recalc_loan(&mut loan, today);
            loan
        })
        .collect()
}

pub fn savings_from_records(
    records: &[Record],
    members: &[Member],
    fallback: ObjectId,
    today: NaiveDate,
) -> Vec<Saving> {
    records
        .iter()
        .filter(|r| !pick_text(r, MEMBER_ALIASES).is_empty())
        .map(|r| {
            let mut saving = Saving {
                id: None,
                member_id: resolve_member(&pick_text(r, MEMBER_ALIASES), members, fallback),
                date: pick_date(r, DATE_ALIASES),
                due_date: pick_date(r, DUE_DATE_ALIASES),
                amount: pick_number(r, AMOUNT_ALIASES),
                interest: 0.0,
                balance: 0.0,
            };
            recalc_saving(&mut saving, today);
            saving
        })
        .collect()
}

/// Tables read back from a member statement sheet. `None` when the sheet has no such table.
#[derive(Debug, Default)]
pub struct StatementImport {
    pub loans: Option<Vec<Loan>>,
    pub savings: Option<Vec<Saving>>,
}

fn is_header(cell: &Cell, aliases: &[&str]) -> bool {
    let text = cell.as_text();
    aliases.iter().any(|a| text.trim().eq_ignore_ascii_case(a))
}

/// Splits a statement sheet at every `MEMBER` header row. A table with a due
/// date and no `PAID` column holds savings, any other table holds loans. All
/// rows are filed under `member_id`.
pub fn statement_from_rows(
    rows: Vec<Row>,
    member_id: ObjectId,
    today: NaiveDate,
) -> StatementImport {
    let mut tables: Vec<Vec<Row>> = Vec::new();
    for row in rows {
        let starts_table = row.first().is_some_and(|c| is_header(c, &["MEMBER"]));
        if starts_table || tables.is_empty() {
            tables.push(Vec::new());
        }
        if let Some(table) = tables.last_mut() {
            table.push(row);
        }
    }

    let mut out = StatementImport::default();
    for table in tables {
        let Some(header) = table.first() else {
            continue;
        };
        if header.iter().all(Cell::is_empty) {
            continue;
        }
        let savings = !header.iter().any(|c| is_header(c, PAID_ALIASES))
            && header.iter().any(|c| is_header(c, DUE_DATE_ALIASES));
        let records = sheet_to_records(table);
        if savings {
            out.savings
                .get_or_insert_with(Vec::new)
                .extend(savings_from_records(&records, &[], member_id, today));
        } else {
            out.loans
                .get_or_insert_with(Vec::new)
                .extend(loans_from_records(&records, &[], member_id, today));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedContribution {
    pub name: String,
    pub kind: ContributionKind,
    pub months: Vec<f64>,
}

impl ImportedContribution {
    pub fn total(&self) -> f64 {
        contribution_total(&self.months)
    }
}

/// Rows need `NAMES` and a `CATEGORY` of INVEST or RISK; absent months are 0.
pub fn contributions_from_records(records: &[Record]) -> Vec<ImportedContribution> {
    records
        .iter()
        .filter_map(|r| {
            let name = pick_text(r, &["NAMES"]);
            let kind = ContributionKind::parse(&pick_text(r, &["CATEGORY"]))?;
            if name.is_empty() {
                return None;
            }
            Some(ImportedContribution {
                name,
                kind,
                months: MONTHS.iter().map(|m| pick_number(r, &[*m])).collect(),
            })
        })
        .collect()
}

/// Overlays imported rows onto the ledger; only present columns are replaced.
/// Returns the number of rows taken (at most 24).
pub fn merge_ledger_records(records: &[Record], rows: &mut Vec<LedgerRow>) -> usize {
    rows.resize(LEDGER_ROWS, LedgerRow::default());
    let taken = records.len().min(LEDGER_ROWS);
    for (record, row) in records.iter().take(taken).zip(rows.iter_mut()) {
        for field in LedgerField::ALL {
            if let Some(cell) = record.get(&field.header()) {
                row.set(field, cell.as_number());
            }
        }
    }
    taken
}

/// `Jane Wanjiru` -> `jane_wanjiru`.
pub fn file_stem(label: &str) -> String {
    let stem = slugify(label).replace('-', "_");
    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem
    }
}

pub fn members_export_name(title: &str, period: &str) -> String {
    let title: String = title
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}_{}.xlsx", title, calc::period_id(period))
}

fn date_cell(date: Option<NaiveDate>) -> Cell {
    date.map(|d| Cell::Text(d.format("%Y-%m-%d").to_string()))
        .unwrap_or_default()
}

pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

pub fn members_sheet(members: &[Member], period: &str) -> Sheet {
    let mut header = vec!["No.".to_string(), "Name".to_string()];
    header.extend(MemberColumn::ALL.iter().map(|c| c.label().to_string()));
    header.push("PERIOD".to_string());

    let mut rows: Vec<Row> = members
        .iter()
        .map(|m| {
            let mut row = vec![Cell::Number(m.no as f64), Cell::text(m.name.as_str())];
            row.extend(MemberColumn::ALL.iter().map(|c| Cell::Number(c.get(m))));
            row.push(Cell::text(m.period.as_str()));
            row
        })
        .collect();

    let mut total = vec![Cell::text("TOTAL"), Cell::Empty];
    total.extend(calc::member_totals(members).into_iter().map(Cell::Number));
    total.push(Cell::text(period));
    rows.push(total);

    Sheet { header, rows }
}

pub fn loans_sheet(member_name: &str, loans: &[Loan]) -> Sheet {
    Sheet {
        header: ["MEMBER", "DATE", "AMOUNT", "INTEREST", "PAID", "BALANCE", "DEADLINE"]
            .map(String::from)
            .to_vec(),
        rows: loans
            .iter()
            .map(|l| {
                vec![
                    Cell::text(member_name),
                    date_cell(l.date),
                    Cell::Number(l.amount),
                    Cell::Number(l.interest),
                    Cell::Number(l.paid),
                    Cell::Number(l.balance),
                    date_cell(l.deadline),
                ]
            })
            .collect(),
    }
}

pub fn savings_sheet(member_name: &str, savings: &[Saving]) -> Sheet {
    Sheet {
        header: ["MEMBER", "DATE", "DUE_DATE", "AMOUNT", "INTEREST", "BALANCE"]
            .map(String::from)
            .to_vec(),
        rows: savings
            .iter()
            .map(|s| {
                vec![
                    Cell::text(member_name),
                    date_cell(s.date),
                    date_cell(s.due_date),
                    Cell::Number(s.amount),
                    Cell::Number(s.interest),
                    Cell::Number(s.balance),
                ]
            })
            .collect(),
    }
}

/// One INVEST and one RISK row per named member.
pub fn contributions_sheet(rows: &[(String, Contribution)]) -> Sheet {
    let mut header = vec!["NAMES".to_string(), "CATEGORY".to_string()];
    header.extend(MONTHS.iter().map(|m| m.to_string()));
    header.push("TOTAL".to_string());

    Sheet {
        header,
        rows: rows
            .iter()
            .map(|(name, c)| {
                let mut row = vec![Cell::text(name.as_str()), Cell::text(c.kind.as_str())];
                row.extend(calc::normalize_months(&c.months).into_iter().map(Cell::Number));
                row.push(Cell::Number(contribution_total(&c.months)));
                row
            })
            .collect(),
    }
}

pub fn ledger_sheet(rows: &[LedgerRow]) -> Sheet {
    let mut header = vec!["NO".to_string()];
    header.extend(LedgerField::ALL.iter().map(LedgerField::header));

    let mut out: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = vec![Cell::Number((i + 1) as f64)];
            row.extend(LedgerField::ALL.iter().map(|f| Cell::Number(r.get(*f))));
            row
        })
        .collect();

    let mut total = vec![Cell::text("Total")];
    total.extend(calc::ledger_totals(rows).into_iter().map(Cell::Number));
    out.push(total);

    Sheet { header, rows: out }
}
