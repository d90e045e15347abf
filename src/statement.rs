// statement.rs
// Member statement (loans + savings) as a spreadsheet and as a PDF compiled by the typst CLI.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use rand::{Rng, distr::Alphanumeric};
use tokio::{fs, process::Command};
use tracing::warn;

use crate::calc::{format_amount, format_date};
use crate::import::{loans_sheet, savings_sheet};
use crate::models::{Loan, Member, Saving};
use crate::xlsx::{self, Cell, Row};

pub struct Statement<'a> {
    pub sacco: &'a str,
    pub member: &'a Member,
    pub loans: &'a [Loan],
    pub savings: &'a [Saving],
}

impl Statement<'_> {
    pub fn loan_balance(&self) -> f64 {
        self.loans.iter().map(|l| l.balance).sum()
    }

    pub fn savings_balance(&self) -> f64 {
        self.savings.iter().map(|s| s.balance).sum()
    }

    /// Loans table, a blank line, then the savings table on the same sheet.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, xlsx::XlsxError> {
        let loans = loans_sheet(&self.member.name, self.loans);
        let savings = savings_sheet(&self.member.name, self.savings);
        let mut rows: Vec<Row> = loans.rows;
        rows.push(Vec::new());
        rows.push(savings.header.iter().map(|h| Cell::text(h.as_str())).collect());
        rows.extend(savings.rows);
        xlsx::write_workbook("Statement", &loans.header, &rows)
    }

    pub fn typst_source(&self) -> String {
        let mut src = String::new();
        src.push_str("#set page(paper: \"a4\", margin: 2cm)\n#set text(size: 10pt)\n\n");
        src.push_str(&format!(
            "= {} member statement\n\n*{}* (No. {}, period {})\n\n",
            escape(self.sacco),
            escape(&self.member.name),
            self.member.no,
            escape(&self.member.period),
        ));

        src.push_str("== Loans\n\n");
        let mut cells: Vec<String> = Vec::new();
        for loan in self.loans {
            cells.extend([
                format_date(loan.date),
                format_amount(loan.amount),
                format_amount(loan.interest),
                format_amount(loan.paid),
                format_amount(loan.balance),
                format_date(loan.deadline),
            ]);
        }
        src.push_str(&table(
            &["Date", "Amount", "Interest", "Paid", "Balance", "Deadline"],
            &cells,
        ));
        src.push_str(&format!(
            "\nOutstanding balance: *{}*\n\n",
            format_amount(self.loan_balance())
        ));

        src.push_str("== Savings\n\n");
        cells.clear();
        for saving in self.savings {
            cells.extend([
                format_date(saving.date),
                format_date(saving.due_date),
                format_amount(saving.amount),
                format_amount(saving.interest),
                format_amount(saving.balance),
            ]);
        }
        src.push_str(&table(
            &["Date", "Due date", "Amount", "Interest", "Balance"],
            &cells,
        ));
        src.push_str(&format!(
            "\nSavings balance: *{}*\n",
            format_amount(self.savings_balance())
        ));
        src
    }
}

fn table(header: &[&str], cells: &[String]) -> String {
    let mut out = format!("#table(\n  columns: {},\n", header.len());
    for h in header {
        out.push_str(&format!("  [*{}*],\n", escape(h)));
    }
    for cell in cells {
        out.push_str(&format!("  [{}],\n", escape(cell)));
    }
    out.push_str(")\n");
    out
}

/// Escapes typst markup characters inside content blocks.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '#' | '[' | ']' | '*' | '_' | '$' | '@' | '<' | '>' | '`' | '=' | '-' | '+' | '/' | '~'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Runs `typst compile` in a scratch directory and returns the PDF bytes.
pub async fn compile_pdf(typst_bin: &str, source: &str) -> Result<Vec<u8>> {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    let tmp_dir = std::env::temp_dir().join(format!("statement-{suffix}"));
    fs::create_dir(&tmp_dir)
        .await
        .context("failed to create scratch directory")?;

    let result = run_typst(typst_bin, &tmp_dir, source).await;
    if let Err(err) = fs::remove_dir_all(&tmp_dir).await {
        warn!(error = %err, dir = %tmp_dir.display(), "failed to clean scratch directory");
    }
    result
}

async fn run_typst(typst_bin: &str, dir: &std::path::Path, source: &str) -> Result<Vec<u8>> {
    let input = dir.join("statement.typ");
    let output = dir.join("statement.pdf");
    fs::write(&input, source).await?;

    let run = Command::new(typst_bin)
        .arg("compile")
        .arg(&input)
        .arg(&output)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to run `{typst_bin}`; install typst or set TYPST_BIN"))?;

    if !run.status.success() {
        let stderr = String::from_utf8_lossy(&run.stderr);
        bail!("typst failed: {}", stderr.trim());
    }
    Ok(fs::read(&output).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn markup_is_escaped() {
        assert_eq!(escape("MR. #1 [x]"), "MR. \\#1 \\[x\\]");
        assert_eq!(escape("2024/2025"), "2024\\/2025");
    }

    #[test]
    fn source_lists_loans_and_savings() {
        let member = Member {
            no: 4,
            name: "MRS. NYORO".into(),
            period: "2024/2025".into(),
            ..Member::default()
        };
        let id = ObjectId::new();
        let loans = vec![Loan {
            id: None,
            member_id: id,
            date: NaiveDate::from_ymd_opt(2024, 9, 1),
            amount: 5000.0,
            interest: 50.0,
            paid: 1000.0,
            balance: 4050.0,
            deadline: None,
        }];
        let statement = Statement {
            sacco: "MITEWA",
            member: &member,
            loans: &loans,
            savings: &[],
        };
        let src = statement.typst_source();
        assert!(src.contains("MRS. NYORO"));
        assert!(src.contains("[4,050.00]"));
        assert!(src.contains("Outstanding balance: *4,050.00*"));
        assert_eq!(statement.savings_balance(), 0.0);
    }
}
