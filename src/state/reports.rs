use anyhow::Result;
use mongodb::bson::{DateTime, doc};
use tracing::info;

use crate::calc::{Analysis, format_amount, period_id};
use crate::models::Report;

use super::AppState;

pub fn report_id(period: &str) -> String {
    format!("treasurer_report_{}", period_id(period))
}

pub async fn load_report(state: &AppState, period: &str) -> Result<Option<Report>> {
    Ok(state
        .reports
        .find_one(doc! { "_id": report_id(period) })
        .await?)
}

pub async fn save_report(state: &AppState, period: &str, content: &str) -> Result<()> {
    let id = report_id(period);
    state
        .reports
        .replace_one(
            doc! { "_id": &id },
            Report {
                id: id.clone(),
                year: period.to_string(),
                content: content.to_string(),
                last_updated: DateTime::now(),
            },
        )
        .upsert(true)
        .await?;
    info!(period, bytes = content.len(), "report saved");
    Ok(())
}

/// Starting content for a period without a saved report: title, the quarterly
/// table from the ledger analysis and the signature block.
pub fn template_content(sacco: &str, period: &str, analysis: &Analysis) -> String {
    let mut html = format!(
        "<h1>{} Treasurer's Report for the Year {}</h1>\n<p></p>\n",
        escape_html(sacco),
        escape_html(period)
    );
    html.push_str(
        "<table border=\"1\" cellspacing=\"0\" cellpadding=\"4\">\n<thead><tr>\
         <th>No</th><th>Quarter</th><th>Loan Contributions</th>\
         <th>Investment Contributions</th><th>Total Contributions</th>\
         <th>Loan Given Out</th></tr></thead>\n<tbody>\n",
    );
    for (i, q) in analysis.quarters.iter().enumerate() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            i + 1,
            q.label,
            format_amount(q.loan),
            format_amount(q.invest),
            format_amount(q.loan + q.invest),
            format_amount(q.loan_out),
        ));
    }
    html.push_str(&format!(
        "<tr><td></td><td><strong>Total</strong></td><td><strong>{}</strong></td>\
         <td><strong>{}</strong></td><td><strong>{}</strong></td><td><strong>{}</strong></td></tr>\n",
        format_amount(analysis.total_loan),
        format_amount(analysis.total_invest),
        format_amount(analysis.total_loan + analysis.total_invest),
        format_amount(analysis.total_loan_out),
    ));
    html.push_str("</tbody>\n</table>\n<p></p>\n<p>Prepared by: ____________________</p>\n<p>Position: Treasurer</p>\n");
    html
}

/// Word opens HTML saved with a `.doc` extension.
pub fn word_document(title: &str, content: &str) -> String {
    format!(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
         xmlns:w=\"urn:schemas-microsoft-com:office:word\" \
         xmlns=\"http://www.w3.org/TR/REC-html40\">\
         <head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape_html(title),
        content
    )
}

pub fn report_file_name(sacco: &str, period: &str) -> String {
    format!("{}_Report_{}.doc", sacco.trim().replace(' ', "_"), period_id(period))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Periods that have a saved report, newest first.
pub async fn list_report_periods(state: &AppState) -> Result<Vec<String>> {
    let mut years: Vec<String> = state
        .reports
        .distinct("year", doc! {})
        .await?
        .into_iter()
        .filter_map(|b| b.as_str().map(String::from))
        .collect();
    years.sort();
    years.reverse();
    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::calc::analyse_ledger;
    use crate::models::LedgerRow;

    #[test]
    fn report_ids_use_period_ids() {
        assert_eq!(report_id("2024/2025"), "treasurer_report_2024-2025");
        assert_eq!(report_file_name("MITEWA", "2024/2025"), "MITEWA_Report_2024-2025.doc");
    }

    #[test]
    fn template_carries_the_quarterly_table() {
        let mut rows = vec![LedgerRow::default(); 24];
        rows[0].loan_given_out = 1000.0;
        rows[0].collection_from_shares = 500.0;
        let html = template_content("MITEWA", "2024/2025", &analyse_ledger(&rows));
        assert!(html.contains("MITEWA Treasurer's Report for the Year 2024/2025"));
        assert!(html.contains("<td>1</td><td>Aug–Oct</td><td>1,000.00</td><td>500.00</td><td>1,500.00</td>"));
        assert!(html.contains("Position: Treasurer"));
    }

    #[test]
    fn word_wrapper_escapes_title_only() {
        let doc = word_document("A & B", "<p>x</p>");
        assert!(doc.contains("<title>A &amp; B</title>"));
        assert!(doc.contains("<body><p>x</p></body>"));
    }
}
