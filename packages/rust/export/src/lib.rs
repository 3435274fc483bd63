//! Batch export of final firm reports.
//!
//! Reads every `final_report.json` in the store and writes a single CSV or
//! JSON file. CSV fields follow RFC 4180 quoting.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, instrument, warn};

use vcdossier_shared::{DossierError, FirmReport, Result};
use vcdossier_storage::FirmStore;

/// Separator for list-valued report fields in a CSV cell.
const LIST_SEPARATOR: &str = "; ";

/// Column headers, in report order.
pub const CSV_HEADERS: [&str; 16] = [
    "Firm Name",
    "Fund Names",
    "Fund Sizes",
    "GPs",
    "GP Backgrounds",
    "Team Size",
    "Recent Funding Activity",
    "Fund Start Date",
    "Firm Start Date",
    "Portfolio Companies",
    "Past Performance",
    "Industry Focus",
    "Deal Velocity",
    "Average Cheque Size",
    "Cheque Size % of Round",
    "Primary Co-investors",
];

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Output format for [`export_reports`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(DossierError::validation(format!(
                "unknown export format '{other}' (expected csv or json)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Flatten a report into one cell per header.
pub fn report_to_row(report: &FirmReport) -> [String; 16] {
    let gp_names: Vec<&str> = report
        .gps
        .iter()
        .map(|gp| gp.name.trim())
        .filter(|name| !name.is_empty())
        .collect();

    let gp_backgrounds = if report.gp_backgrounds.trim().is_empty() {
        report.gp_backgrounds_from_gps()
    } else {
        report.gp_backgrounds.clone()
    };

    [
        report.firm_name.clone(),
        report.fund_names.join(LIST_SEPARATOR),
        report.fund_sizes.join(LIST_SEPARATOR),
        gp_names.join(LIST_SEPARATOR),
        gp_backgrounds,
        report.team_size.clone(),
        report.recent_funding_activity.clone(),
        report.fund_start_date.clone(),
        report.firm_start_date.clone(),
        report.portfolio_companies.join(LIST_SEPARATOR),
        report.past_performance.clone(),
        report.industry_focus.clone(),
        report.deal_velocity.clone(),
        report.avg_cheque_size.clone(),
        report.cheque_size_pct_round.clone(),
        report.primary_coinvestors.join(LIST_SEPARATOR),
    ]
}

/// Quote a CSV field when it contains a separator, quote or line break.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_csv(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render reports as CSV with a header row. Lines end with `\r\n`.
pub fn reports_to_csv(reports: &[FirmReport]) -> String {
    let mut csv = csv_line(&CSV_HEADERS);
    csv.push_str("\r\n");
    for report in reports {
        csv.push_str(&csv_line(&report_to_row(report)));
        csv.push_str("\r\n");
    }
    csv
}

/// Render reports as a pretty-printed JSON array.
pub fn reports_to_json(reports: &[FirmReport]) -> Result<String> {
    serde_json::to_string_pretty(reports)
        .map_err(|e| DossierError::parse(format!("failed to serialize reports: {e}")))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Collect every firm's final report, ordered by slug.
pub async fn collect_reports(store: &FirmStore) -> Result<Vec<FirmReport>> {
    let mut reports = Vec::new();
    for slug in store.list_firms().await? {
        match store.firm_by_slug(&slug).load_report().await {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => info!(firm = %slug, "no final report yet, skipping"),
            Err(e) => warn!(firm = %slug, error = %e, "unreadable final report, skipping"),
        }
    }
    Ok(reports)
}

/// Write every stored report to `out`. Returns the number exported.
#[instrument(skip(store), fields(data_dir = %store.data_dir().display()))]
pub async fn export_reports(store: &FirmStore, format: ExportFormat, out: &Path) -> Result<usize> {
    let reports = collect_reports(store).await?;

    let content = match format {
        ExportFormat::Csv => reports_to_csv(&reports),
        ExportFormat::Json => reports_to_json(&reports)?,
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DossierError::io(parent, e))?;
    }
    tokio::fs::write(out, content)
        .await
        .map_err(|e| DossierError::io(out, e))?;

    info!(reports = reports.len(), %format, path = %out.display(), "reports exported");
    Ok(reports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcdossier_shared::GpEntry;

    /// Minimal RFC 4180 reader for checking the writer.
    fn parse_csv(input: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => in_quotes = false,
                    _ => field.push(c),
                }
                continue;
            }
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
        if !field.is_empty() || !row.is_empty() {
            row.push(field);
            rows.push(row);
        }
        rows
    }

    fn sample_report() -> FirmReport {
        let mut report = FirmReport::empty("Acme Ventures, LLP");
        report.fund_names = vec!["Acme Fund I".into(), "Acme \"Growth\" Fund".into()];
        report.fund_sizes = vec!["INR 250 Cr".into()];
        report.gps = vec![
            GpEntry {
                name: "Asha Rao".into(),
                background: "Ex-Sequoia,\nIIM-A".into(),
            },
            GpEntry {
                name: "Vikram Shah".into(),
                background: String::new(),
            },
        ];
        report.portfolio_companies = vec!["Zeta".into(), "Kappa".into()];
        report
    }

    #[test]
    fn escaping_rules() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn row_flattens_lists_and_gps() {
        let row = report_to_row(&sample_report());
        assert_eq!(row[1], "Acme Fund I; Acme \"Growth\" Fund");
        assert_eq!(row[3], "Asha Rao; Vikram Shah");
        assert_eq!(row[4], "Asha Rao: Ex-Sequoia,\nIIM-A | Vikram Shah");
        assert_eq!(row[5], "Not available");
        assert_eq!(row[9], "Zeta; Kappa");
    }

    #[test]
    fn explicit_gp_backgrounds_win() {
        let mut report = sample_report();
        report.gp_backgrounds = "Two operators turned investors".into();
        assert_eq!(report_to_row(&report)[4], "Two operators turned investors");
    }

    #[test]
    fn csv_reads_back_unchanged() {
        let report = sample_report();
        let csv = reports_to_csv(std::slice::from_ref(&report));
        let rows = parse_csv(&csv);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], CSV_HEADERS.map(String::from).to_vec());
        assert_eq!(rows[1], report_to_row(&report).to_vec());
    }

    #[test]
    fn json_reads_back_unchanged() {
        let reports = vec![sample_report(), FirmReport::empty("Beta Capital")];
        let json = reports_to_json(&reports).unwrap();
        let parsed: Vec<FirmReport> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reports);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn exports_stored_reports_sorted_by_slug() {
        let dir = std::env::temp_dir().join(format!("vcd-export-test-{}", uuid::Uuid::now_v7()));
        let store = FirmStore::new(&dir);

        store
            .firm("Zeta Partners")
            .save_report(&FirmReport::empty("Zeta Partners"))
            .await
            .unwrap();
        store
            .firm("Acme Ventures")
            .save_report(&FirmReport::empty("Acme Ventures"))
            .await
            .unwrap();
        store.firm("Unfinished Fund").create().await.unwrap();

        let out = dir.join("exports/reports.csv");
        let count = export_reports(&store, ExportFormat::Csv, &out).await.unwrap();
        assert_eq!(count, 2);

        let rows = parse_csv(&std::fs::read_to_string(&out).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "Acme Ventures");
        assert_eq!(rows[2][0], "Zeta Partners");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
