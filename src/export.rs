//! Turning scraped records into files and terminal output.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::models::{BalanceReading, ScrapeReport, TransactionRecord};

pub const CSV_HEADERS: [&str; 3] = ["Transaction Hash", "Timestamp", "Link"];
pub const BALANCE_HEADER: &str = "Wallet Balance";

/// Shown when a run produced nothing to export.
pub const EMPTY_NOTICE: &str = "No transaction data was found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown format {other:?} (expected csv or json)")),
        }
    }
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Nothing to write; callers show [`EMPTY_NOTICE`] instead.
    Empty,
    Data { rows: usize, bytes: Vec<u8> },
}

/// Render records as CSV, one row per record in aggregate order.
///
/// With `balance`, every row also carries the balance reading.
pub fn export_csv(
    records: &[TransactionRecord],
    balance: Option<&BalanceReading>,
) -> Result<ExportOutcome> {
    if records.is_empty() {
        return Ok(ExportOutcome::Empty);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut headers = CSV_HEADERS.to_vec();
    if balance.is_some() {
        headers.push(BALANCE_HEADER);
    }
    writer.write_record(&headers).context("Failed to write CSV header")?;

    for record in records {
        let mut fields = vec![
            record.hash.as_str(),
            record.timestamp.as_str(),
            record.link.as_str(),
        ];
        if let Some(balance) = balance {
            fields.push(balance.value.as_str());
        }
        writer
            .write_record(&fields)
            .with_context(|| format!("Failed to write CSV row for {}", record.hash))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;

    Ok(ExportOutcome::Data {
        rows: records.len(),
        bytes,
    })
}

/// Render the whole report (balance, stop reason, records) as pretty JSON.
pub fn export_json(report: &ScrapeReport) -> Result<ExportOutcome> {
    if report.records.is_empty() {
        return Ok(ExportOutcome::Empty);
    }
    let bytes = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
    Ok(ExportOutcome::Data {
        rows: report.records.len(),
        bytes,
    })
}

pub fn export_report(
    report: &ScrapeReport,
    format: ExportFormat,
    include_balance: bool,
) -> Result<ExportOutcome> {
    match format {
        ExportFormat::Csv => export_csv(
            &report.records,
            include_balance.then_some(&report.balance),
        ),
        ExportFormat::Json => export_json(report),
    }
}

/// `sui_activity_<first six characters of the address>.<ext>`
pub fn default_file_name(address: &str, format: ExportFormat) -> String {
    let prefix: String = address
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect();
    format!("sui_activity_{prefix}.{}", format.extension())
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Plain-text table of records for the terminal.
///
/// Shows at most `limit` rows (the most recent ones scraped) when given.
pub fn render_table(records: &[TransactionRecord], limit: Option<usize>) -> String {
    const HASH_WIDTH: usize = 24;
    const TIME_WIDTH: usize = 22;

    let skip = limit
        .map(|l| records.len().saturating_sub(l))
        .unwrap_or(0);

    let mut out = format!(
        "{:>4}  {:<HASH_WIDTH$}  {:<TIME_WIDTH$}  {}\n",
        "#", "Hash", "Timestamp", "Link"
    );
    for (i, record) in records.iter().enumerate().skip(skip) {
        out.push_str(&format!(
            "{:>4}  {:<HASH_WIDTH$}  {:<TIME_WIDTH$}  {}\n",
            i + 1,
            shorten(&record.hash, HASH_WIDTH),
            shorten(&record.timestamp, TIME_WIDTH),
            record.link
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_records_are_a_no_op() {
        assert_eq!(export_csv(&[], None).unwrap(), ExportOutcome::Empty);
        let balance = BalanceReading::not_found();
        assert_eq!(export_csv(&[], Some(&balance)).unwrap(), ExportOutcome::Empty);
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let records = vec![TransactionRecord::new(
            "H1",
            "May 1, 2024 10:00 AM",
            "https://suiscan.xyz/mainnet/tx/H1",
        )];
        let ExportOutcome::Data { bytes, rows } = export_csv(&records, None).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(rows, 1);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Transaction Hash,Timestamp,Link\nH1,\"May 1, 2024 10:00 AM\",https://suiscan.xyz/mainnet/tx/H1\n"
        );
    }

    #[test]
    fn csv_balance_column() {
        let records = vec![TransactionRecord::new("H1", "N/A", "https://x/tx/H1")];
        let balance = BalanceReading::not_found();
        let ExportOutcome::Data { bytes, .. } = export_csv(&records, Some(&balance)).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Transaction Hash,Timestamp,Link,Wallet Balance\nH1,N/A,https://x/tx/H1,Not Found\n"
        );
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn file_name_uses_address_prefix() {
        assert_eq!(
            default_file_name("0xa36a0602be0f", ExportFormat::Csv),
            "sui_activity_0xa36a.csv"
        );
        assert_eq!(default_file_name("ab", ExportFormat::Json), "sui_activity_ab.json");
        assert_eq!(default_file_name("../x", ExportFormat::Csv), "sui_activity_x.csv");
    }

    #[test]
    fn table_limits_to_latest_rows() {
        let records: Vec<_> = (1..=5)
            .map(|i| TransactionRecord::new(format!("H{i}"), "N/A", format!("https://x/tx/H{i}")))
            .collect();
        let table = render_table(&records, Some(2));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].trim_start().starts_with("4  H4"));
        assert!(lines[2].trim_start().starts_with("5  H5"));
    }

    #[test]
    fn shorten_long_hashes() {
        assert_eq!(shorten("abcdef", 10), "abcdef");
        assert_eq!(shorten("abcdefghijkl", 8), "abcde...");
    }
}
