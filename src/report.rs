use crate::entry::{ResultRecord, SearchMode};
use crate::stats::RunStats;
use crate::validate::ValidationReport;
use chrono::Utc;
use colored::Colorize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

const RULE_WIDTH: usize = 60;
const VALUE_PREVIEW: usize = 100;

/// Render the human readable validation report
pub fn render_validation_report(report: &ValidationReport, mode: SearchMode) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&format!("{rule}\nVALIDATION REPORT\n{rule}\n"));
    out.push_str(&format!("Search mode: {}\n", mode));
    out.push_str(&format!("Timestamp: {}\n\n", Utc::now().to_rfc3339()));

    out.push_str(&format!("Total items: {}\n", report.total));
    out.push_str(&format!("Valid items: {}\n", report.valid));
    out.push_str(&format!("Invalid items: {}\n", report.invalid()));
    out.push_str(&format!("Unique items: {}\n", report.unique()));
    out.push_str(&format!("Duplicates: {}\n\n", report.duplicates()));

    if !report.invalid_items.is_empty() {
        out.push_str(&format!("INVALID ITEMS:\n{thin}\n"));
        for item in &report.invalid_items {
            out.push_str(&format!("Line {}: {}\n", item.line, item.reason));
            out.push_str(&format!("  -> {}\n\n", preview(&item.value)));
        }
    }

    if !report.duplicate_items.is_empty() {
        out.push_str(&format!("\nDUPLICATE ITEMS:\n{thin}\n"));
        for item in &report.duplicate_items {
            out.push_str(&format!(
                "Line {}: Duplicate of line {}\n",
                item.line, item.first_seen
            ));
            out.push_str(&format!("  -> {}\n\n", preview(&item.value)));
        }
    }

    out
}

fn preview(value: &str) -> String {
    value.chars().take(VALUE_PREVIEW).collect()
}

pub fn write_validation_report(
    path: &Path,
    report: &ValidationReport,
    mode: SearchMode,
) -> Result<(), ReportError> {
    fs::write(path, render_validation_report(report, mode))?;
    Ok(())
}

/// Write the results table; the columns depend on the search mode
pub fn write_results(
    path: &Path,
    mode: SearchMode,
    results: &[ResultRecord],
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    let cell = |value: &Option<String>| value.clone().unwrap_or_default();

    match mode {
        SearchMode::Doi => {
            writer.write_record(["doi", "title", "scopus_id"])?;
            for r in results {
                writer.write_record([r.query.clone(), cell(&r.title), cell(&r.scopus_id)])?;
            }
        }
        SearchMode::Title => {
            writer.write_record(["search_title", "found_title", "scopus_id", "doi"])?;
            for r in results {
                writer.write_record([
                    r.query.clone(),
                    cell(&r.title),
                    cell(&r.scopus_id),
                    cell(&r.doi),
                ])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Totals printed at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: SearchMode,
    pub total: usize,
    pub found: usize,
    pub requests: usize,
    pub cache_hits: usize,
    pub errors: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(mode: SearchMode, results: &[ResultRecord], stats: &RunStats, interrupted: bool) -> Self {
        Self {
            mode,
            total: results.len(),
            found: results.iter().filter(|r| r.is_found()).count(),
            requests: stats.requests(),
            cache_hits: stats.cache_hits(),
            errors: stats.errors(),
            interrupted,
        }
    }

    pub fn not_found(&self) -> usize {
        self.total - self.found
    }

    /// Percentage of items with a Scopus ID, `None` for an empty run
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.found as f64 / self.total as f64 * 100.0)
        }
    }

    pub fn print(&self) {
        let rule = "=".repeat(RULE_WIDTH);
        println!();
        println!("{}", rule);
        println!("{}", "SUMMARY".bold());
        println!("{}", rule);
        if self.interrupted {
            println!("{}", "Run was interrupted, results are partial".yellow());
        }
        println!("Search mode: {}", self.mode);
        println!(
            "Total: {} | Found: {} | Not found: {}",
            self.total,
            self.found.to_string().green(),
            self.not_found().to_string().red()
        );
        if let Some(rate) = self.success_rate() {
            println!("Success rate: {:.1}%", rate);
        }
        println!("API requests: {}", self.requests);
        println!("Cache hits: {}", self.cache_hits);
        println!("Errors: {}", self.errors);
        println!("{}", rule);
    }
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_batch;
    use tempfile::tempdir;

    fn record(query: &str, scopus_id: Option<&str>) -> ResultRecord {
        ResultRecord {
            query: query.to_string(),
            title: Some("A, \"quoted\" title".to_string()),
            scopus_id: scopus_id.map(str::to_string),
            doi: Some("10.1000/found".to_string()),
        }
    }

    #[test]
    fn doi_mode_csv_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_results(
            &path,
            SearchMode::Doi,
            &[record("10.1000/a", Some("2-s2.0-1")), record("10.1000/b", None)],
        )
        .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["doi", "title", "scopus_id"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "A, \"quoted\" title");
        assert_eq!(&rows[0][2], "2-s2.0-1");
        assert_eq!(&rows[1][2], "");
    }

    #[test]
    fn title_mode_csv_includes_doi() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_results(&path, SearchMode::Title, &[record("Some long title", None)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            vec!["search_title", "found_title", "scopus_id", "doi"]
        );
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[3], "10.1000/found");
    }

    #[test]
    fn validation_report_lists_lines() {
        let items: Vec<String> = ["10.1000/X", "bad", "10.1000/x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = validate_batch(&items, SearchMode::Doi);

        let text = render_validation_report(&report, SearchMode::Doi);

        assert!(text.contains("Search mode: DOI"));
        assert!(text.contains("Invalid items: 1"));
        assert!(text.contains("Line 2: Invalid DOI format: bad"));
        assert!(text.contains("Line 3: Duplicate of line 1"));
    }

    #[test]
    fn long_values_cut_to_plain_prefix() {
        let long = format!("10.1000/{}", "a".repeat(150));
        let items = vec![long.clone(), long.clone()];
        let report = validate_batch(&items, SearchMode::Doi);

        let text = render_validation_report(&report, SearchMode::Doi);

        let prefix: String = long.chars().take(VALUE_PREVIEW).collect();
        assert!(text.contains(&format!("  -> {}\n", prefix)));
        assert!(!text.contains("..."));
    }

    #[test]
    fn summary_rates() {
        let stats = RunStats::new();
        let results = vec![record("a", Some("1")), record("b", None), record("c", None), record("d", Some("2"))];

        let summary = RunSummary::new(SearchMode::Doi, &results, &stats, false);

        assert_eq!(summary.found, 2);
        assert_eq!(summary.not_found(), 2);
        assert_eq!(summary.success_rate(), Some(50.0));
        assert_eq!(RunSummary::new(SearchMode::Doi, &[], &stats, false).success_rate(), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
