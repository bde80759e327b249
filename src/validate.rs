use crate::entry::{normalize_key, SearchMode};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Minimum number of characters for a searchable title
pub const MIN_TITLE_LENGTH: usize = 10;

static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Z0-9]+$").expect("DOI pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty value")]
    Empty,
    #[error("Invalid DOI format: {0}")]
    Format(String),
    #[error("Title too short (min {min} chars, got {len})")]
    TooShort { min: usize, len: usize },
}

/// An input line rejected by validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidItem {
    /// 1-based position in the input
    pub line: usize,
    pub value: String,
    pub reason: ValidationError,
}

/// A later occurrence of an already seen identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateItem {
    pub line: usize,
    pub value: String,
    pub first_seen: usize,
}

/// Result of validating a whole input batch
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid_items: Vec<InvalidItem>,
    pub duplicate_items: Vec<DuplicateItem>,
    /// Valid, deduplicated items in input order
    pub unique_items: Vec<String>,
}

impl ValidationReport {
    pub fn invalid(&self) -> usize {
        self.invalid_items.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicate_items.len()
    }

    pub fn unique(&self) -> usize {
        self.unique_items.len()
    }

    /// Whether a validation report file is worth writing
    pub fn has_issues(&self) -> bool {
        !self.invalid_items.is_empty() || !self.duplicate_items.is_empty()
    }
}

pub fn validate_doi(doi: &str) -> Result<(), ValidationError> {
    let doi = doi.trim();
    if doi.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !DOI_PATTERN.is_match(doi) {
        return Err(ValidationError::Format(doi.to_string()));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = title.chars().count();
    if len < MIN_TITLE_LENGTH {
        return Err(ValidationError::TooShort {
            min: MIN_TITLE_LENGTH,
            len,
        });
    }
    Ok(())
}

/// Split items into first occurrences and duplicates of earlier ones.
///
/// Positions in the returned duplicates are 1-based indexes into `items`.
pub fn detect_duplicates(items: &[String]) -> (Vec<String>, Vec<DuplicateItem>) {
    dedupe_numbered(items.iter().enumerate().map(|(i, item)| (i + 1, item.as_str())))
}

fn dedupe_numbered<'a>(
    items: impl IntoIterator<Item = (usize, &'a str)>,
) -> (Vec<String>, Vec<DuplicateItem>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::new();
    let mut duplicates = Vec::new();

    for (line, item) in items {
        let key = normalize_key(item);
        match seen.get(&key) {
            Some(&first_seen) => duplicates.push(DuplicateItem {
                line,
                value: item.to_string(),
                first_seen,
            }),
            None => {
                seen.insert(key, line);
                unique.push(item.to_string());
            }
        }
    }

    (unique, duplicates)
}

/// Validate every item for the given mode, then deduplicate the valid ones.
///
/// Line numbers in the report always refer to positions in `items`, so an
/// invalid line in between does not shift the reported duplicate positions.
pub fn validate_batch(items: &[String], mode: SearchMode) -> ValidationReport {
    let validate: fn(&str) -> Result<(), ValidationError> = match mode {
        SearchMode::Doi => validate_doi,
        SearchMode::Title => validate_title,
    };

    let mut valid = Vec::new();
    let mut invalid_items = Vec::new();

    for (i, item) in items.iter().enumerate() {
        match validate(item) {
            Ok(()) => valid.push((i + 1, item.as_str())),
            Err(reason) => invalid_items.push(InvalidItem {
                line: i + 1,
                value: item.clone(),
                reason,
            }),
        }
    }

    let valid_count = valid.len();
    let (unique_items, duplicate_items) = dedupe_numbered(valid);

    ValidationReport {
        total: items.len(),
        valid: valid_count,
        invalid_items,
        duplicate_items,
        unique_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_doi() {
        assert!(validate_doi("10.1016/j.softx.2019.100263").is_ok());
        assert!(validate_doi("10.1016/J.SOFTX.2019.100263").is_ok());
        assert!(matches!(
            validate_doi("not-a-doi"),
            Err(ValidationError::Format(_))
        ));
        assert_eq!(validate_doi(""), Err(ValidationError::Empty));
        assert_eq!(validate_doi("   "), Err(ValidationError::Empty));
        // registrant code needs at least four digits
        assert!(validate_doi("10.1/abc").is_err());
    }

    #[test]
    fn test_validate_title_boundary() {
        assert_eq!(
            validate_title("123456789"),
            Err(ValidationError::TooShort { min: 10, len: 9 })
        );
        assert!(validate_title("1234567890").is_ok());
        assert_eq!(validate_title(""), Err(ValidationError::Empty));
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        assert!(validate_title("ééééééééé").is_err());
        assert!(validate_title("éééééééééé").is_ok());
    }

    #[test]
    fn test_detect_duplicates() {
        let (unique, duplicates) = detect_duplicates(&strings(&["10.1/A", "10.1/a", "10.1/B"]));

        assert_eq!(unique, strings(&["10.1/A", "10.1/B"]));
        assert_eq!(
            duplicates,
            vec![DuplicateItem {
                line: 2,
                value: "10.1/a".to_string(),
                first_seen: 1,
            }]
        );
    }

    #[test]
    fn batch_reports_invalid_and_duplicate_lines() {
        let items = strings(&["10.1000/X", "bad", "10.1000/x"]);
        let report = validate_batch(&items, SearchMode::Doi);

        assert_eq!(report.total, 3);
        assert_eq!(report.valid, 2);
        assert_eq!(report.invalid(), 1);
        assert_eq!(report.invalid_items[0].line, 2);
        assert_eq!(report.unique(), 1);
        assert_eq!(report.duplicates(), 1);
        assert_eq!(report.duplicate_items[0].line, 3);
        assert_eq!(report.duplicate_items[0].first_seen, 1);
        assert_eq!(report.unique_items, strings(&["10.1000/X"]));
        assert!(report.has_issues());
    }

    #[test]
    fn invalid_items_are_never_duplicates() {
        let items = strings(&["short", "short", "A sufficiently long title"]);
        let report = validate_batch(&items, SearchMode::Title);

        assert_eq!(report.invalid(), 2);
        assert_eq!(report.duplicates(), 0);
        assert_eq!(report.unique_items, strings(&["A sufficiently long title"]));
    }
}
