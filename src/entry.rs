use serde::{Deserialize, Serialize};

/// Which identifier the input file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Doi,
    Title,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Doi => write!(f, "DOI"),
            SearchMode::Title => write!(f, "TITLE"),
        }
    }
}

/// Normalize an identifier for duplicate detection and cache keys (trim, lowercase)
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Where a resolved record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Scopus,
    OpenAlex,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Scopus => write!(f, "Scopus"),
            Provenance::OpenAlex => write!(f, "OpenAlex"),
        }
    }
}

/// A single match returned by a search service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub title: Option<String>,
    pub scopus_id: Option<String>,
    pub doi: Option<String>,
}

/// Outcome for one processed input item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The identifier as it appeared in the input
    pub query: String,
    /// Title reported by the service that answered
    pub title: Option<String>,
    pub scopus_id: Option<String>,
    /// Only filled in title mode
    pub doi: Option<String>,
}

impl ResultRecord {
    pub fn not_found(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            title: None,
            scopus_id: None,
            doi: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.scopus_id.is_some()
    }
}
