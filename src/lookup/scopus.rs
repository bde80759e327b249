use super::{async_trait, LookupError, SearchService, REQUEST_TIMEOUT, USER_AGENT};
use crate::entry::Hit;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const SCOPUS_SEARCH_API: &str = "https://api.elsevier.com/content/search/scopus";

/// DOI known to be indexed, used to check a key
pub const TEST_DOI: &str = "10.1016/j.softx.2019.100263";

pub struct ScopusClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ScopusClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: SCOPUS_SEARCH_API.to_string(),
        })
    }

    /// Point the client at another search endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: &str, extra: &str) -> Result<Option<Hit>, LookupError> {
        let url = format!(
            "{}?query={}&apiKey={}&httpAccept=application%2Fjson{}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key),
            extra
        );

        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(LookupError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(LookupError::RateLimited),
            status => return Err(LookupError::Status(status.as_u16())),
        }

        let response: ScopusResponse = response.json().await.map_err(|e| {
            LookupError::ParseError(format!("Failed to parse Scopus response: {}", e))
        })?;

        Ok(response
            .search_results
            .and_then(|r| r.entry.into_iter().next())
            .and_then(ScopusEntry::into_hit))
    }

    /// Look up the test DOI and classify the answer
    pub async fn verify_key(&self) -> KeyStatus {
        match self.search_by_doi(TEST_DOI).await {
            Ok(Some(hit)) => KeyStatus::Valid(hit),
            Ok(None) => KeyStatus::NoResults,
            Err(LookupError::Unauthorized) => KeyStatus::Invalid,
            Err(LookupError::RateLimited) => KeyStatus::RateLimited,
            Err(e) => KeyStatus::Failed(e.to_string()),
        }
    }
}

/// Result of checking an API key against the test DOI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Valid(Hit),
    NoResults,
    Invalid,
    RateLimited,
    Failed(String),
}

impl KeyStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, KeyStatus::Valid(_))
    }

    pub fn message(&self) -> String {
        match self {
            KeyStatus::Valid(_) => "API key is valid and working".to_string(),
            KeyStatus::NoResults => "API key works but test query returned no results".to_string(),
            KeyStatus::Invalid => "API key is invalid or unauthorized".to_string(),
            KeyStatus::RateLimited => "API key is valid but rate limited".to_string(),
            KeyStatus::Failed(reason) => format!("API key test failed: {}", reason),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results")]
    search_results: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    entry: Vec<ScopusEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    eid: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    /// Present instead of the record fields when the result set is empty
    error: Option<String>,
}

impl ScopusEntry {
    fn into_hit(self) -> Option<Hit> {
        if self.error.is_some() {
            return None;
        }
        Some(Hit {
            title: self.title,
            scopus_id: self.eid,
            doi: self.doi,
        })
    }
}

#[async_trait]
impl SearchService for ScopusClient {
    async fn search_by_doi(&self, doi: &str) -> Result<Option<Hit>, LookupError> {
        self.search(&format!("DOI({})", doi), "").await
    }

    async fn search_by_title(&self, title: &str) -> Result<Option<Hit>, LookupError> {
        self.search(&format!("TITLE({})", title), "&count=1").await
    }

    fn name(&self) -> &'static str {
        "Scopus"
    }
}
