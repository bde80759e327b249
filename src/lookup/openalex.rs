use super::{async_trait, LookupError, SearchService, REQUEST_TIMEOUT, USER_AGENT};
use crate::entry::Hit;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const OPENALEX_API_BASE: &str = "https://api.openalex.org";
const DOI_URL_PREFIX: &str = "https://doi.org/";

/// Metadata fallback. Knows titles and DOIs, never Scopus IDs.
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new() -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: OPENALEX_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    title: Option<String>,
    ids: Option<WorkIds>,
}

#[derive(Debug, Deserialize)]
struct WorkIds {
    doi: Option<String>,
}

impl Work {
    fn into_hit(self) -> Hit {
        Hit {
            title: self.title,
            scopus_id: None,
            doi: self
                .ids
                .and_then(|ids| ids.doi)
                .map(|doi| doi.trim_start_matches(DOI_URL_PREFIX).to_string()),
        }
    }
}

fn check_status(status: StatusCode) -> Result<(), LookupError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED => Err(LookupError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited),
        status => Err(LookupError::Status(status.as_u16())),
    }
}

#[async_trait]
impl SearchService for OpenAlexClient {
    async fn search_by_doi(&self, doi: &str) -> Result<Option<Hit>, LookupError> {
        let url = format!("{}/works/{}{}", self.base_url, DOI_URL_PREFIX, doi);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status())?;

        let work: Work = response.json().await.map_err(|e| {
            LookupError::ParseError(format!("Failed to parse OpenAlex response: {}", e))
        })?;

        Ok(Some(work.into_hit()))
    }

    async fn search_by_title(&self, title: &str) -> Result<Option<Hit>, LookupError> {
        let url = format!(
            "{}/works?search={}&per-page=1",
            self.base_url,
            urlencoding::encode(title)
        );

        let response = self.client.get(&url).send().await?;
        check_status(response.status())?;

        let response: SearchResponse = response.json().await.map_err(|e| {
            LookupError::ParseError(format!("Failed to parse OpenAlex response: {}", e))
        })?;

        Ok(response.results.into_iter().next().map(Work::into_hit))
    }

    fn name(&self) -> &'static str {
        "OpenAlex"
    }
}
