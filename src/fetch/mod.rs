//! HTTP client for the remote records API.
//!
//! Logs in for a bearer token, then reads entity listings, entity details
//! and outcome pages. Pagination and pacing live in [`collect`].

pub mod collect;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::models::{Entity, OutcomeEvent};

pub use collect::{collect_all, Collected, Collector};

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Login failed: {0}")]
    Auth(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Entity id and name from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Entity detail as the API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDetail {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub sp_attack: i64,
    pub sp_defense: i64,
    pub speed: i64,
    pub generation: i64,
    #[serde(default)]
    pub legendary: bool,
    #[serde(default)]
    pub types: Vec<String>,
}

impl From<EntityDetail> for Entity {
    fn from(detail: EntityDetail) -> Self {
        let types: Vec<&str> = detail
            .types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        Entity {
            id: detail.id,
            name: detail.name.trim().to_string(),
            hp: detail.hp,
            attack: detail.attack,
            defense: detail.defense,
            sp_attack: detail.sp_attack,
            sp_defense: detail.sp_defense,
            speed: detail.speed,
            generation: detail.generation,
            legendary: detail.legendary,
            entity_type: (!types.is_empty()).then(|| types.join("/")),
        }
    }
}

/// One outcome as the API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeWire {
    #[serde(alias = "first_pokemon")]
    pub first_id: i64,
    #[serde(alias = "second_pokemon")]
    pub second_id: i64,
    #[serde(alias = "winner")]
    pub winner_id: i64,
}

impl From<OutcomeWire> for OutcomeEvent {
    fn from(wire: OutcomeWire) -> Self {
        OutcomeEvent::new(wire.first_id, wire.second_id, wire.winner_id)
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

/// Read the record list stored under `key` in a listing page.
///
/// A page without the key is treated as an empty page.
pub fn parse_listing<T: for<'de> Deserialize<'de>>(
    body: &serde_json::Value,
    key: &str,
) -> Result<Vec<T>, FetchError> {
    match body.get(key) {
        Some(records) => Ok(serde_json::from_value(records.clone())?),
        None => Ok(Vec::new()),
    }
}

/// Paged access to the remote records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// One entity listing page, 1-based.
    async fn entity_page(&self, page: u32) -> Result<Vec<EntityRef>, FetchError>;

    /// Full attributes of one entity.
    async fn entity_detail(&self, id: i64) -> Result<Entity, FetchError>;

    /// One outcome page, 1-based.
    async fn outcome_page(&self, page: u32) -> Result<Vec<OutcomeEvent>, FetchError>;
}

/// Authenticated client for the records API.
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client. Call [`ApiClient::login`] before reading records.
    pub fn new(config: ApiConfig) -> Result<Self, FetchError> {
        Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("arena-analytics/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;

        let base = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            config,
            base,
            token: None,
        })
    }

    /// Absolute URL for an API path.
    pub fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        Url::parse(&url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// Exchange the configured credentials for a bearer token.
    pub async fn login(&mut self) -> Result<(), FetchError> {
        let url = self.endpoint(&self.config.login_path)?;
        info!("Logging in to {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let response = check_status(&url, response)?;

        let body: LoginResponse = response.json().await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::Auth("no access_token in login response".to_string()))?;

        self.token = Some(token);
        info!("Login succeeded");
        Ok(())
    }

    /// Report from the health endpoint.
    pub async fn health(&self) -> Result<serde_json::Value, FetchError> {
        let url = self.endpoint(&self.config.health_path)?;
        self.get_json(url).await
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, FetchError> {
        let token = self.token.as_deref().ok_or(FetchError::NotAuthenticated)?;
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).bearer_auth(token).send().await?;
        let response = check_status(&url, response)?;
        Ok(response.json().await?)
    }

    fn page_url(&self, path: &str, page: u32, per_page: u32) -> Result<Url, FetchError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        Ok(url)
    }
}

#[async_trait]
impl RecordSource for ApiClient {
    async fn entity_page(&self, page: u32) -> Result<Vec<EntityRef>, FetchError> {
        let url = self.page_url(
            &self.config.entities_path,
            page,
            self.config.entities_page_size,
        )?;
        let body = self.get_json(url).await?;
        let refs: Vec<EntityRef> = parse_listing(&body, &self.config.entities_key)?;
        Ok(refs
            .into_iter()
            .map(|r| EntityRef {
                id: r.id,
                name: r.name.trim().to_string(),
            })
            .collect())
    }

    async fn entity_detail(&self, id: i64) -> Result<Entity, FetchError> {
        let url = self.endpoint(&format!(
            "{}/{}",
            self.config.entities_path.trim_end_matches('/'),
            id
        ))?;
        let body = self.get_json(url).await?;
        let detail: EntityDetail = serde_json::from_value(body)?;
        Ok(detail.into())
    }

    async fn outcome_page(&self, page: u32) -> Result<Vec<OutcomeEvent>, FetchError> {
        let url = self.page_url(
            &self.config.outcomes_path,
            page,
            self.config.outcomes_page_size,
        )?;
        let body = self.get_json(url).await?;
        let wire: Vec<OutcomeWire> = parse_listing(&body, &self.config.outcomes_key)?;
        Ok(wire.into_iter().map(OutcomeEvent::from).collect())
    }
}

fn check_status(url: &Url, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        return Err(FetchError::RateLimited {
            host: url.host_str().unwrap_or("unknown").to_string(),
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://api.example.com/v2/");

        assert_eq!(
            api.endpoint("/login").unwrap().as_str(),
            "https://api.example.com/v2/login"
        );
        assert_eq!(
            api.page_url("/combats", 3, 100).unwrap().as_str(),
            "https://api.example.com/v2/combats?page=3&per_page=100"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new(ApiConfig {
            base_url: "::nope".to_string(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_requests_need_a_token() {
        let api = client("http://localhost:9");
        assert!(matches!(
            api.entity_page(1).await,
            Err(FetchError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_parse_listing() {
        let body = json!({
            "pokemons": [{"id": 1, "name": "Bulbasaur "}, {"id": 4, "name": "Charmander"}],
            "page": 1
        });

        let refs: Vec<EntityRef> = parse_listing(&body, "pokemons").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].id, 4);

        let missing: Vec<EntityRef> = parse_listing(&body, "combats").unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_outcome_wire_aliases() {
        let body = json!({"combats": [{"first_pokemon": 1, "second_pokemon": 4, "winner": 4}]});

        let wire: Vec<OutcomeWire> = parse_listing(&body, "combats").unwrap();
        let outcome = OutcomeEvent::from(wire[0].clone());

        assert_eq!(outcome, OutcomeEvent::new(1, 4, 4));
    }

    #[test]
    fn test_entity_detail_joins_types() {
        let detail: EntityDetail = serde_json::from_value(json!({
            "id": 1,
            "name": " Bulbasaur ",
            "hp": 45, "attack": 49, "defense": 49,
            "sp_attack": 65, "sp_defense": 65, "speed": 45,
            "generation": 1, "legendary": false,
            "types": ["Grass", "Poison"]
        }))
        .unwrap();

        let entity = Entity::from(detail);
        assert_eq!(entity.name, "Bulbasaur");
        assert_eq!(entity.entity_type.as_deref(), Some("Grass/Poison"));
    }

    #[test]
    fn test_entity_detail_without_types() {
        let detail: EntityDetail = serde_json::from_value(json!({
            "id": 132, "name": "Ditto",
            "hp": 48, "attack": 48, "defense": 48,
            "sp_attack": 48, "sp_defense": 48, "speed": 48,
            "generation": 1
        }))
        .unwrap();

        let entity = Entity::from(detail);
        assert_eq!(entity.entity_type, None);
        assert!(!entity.legendary);
    }
}
