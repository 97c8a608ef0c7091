//! Remote document service: gist REST endpoints.

use super::SyncConfig;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Host serving full gist file contents.
const RAW_CONTENT_HOST: &str = "gist.githubusercontent.com";

/// Account behind an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub login: String,
}

/// One file of a gist.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GistFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub raw_url: Option<String>,
    /// Content was cut short; the full text is at `raw_url`.
    #[serde(default)]
    pub truncated: bool,
    /// Absent in list responses.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gist {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub files: HashMap<String, GistFile>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

/// Body of a create or update request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistWrite {
    pub description: String,
    /// Only sent on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    pub files: BTreeMap<String, FileContent>,
}

impl GistWrite {
    pub fn create(config: &SyncConfig, content: String) -> Self {
        Self {
            public: Some(config.public),
            ..Self::update(config, content)
        }
    }

    pub fn update(config: &SyncConfig, content: String) -> Self {
        let mut files = BTreeMap::new();
        files.insert(config.filename.clone(), FileContent { content });
        Self {
            description: config.description.clone(),
            public: None,
            files,
        }
    }

    /// Content of the single file in the body.
    pub fn content(&self) -> Option<&str> {
        self.files.values().next().map(|f| f.content.as_str())
    }
}

/// Operations the sync client needs from the remote service.
///
/// Implementations map transport failures onto [`SyncError`]; in
/// particular a missing document must surface as [`SyncError::NotFound`].
pub trait GistApi {
    /// Resolve the account owning `token`.
    fn authenticated_user(&self, token: &str) -> SyncResult<RemoteUser>;

    /// Gists of the account, without file contents.
    fn list_gists(&self, token: &str) -> SyncResult<Vec<Gist>>;

    fn get_gist(&self, token: &str, id: &str) -> SyncResult<Gist>;

    fn create_gist(&self, token: &str, body: &GistWrite) -> SyncResult<Gist>;

    fn update_gist(&self, token: &str, id: &str, body: &GistWrite) -> SyncResult<Gist>;

    /// Full file text from a raw-content URL.
    fn fetch_raw(&self, token: &str, url: &str) -> SyncResult<String>;
}

/// [`GistApi`] over HTTPS with a blocking client.
pub struct HttpGistApi {
    base_url: String,
    client: Client,
}

impl HttpGistApi {
    /// Build a client honoring the configured base URL, timeout and user agent.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// Whether the token may travel to `target`: same origin as the API,
    /// or the gist raw-content host.
    fn sends_credentials(&self, target: &Url) -> bool {
        let same_origin = Url::parse(&self.base_url)
            .map(|base| base.origin() == target.origin())
            .unwrap_or(false);
        same_origin || target.host_str() == Some(RAW_CONTENT_HOST)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = check_status(request.send()?)?;
        Ok(response.json()?)
    }
}

impl GistApi for HttpGistApi {
    fn authenticated_user(&self, token: &str) -> SyncResult<RemoteUser> {
        let url = format!("{}/user", self.base_url);
        self.send_json(self.request(Method::GET, &url, token))
    }

    fn list_gists(&self, token: &str) -> SyncResult<Vec<Gist>> {
        let url = format!("{}/gists?per_page=100", self.base_url);
        self.send_json(self.request(Method::GET, &url, token))
    }

    fn get_gist(&self, token: &str, id: &str) -> SyncResult<Gist> {
        let url = format!("{}/gists/{}", self.base_url, id);
        self.send_json(self.request(Method::GET, &url, token))
    }

    fn create_gist(&self, token: &str, body: &GistWrite) -> SyncResult<Gist> {
        let url = format!("{}/gists", self.base_url);
        self.send_json(self.request(Method::POST, &url, token).json(body))
    }

    fn update_gist(&self, token: &str, id: &str, body: &GistWrite) -> SyncResult<Gist> {
        let url = format!("{}/gists/{}", self.base_url, id);
        self.send_json(self.request(Method::PATCH, &url, token).json(body))
    }

    fn fetch_raw(&self, token: &str, url: &str) -> SyncResult<String> {
        let target = Url::parse(url)
            .map_err(|e| SyncError::InvalidPayload(format!("raw URL {url}: {e}")))?;
        let request = if self.sends_credentials(&target) {
            self.request(Method::GET, url, token)
        } else {
            debug!(
                host = target.host_str().unwrap_or_default(),
                "fetching raw content without token"
            );
            self.client.get(target)
        };
        let response = check_status(request.send()?)?;
        Ok(response.text()?)
    }
}

fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let message = response.text().unwrap_or_default();
    Err(classify_status(status.as_u16(), exhausted, message))
}

/// Map a non-success status onto the sync error taxonomy.
pub(crate) fn classify_status(status: u16, rate_limit_exhausted: bool, message: String) -> SyncError {
    match status {
        401 => SyncError::InvalidCredential,
        404 => SyncError::NotFound,
        429 => SyncError::RateLimited,
        403 if rate_limit_exhausted => SyncError::RateLimited,
        _ => SyncError::Http { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, false, String::new()),
            SyncError::InvalidCredential
        ));
        assert!(matches!(classify_status(404, false, String::new()), SyncError::NotFound));
        assert!(matches!(classify_status(429, false, String::new()), SyncError::RateLimited));
        assert!(matches!(classify_status(403, true, String::new()), SyncError::RateLimited));
        assert!(matches!(
            classify_status(403, false, "forbidden".into()),
            SyncError::Http { status: 403, .. }
        ));
        assert!(matches!(
            classify_status(502, false, String::new()),
            SyncError::Http { status: 502, .. }
        ));
    }

    #[test]
    fn test_token_only_sent_to_trusted_hosts() {
        let api = HttpGistApi::new(&SyncConfig::default()).unwrap();
        let trusted = |url: &str| api.sends_credentials(&Url::parse(url).unwrap());

        assert!(trusted("https://api.github.com/gists/abc"));
        assert!(trusted("https://gist.githubusercontent.com/trader/abc/raw/data.json"));
        assert!(!trusted("http://api.github.com/gists/abc"));
        assert!(!trusted("https://api.github.com:8443/gists/abc"));
        assert!(!trusted("https://gist.githubusercontent.com.evil.test/raw"));
        assert!(!trusted("https://attacker.example/raw/abc"));
    }

    #[test]
    fn test_write_bodies() {
        let config = SyncConfig::default();

        let create = serde_json::to_value(GistWrite::create(&config, "{}".into())).unwrap();
        assert_eq!(create["public"], json!(false));
        assert_eq!(create["description"], json!(config.description));
        assert_eq!(create["files"][&config.filename]["content"], json!("{}"));

        let update = serde_json::to_value(GistWrite::update(&config, "{}".into())).unwrap();
        assert!(update.get("public").is_none());
    }

    #[test]
    fn test_parse_gist_response() {
        let raw = json!({
            "id": "aa5a315d61ae9438b18d",
            "description": "Trading Goal Tracker Data",
            "updated_at": "2024-05-01T10:00:00Z",
            "files": {
                "trading-tracker-data.json": {
                    "filename": "trading-tracker-data.json",
                    "raw_url": "https://gist.githubusercontent.com/raw/abc",
                    "truncated": true,
                    "content": "{\"challenges\":"
                }
            }
        });

        let gist: Gist = serde_json::from_value(raw).unwrap();
        let file = &gist.files["trading-tracker-data.json"];
        assert!(file.truncated);
        assert_eq!(
            file.raw_url.as_deref(),
            Some("https://gist.githubusercontent.com/raw/abc")
        );
    }
}
