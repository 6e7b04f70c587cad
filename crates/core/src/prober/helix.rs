//! Twitch Helix API client.
//!
//! Authenticates with the client-credentials grant. The bearer token is
//! shared by every caller; a refresh simply overwrites it, so concurrent
//! refreshes are harmless.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::broadcaster::BroadcasterName;
use crate::config::TwitchConfig;
use crate::metrics;

use super::types::{LiveSet, LiveStream, StreamMetadata};
use super::{LivenessProber, ProbeError};

/// Helix API client.
pub struct HelixClient {
    client: Client,
    config: TwitchConfig,
    access_token: RwLock<String>,
}

impl HelixClient {
    /// Create a new client. No request is made until the first call.
    pub fn new(config: TwitchConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            access_token: RwLock::new(String::new()),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), endpoint)
    }

    fn token_url(&self) -> String {
        format!(
            "{}?client_id={}&client_secret={}&grant_type=client_credentials",
            self.config.token_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.client_secret)
        )
    }

    async fn bearer(&self) -> Result<String, ProbeError> {
        {
            let token = self.access_token.read().await;
            if !token.is_empty() {
                return Ok(token.clone());
            }
        }
        self.refresh_credentials().await?;
        Ok(self.access_token.read().await.clone())
    }

    /// Authenticated GET on a Helix endpoint.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProbeError> {
        let token = self.bearer().await?;
        let url = self.api_url(endpoint);

        let response = self
            .client
            .get(&url)
            .header("Client-ID", &self.config.client_id)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProbeError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ProbeError::NotFound(endpoint.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbeError::Unavailable(format!(
                "{} returned {}: {}",
                endpoint,
                status.as_u16(),
                body
            )));
        }

        response.json().await.map_err(|e| {
            ProbeError::Unavailable(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl LivenessProber for HelixClient {
    fn name(&self) -> &str {
        "helix"
    }

    async fn resolve_category_id(&self, category: &str) -> Result<String, ProbeError> {
        debug!(category, "Resolving category id");

        let page: HelixPage<HelixGame> = self
            .get_json("games", &[("name", category.to_string())])
            .await?;

        page.data
            .into_iter()
            .next()
            .map(|g| g.id)
            .ok_or_else(|| ProbeError::NotFound(format!("category {}", category)))
    }

    async fn list_live(&self, category_id: &str, language: &str) -> Result<LiveSet, ProbeError> {
        let mut streams = Vec::new();
        let mut cursor: Option<String> = None;

        for page_idx in 0..self.config.max_pages {
            let mut query = vec![
                ("game_id", category_id.to_string()),
                ("language", language.to_string()),
                ("first", self.config.page_size.to_string()),
            ];
            if let Some(after) = cursor.take() {
                query.push(("after", after));
            }

            let page: HelixPage<HelixStream> = self.get_json("streams", &query).await?;
            debug!(page = page_idx, streams = page.data.len(), "Fetched live listing page");

            let exhausted = page.data.is_empty();
            for stream in page.data {
                match BroadcasterName::new(&stream.user_login) {
                    Ok(name) => streams.push(LiveStream {
                        name,
                        viewer_count: stream.viewer_count,
                    }),
                    Err(e) => warn!("Ignoring stream with unusable login: {}", e),
                }
            }

            cursor = page.pagination.and_then(|p| p.cursor);
            if exhausted || cursor.is_none() {
                break;
            }
        }

        if streams.is_empty() {
            return Err(ProbeError::Offline);
        }
        Ok(LiveSet::new(streams))
    }

    async fn check_one(&self, name: &BroadcasterName) -> Result<StreamMetadata, ProbeError> {
        let page: HelixPage<HelixStream> = self
            .get_json("streams", &[("user_login", name.to_string())])
            .await?;

        let stream = page.data.into_iter().next().ok_or(ProbeError::Offline)?;
        Ok(StreamMetadata {
            name: name.clone(),
            title: stream.title,
            viewer_count: stream.viewer_count,
            category: stream.game_name.filter(|g| !g.is_empty()),
            started_at: stream.started_at,
        })
    }

    async fn refresh_credentials(&self) -> Result<(), ProbeError> {
        let response = self.client.post(self.token_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbeError::Unavailable(format!(
                "token exchange returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProbeError::Unavailable(format!("Failed to parse token response: {}", e))
        })?;

        *self.access_token.write().await = token.access_token;
        metrics::CREDENTIAL_REFRESHES.inc();
        info!(expires_in = ?token.expires_in, "Access token refreshed");
        Ok(())
    }
}

// Helix API response types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<HelixPagination>,
}

#[derive(Debug, Deserialize)]
struct HelixPagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixGame {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_login: String,
    #[serde(default)]
    game_name: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    started_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[derive(Default)]
    struct MockHelix {
        token_requests: AtomicUsize,
        reject_first: AtomicUsize,
    }

    async fn token(State(mock): State<Arc<MockHelix>>) -> Json<Value> {
        let n = mock.token_requests.fetch_add(1, Ordering::SeqCst);
        Json(json!({ "access_token": format!("token-{}", n), "expires_in": 3600 }))
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("client-id").map(|v| v == "cid").unwrap_or(false)
            && headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("Bearer token-"))
    }

    async fn games(
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        let data = if q.get("name").map(String::as_str) == Some("Chess") {
            json!([{ "id": "743", "name": "Chess" }])
        } else {
            json!([])
        };
        (StatusCode::OK, Json(json!({ "data": data })))
    }

    async fn streams(
        State(mock): State<Arc<MockHelix>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if mock.reject_first.load(Ordering::SeqCst) > 0 {
            mock.reject_first.fetch_sub(1, Ordering::SeqCst);
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }

        if let Some(login) = q.get("user_login") {
            let data = match login.as_str() {
                "alice" => json!([{
                    "user_login": "alice",
                    "game_name": "Chess",
                    "title": "Speedruns: any%",
                    "viewer_count": 120,
                    "started_at": "2024-01-01T10:00:00Z"
                }]),
                "broken" => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                _ => json!([]),
            };
            return (StatusCode::OK, Json(json!({ "data": data })));
        }

        match (q.get("game_id").map(String::as_str), q.get("after")) {
            (Some("743"), None) => (
                StatusCode::OK,
                Json(json!({
                    "data": [
                        { "user_login": "alice", "title": "a", "viewer_count": 120 },
                        { "user_login": "Bob", "title": "b", "viewer_count": 5 }
                    ],
                    "pagination": { "cursor": "page2" }
                })),
            ),
            (Some("743"), Some(cursor)) if cursor == "page2" => (
                StatusCode::OK,
                Json(json!({
                    "data": [{ "user_login": "carol", "title": "c", "viewer_count": 1 }],
                    "pagination": {}
                })),
            ),
            _ => (StatusCode::OK, Json(json!({ "data": [], "pagination": {} }))),
        }
    }

    async fn spawn_mock(mock: Arc<MockHelix>) -> String {
        let app = Router::new()
            .route("/oauth2/token", post(token))
            .route("/helix/games", get(games))
            .route("/helix/streams", get(streams))
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base: &str, max_pages: u32) -> HelixClient {
        HelixClient::new(TwitchConfig {
            client_id: "cid".to_string(),
            client_secret: "secret & more".to_string(),
            api_url: format!("{}/helix", base),
            token_url: format!("{}/oauth2/token", base),
            timeout_secs: 5,
            page_size: 2,
            max_pages,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_category_id() {
        let mock = Arc::new(MockHelix::default());
        let base = spawn_mock(Arc::clone(&mock)).await;
        let client = client_for(&base, 1);

        assert_eq!(client.resolve_category_id("Chess").await.unwrap(), "743");
        let err = client.resolve_category_id("Nope").await.unwrap_err();
        assert!(matches!(err, ProbeError::NotFound(_)));
        // Token fetched lazily, once.
        assert_eq!(mock.token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_live_single_page() {
        let base = spawn_mock(Arc::new(MockHelix::default())).await;
        let client = client_for(&base, 1);

        let live = client.list_live("743", "en").await.unwrap();
        let names: Vec<_> = live.names().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(live.viewer_counts(), vec![120, 5]);
    }

    #[tokio::test]
    async fn test_list_live_follows_cursor() {
        let base = spawn_mock(Arc::new(MockHelix::default())).await;
        let client = client_for(&base, 3);

        let live = client.list_live("743", "en").await.unwrap();
        assert_eq!(live.len(), 3);
        assert!(live.contains(&BroadcasterName::new("carol").unwrap()));
    }

    #[tokio::test]
    async fn test_list_live_empty_is_offline() {
        let base = spawn_mock(Arc::new(MockHelix::default())).await;
        let client = client_for(&base, 1);

        let err = client.list_live("999", "en").await.unwrap_err();
        assert!(matches!(err, ProbeError::Offline));
    }

    #[tokio::test]
    async fn test_check_one_outcomes() {
        let base = spawn_mock(Arc::new(MockHelix::default())).await;
        let client = client_for(&base, 1);

        let meta = client
            .check_one(&BroadcasterName::new("alice").unwrap())
            .await
            .unwrap();
        assert_eq!(meta.title, "Speedruns: any%");
        assert_eq!(meta.viewer_count, 120);
        assert_eq!(meta.category.as_deref(), Some("Chess"));

        let err = client
            .check_one(&BroadcasterName::new("dave").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Offline));

        let err = client
            .check_one(&BroadcasterName::new("broken").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unauthorized_then_refresh() {
        let mock = Arc::new(MockHelix::default());
        mock.reject_first.store(1, Ordering::SeqCst);
        let base = spawn_mock(Arc::clone(&mock)).await;
        let client = client_for(&base, 1);

        let err = client.list_live("743", "en").await.unwrap_err();
        assert!(matches!(err, ProbeError::Unauthorized));

        client.refresh_credentials().await.unwrap();
        assert_eq!(mock.token_requests.load(Ordering::SeqCst), 2);
        assert!(client.list_live("743", "en").await.is_ok());
    }

    #[test]
    fn test_token_url_encodes_credentials() {
        let client = client_for("http://localhost:1", 1);
        assert_eq!(
            client.token_url(),
            "http://localhost:1/oauth2/token?client_id=cid&client_secret=secret%20%26%20more&grant_type=client_credentials"
        );
    }
}
