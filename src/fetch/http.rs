//! Graph API adapter over HTTP

use super::{EdgeList, FetchError, GraphFetcher};
use crate::codec::{self, RawDocument};
use crate::config::GraphApiConfig;
use crate::graph::EntityId;
use crate::Result;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Graph API client implementing [`GraphFetcher`]
///
/// `GET {base}/{id}` for nodes and `GET {base}/{id}/friends` for edges,
/// following `paging.next` links up to the configured page limit.
pub struct HttpGraphFetcher {
    client: Client,
    config: GraphApiConfig,
    base_url: String,
    access_token: Option<String>,
}

impl HttpGraphFetcher {
    /// Create a new fetcher
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: GraphApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("graphcache/0.1"),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let access_token = config.resolve_access_token();

        Ok(Self {
            client,
            config,
            base_url,
            access_token,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn node_url(&self, id: &EntityId) -> String {
        format!("{}/{}", self.base_url, id)
    }

    pub fn edges_url(&self, id: &EntityId) -> String {
        format!("{}/{}/friends", self.base_url, id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token {
            Some(ref token) => request.query(&[("access_token", token.as_str())]),
            None => request,
        }
    }

    async fn get_text(&self, request: RequestBuilder, what: &str) -> std::result::Result<String, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            // A body cut off mid-read is a failed fetch, never an empty document
            return Ok(response.text().await?);
        }
        let body = response.text().await.unwrap_or_default();
        check_status(status, what, body)
    }
}

/// Map an HTTP status to the response body or a [`FetchError`]
fn check_status(status: StatusCode, what: &str, body: String) -> std::result::Result<String, FetchError> {
    match status {
        StatusCode::OK => Ok(body),
        StatusCode::UNAUTHORIZED => Err(FetchError::Auth(format!(
            "Graph API rejected the access token for {}",
            what
        ))),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound(what.to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        status => Err(FetchError::Api(format!("HTTP {}: {}", status, body))),
    }
}

/// Split one page of an edge-list response into its entries and next-page link
pub fn parse_edge_page(page: &Value) -> std::result::Result<(Vec<Value>, Option<String>), FetchError> {
    let data = page
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::InvalidResponse("edge list has no data array".to_string()))?;

    let next = page
        .get("paging")
        .and_then(|paging| paging.get("next"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(String::from);

    Ok((data.clone(), next))
}

#[async_trait]
impl GraphFetcher for HttpGraphFetcher {
    async fn fetch_node(&self, id: &EntityId) -> std::result::Result<RawDocument, FetchError> {
        debug!(id = %id, "Fetching graph node");

        let request = self.authorized(self.client.get(self.node_url(id)));
        let body = self.get_text(request, &format!("node {}", id)).await?;
        Ok(RawDocument::new(body))
    }

    async fn fetch_edges(&self, id: &EntityId) -> std::result::Result<EdgeList, FetchError> {
        debug!(id = %id, "Fetching graph edges");

        let what = format!("edges of {}", id);
        let mut peers = Vec::new();
        let mut request = self.authorized(self.client.get(self.edges_url(id)));
        let mut pages = 0;
        let mut complete = true;

        loop {
            let body = self.get_text(request, &what).await?;
            let page = codec::try_decode(&body)
                .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
            let (entries, next) = parse_edge_page(&page)?;
            peers.extend(entries.iter().map(RawDocument::from_value));
            pages += 1;

            match next {
                Some(url) if pages < self.config.max_edge_pages => {
                    // `next` links already carry the access token
                    request = self.client.get(url);
                }
                Some(_) => {
                    warn!(id = %id, pages, "Edge list truncated at page limit");
                    complete = false;
                    break;
                }
                None => break,
            }
        }

        debug!(id = %id, peers = peers.len(), pages, complete, "Fetched graph edges");
        Ok(EdgeList { peers, complete })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config() -> GraphApiConfig {
        GraphApiConfig {
            base_url: "https://graph.example.com/".to_string(),
            access_token: None,
            access_token_env: "GRAPHCACHE_TEST_UNSET_TOKEN_VAR".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fetcher_creation() {
        let fetcher = HttpGraphFetcher::new(test_config()).expect("Failed to create fetcher");
        assert!(!fetcher.is_authenticated());
        assert!(fetcher.with_token("abc").is_authenticated());
    }

    #[test]
    fn test_urls() {
        let fetcher = HttpGraphFetcher::new(test_config()).expect("Failed to create fetcher");
        let id = EntityId::new("4");
        assert_eq!(fetcher.node_url(&id), "https://graph.example.com/4");
        assert_eq!(fetcher.edges_url(&id), "https://graph.example.com/4/friends");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(check_status(StatusCode::OK, "node 4", "{}".to_string()).unwrap(), "{}");
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, "node 4", String::new()),
            Err(FetchError::Auth(_))
        ));
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "node 4", String::new()),
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS, "node 4", String::new()),
            Err(FetchError::RateLimited)
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "node 4", "upstream".to_string()),
            Err(FetchError::Api(msg)) if msg.contains("upstream")
        ));
    }

    #[test]
    fn test_parse_edge_page() {
        let page = json!({
            "data": [{"id": "5", "name": "Bob"}, {"id": "6", "name": "Carol"}],
            "paging": {"next": "https://graph.example.com/4/friends?after=abc"}
        });

        let (entries, next) = parse_edge_page(&page).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "Bob");
        assert_eq!(next.as_deref(), Some("https://graph.example.com/4/friends?after=abc"));
    }

    #[test]
    fn test_parse_last_edge_page() {
        let (entries, next) = parse_edge_page(&json!({"data": []})).unwrap();
        assert!(entries.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_parse_edge_page_without_data() {
        let result = parse_edge_page(&json!({"error": {"message": "bad"}}));
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }

    /// Full HTTP/1.1 response with a JSON body
    fn ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn not_found() -> String {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }

    /// Serve one canned response per connection; `handler` maps (base url, path) to raw response text
    async fn serve(handler: fn(&str, &str) -> String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server_base = base.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let response = handler(&server_base, &path);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        base
    }

    fn graph(base: &str, path: &str) -> String {
        match path {
            "/4" => ok(r#"{"id":"4","name":"Mark"}"#),
            "/5" => "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\nConnection: close\r\n\r\n{\"id\":\"5\",\"na".to_string(),
            "/4/friends" => ok(&json!({
                "data": [{"id": "B", "name": "Bob"}],
                "paging": {"next": format!("{}/4/friends?after=p2", base)}
            })
            .to_string()),
            "/4/friends?after=p2" => ok(&json!({"data": [{"id": "C", "name": "Carol"}]}).to_string()),
            _ => not_found(),
        }
    }

    async fn local_fetcher(max_edge_pages: u32) -> HttpGraphFetcher {
        let base = serve(graph).await;
        HttpGraphFetcher::new(GraphApiConfig {
            base_url: base,
            max_edge_pages,
            ..test_config()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_node_over_http() {
        let fetcher = local_fetcher(10).await;
        let doc = fetcher.fetch_node(&EntityId::new("4")).await.unwrap();
        assert_eq!(doc.decode().unwrap(), json!({"id": "4", "name": "Mark"}));
    }

    #[tokio::test]
    async fn test_truncated_body_is_a_fetch_failure() {
        let fetcher = local_fetcher(10).await;
        let result = fetcher.fetch_node(&EntityId::new("5")).await;
        assert!(matches!(result, Err(FetchError::Network(_))), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_missing_node_over_http() {
        let fetcher = local_fetcher(10).await;
        let result = fetcher.fetch_node(&EntityId::new("404")).await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_edges_follows_paging() {
        let fetcher = local_fetcher(10).await;
        let edges = fetcher.fetch_edges(&EntityId::new("4")).await.unwrap();

        assert!(edges.complete);
        let names: Vec<Value> = edges
            .peers
            .iter()
            .map(|peer| peer.decode().unwrap()["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("Bob"), json!("Carol")]);
    }

    #[tokio::test]
    async fn test_page_limit_marks_edge_list_incomplete() {
        let fetcher = local_fetcher(1).await;
        let edges = fetcher.fetch_edges(&EntityId::new("4")).await.unwrap();

        assert!(!edges.complete);
        assert_eq!(edges.peers.len(), 1);
        assert_eq!(edges.peers[0].decode().unwrap()["id"], "B");
    }
}
