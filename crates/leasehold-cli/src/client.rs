//! HTTP client for the leasehold API
//!
//! Wraps `reqwest::Client` with URL construction and error mapping. Lock
//! names are pushed as single path segments, so reserved characters such
//! as `/` or spaces reach the server percent-encoded.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = LeaseholdClient::new("http://127.0.0.1:8000")?;
//! match client.acquire("build", "ci1", Some(30)).await? {
//!     AcquireResponse::Locked => println!("got it"),
//!     AcquireResponse::AlreadyLocked { owner, .. } => println!("held by {owner}"),
//! }
//! ```

use leasehold_core::api::{
    AcquireResponse, ErrorBody, LeaseRequest, LogEntry, ReleaseRequest, ReleaseResponse,
    RenewResponse, StatusResponse,
};
use leasehold_core::domain::ActiveLock;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Address the daemon listens on by default
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Errors returned by [`LeaseholdClient`]
///
/// The typed variants carry the server's `detail` message.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A name URL normalization would rewrite (`.` or `..`)
    #[error("Lock name '{0}' cannot be sent as a path segment")]
    InvalidName(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 403
    #[error("{0}")]
    Forbidden(String),

    /// 422
    #[error("Rejected by server: {0}")]
    Unprocessable(String),

    #[error("Server returned {status}: {detail}")]
    Server { status: u16, detail: String },
}

/// Client for a single leasehold server
#[derive(Debug, Clone)]
pub struct LeaseholdClient {
    client: Client,
    base_url: Url,
}

impl LeaseholdClient {
    /// Creates a client for the server at `base_url`
    ///
    /// A path prefix (e.g. behind a reverse proxy) is kept.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path"));
        }

        Ok(Self {
            client: Client::new(),
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the URL for `segments` below the base URL, encoding each one
    ///
    /// Dot segments are refused: the URL parser drops them even when
    /// percent-encoded, which would silently retarget the request.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        if let Some(dots) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ClientError::InvalidName(dots.to_string()));
        }

        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "Sending request");
        Ok(self.client.request(method, url))
    }

    /// `POST /lock/{name}`
    pub async fn acquire(
        &self,
        name: &str,
        owner: &str,
        ttl: Option<i64>,
    ) -> Result<AcquireResponse, ClientError> {
        let body = LeaseRequest {
            owner: owner.to_string(),
            ttl,
        };
        send(self.request(Method::POST, &["lock", name])?.json(&body)).await
    }

    /// `POST /unlock/{name}`
    pub async fn release(&self, name: &str, owner: &str) -> Result<ReleaseResponse, ClientError> {
        let body = ReleaseRequest {
            owner: owner.to_string(),
        };
        send(self.request(Method::POST, &["unlock", name])?.json(&body)).await
    }

    /// `POST /renew/{name}`
    pub async fn renew(
        &self,
        name: &str,
        owner: &str,
        ttl: Option<i64>,
    ) -> Result<RenewResponse, ClientError> {
        let body = LeaseRequest {
            owner: owner.to_string(),
            ttl,
        };
        send(self.request(Method::POST, &["renew", name])?.json(&body)).await
    }

    /// `GET /status/{name}`
    pub async fn status(&self, name: &str) -> Result<StatusResponse, ClientError> {
        send(self.request(Method::GET, &["status", name])?).await
    }

    /// `GET /locks`
    pub async fn list(&self) -> Result<Vec<ActiveLock>, ClientError> {
        send(self.request(Method::GET, &["locks"])?).await
    }

    /// `GET /log`, newest first
    pub async fn log(&self) -> Result<Vec<LogEntry>, ClientError> {
        send(self.request(Method::GET, &["log"])?).await
    }
}

/// Sends the request and decodes a 2xx body, mapping everything else
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };
    debug!(status = status.as_u16(), %detail, "Server returned an error");

    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        StatusCode::FORBIDDEN => ClientError::Forbidden(detail),
        StatusCode::UNPROCESSABLE_ENTITY => ClientError::Unprocessable(detail),
        other => ClientError::Server {
            status: other.as_u16(),
            detail,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn setup() -> (MockServer, LeaseholdClient) {
        let server = MockServer::start().await;
        let client = LeaseholdClient::new(&server.uri()).unwrap();
        (server, client)
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(matches!(
            LeaseholdClient::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            LeaseholdClient::new("ftp://example.com"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(LeaseholdClient::new(DEFAULT_SERVER_URL).is_ok());
    }

    #[test]
    fn test_endpoint_encodes_names_and_keeps_prefix() {
        let client = LeaseholdClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["status", "a/b c"]).unwrap().as_str(),
            "http://localhost:8000/status/a%2Fb%20c"
        );

        let proxied = LeaseholdClient::new("http://proxy/leasehold/").unwrap();
        assert_eq!(
            proxied.endpoint(&["locks"]).unwrap().as_str(),
            "http://proxy/leasehold/locks"
        );
    }

    #[test]
    fn test_endpoint_refuses_dot_names() {
        let client = LeaseholdClient::new("http://localhost:8000").unwrap();
        assert!(matches!(
            client.endpoint(&["lock", ".."]),
            Err(ClientError::InvalidName(name)) if name == ".."
        ));
        assert!(matches!(
            client.endpoint(&["status", "."]),
            Err(ClientError::InvalidName(_))
        ));
        assert_eq!(
            client.endpoint(&["lock", "..."]).unwrap().as_str(),
            "http://localhost:8000/lock/..."
        );
    }

    #[tokio::test]
    async fn test_dot_name_is_rejected_before_sending() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "locked"})))
            .expect(0)
            .mount(&server)
            .await;

        let err = client.acquire("..", "ci1", None).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_acquire_sends_owner_and_ttl() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/lock/build"))
            .and(body_json(json!({"owner": "ci1", "ttl": 30})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "locked"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client.acquire("build", "ci1", Some(30)).await.unwrap();
        assert_eq!(response, AcquireResponse::Locked);
    }

    #[tokio::test]
    async fn test_acquire_reports_holder() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/lock/build"))
            .and(body_json(json!({"owner": "ci2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "already_locked",
                "owner": "ci1",
                "expires_at": 1_700_000_030_i64
            })))
            .mount(&server)
            .await;

        let response = client.acquire("build", "ci2", None).await.unwrap();
        assert_eq!(
            response,
            AcquireResponse::AlreadyLocked {
                owner: "ci1".into(),
                expires_at: 1_700_000_030
            }
        );
    }

    #[tokio::test]
    async fn test_release_by_stranger_is_forbidden() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/unlock/build"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"detail": "You don't own the lock"})),
            )
            .mount(&server)
            .await;

        let err = client.release("build", "ci2").await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(ref d) if d == "You don't own the lock"));
    }

    #[tokio::test]
    async fn test_renew_missing_is_not_found() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/renew/ghost"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Lock not found"})),
            )
            .mount(&server)
            .await;

        let err = client.renew("ghost", "ci1", Some(10)).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(ref d) if d == "Lock not found"));
        assert_eq!(err.to_string(), "Lock not found");
    }

    #[tokio::test]
    async fn test_validation_error_is_unprocessable() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/lock/x"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"detail": "ttl must be at least 1 second"})),
            )
            .mount(&server)
            .await;

        let err = client.acquire("x", "o", Some(0)).await.unwrap_err();
        assert!(matches!(err, ClientError::Unprocessable(_)));
    }

    #[tokio::test]
    async fn test_non_json_error_uses_reason_phrase() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/locks"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client.list().await.unwrap_err();
        match err {
            ClientError::Server { status, detail } => {
                assert_eq!(status, 502);
                assert_eq!(detail, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_encodes_reserved_characters() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/status/deploy%2Fprod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "locked",
                "owner": "ci1",
                "expires_at": 42
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = client.status("deploy/prod").await.unwrap();
        assert_eq!(
            status,
            StatusResponse::Locked {
                owner: "ci1".into(),
                expires_at: 42
            }
        );
    }

    #[tokio::test]
    async fn test_list_and_log_parse() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/locks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "alpha", "owner": "o", "expires_at": 100, "ttl_left": 12},
                {"name": "beta", "owner": "p", "expires_at": 200, "ttl_left": 112}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/log"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"timestamp": 9, "name": "alpha", "owner": "o", "action": "acquire"}
            ])))
            .mount(&server)
            .await;

        let locks = client.list().await.unwrap();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[1].name, "beta");
        assert_eq!(locks[0].ttl_left, 12);

        let log = client.log().await.unwrap();
        assert_eq!(log[0].action, "acquire");
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        // Nothing listens on the discard port
        let client = LeaseholdClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            client.status("x").await,
            Err(ClientError::Request(_))
        ));
    }
}
