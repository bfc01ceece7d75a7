use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{annotate_head_status, backoff_delay, create_head_client, PurlService};
use crate::common::{truncate, Capability, ClientConfig, Payload};
use crate::error::{RemoteError, ToolkitError};
use crate::validation::ParsedPurl;

pub(crate) const USER_AGENT: &str = concat!("purlcli/", env!("CARGO_PKG_VERSION"));

/// Longest error body quoted back in a `ClientRejected` message
const MAX_ERROR_BODY: usize = 200;

/// Why one attempt failed in a way worth retrying
enum RetryableFailure {
    Transport(String),
    Timeout,
    ServerError(StatusCode),
}

impl RetryableFailure {
    fn into_error(self, attempts: u32) -> RemoteError {
        match self {
            RetryableFailure::Transport(message) => RemoteError::Unavailable {
                attempts,
                status: None,
                message,
            },
            RetryableFailure::Timeout => RemoteError::Timeout { attempts },
            RetryableFailure::ServerError(status) => RemoteError::Unavailable {
                attempts,
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("server error")
                    .to_string(),
            },
        }
    }
}

/// Capability endpoints resolved once against the base URL
#[derive(Debug, Clone)]
struct Endpoints {
    metadata: Url,
    urls: Url,
    validate: Url,
    versions: Url,
}

impl Endpoints {
    fn resolve(base: &Url) -> Result<Self> {
        let join = |capability: Capability| {
            base.join(capability.path())
                .with_context(|| format!("Failed to build {} endpoint from {}", capability, base))
        };
        Ok(Self {
            metadata: join(Capability::Metadata)?,
            urls: join(Capability::Urls)?,
            validate: join(Capability::Validate)?,
            versions: join(Capability::Versions)?,
        })
    }

    fn get(&self, capability: Capability) -> &Url {
        match capability {
            Capability::Metadata => &self.metadata,
            Capability::Urls => &self.urls,
            Capability::Validate => &self.validate,
            Capability::Versions => &self.versions,
        }
    }
}

/// HTTP client for the PurlDB capability endpoints
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    /// Carries no credentials; HEAD targets are third-party hosts
    head_http: Client,
    endpoints: Endpoints,
    config: ClientConfig,
    cancel: CancellationToken,
    head_check: bool,
}

impl RemoteClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Token {}", key))
                .context("API key contains characters not allowed in a header")?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let head_http = create_head_client(config.timeout()).context("Failed to build HEAD client")?;
        let endpoints = Endpoints::resolve(&config.base_url)?;

        Ok(Self {
            http,
            head_http,
            endpoints,
            config,
            cancel: CancellationToken::new(),
            head_check: false,
        })
    }

    /// Cut retry backoff short when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// HEAD-check `*_url` fields of `urls` payloads
    pub fn with_head_check(mut self, enabled: bool) -> Self {
        self.head_check = enabled;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `base_url` + capability path + `?purl=<url-encoded purl>`
    pub fn endpoint(&self, capability: Capability, purl: &ParsedPurl) -> Url {
        let mut url = self.endpoints.get(capability).clone();
        url.query_pairs_mut().append_pair("purl", purl.canonical());
        url
    }

    pub async fn fetch_metadata(&self, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        self.request(Capability::Metadata, purl).await
    }

    pub async fn fetch_urls(&self, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        let mut payload = self.request(Capability::Urls, purl).await?;
        if self.head_check {
            annotate_head_status(&self.head_http, &mut payload, self.config.timeout()).await;
        }
        Ok(payload)
    }

    pub async fn check_validity(&self, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        self.request(Capability::Validate, purl).await
    }

    pub async fn fetch_versions(&self, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        self.request(Capability::Versions, purl).await
    }

    /// Startup reachability check. Any HTTP response counts as reachable;
    /// only a transport failure is fatal.
    pub async fn probe(&self) -> Result<(), ToolkitError> {
        let url = self.config.base_url.clone();
        match self.http.get(url.clone()).send().await {
            Ok(resp) => {
                debug!("Probe of {} answered HTTP {}", url, resp.status());
                Ok(())
            }
            Err(e) => Err(ToolkitError::ServiceUnreachable {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// One capability call with retry. 4xx fails at once; transport errors,
    /// timeouts and 5xx are retried up to `max_retries` times.
    async fn request(&self, capability: Capability, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        let url = self.endpoint(capability, purl);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match self.http.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.text().await {
                            Ok(body) => return parse_payload(&body),
                            Err(e) if e.is_timeout() => RetryableFailure::Timeout,
                            Err(e) => RetryableFailure::Transport(e.to_string()),
                        }
                    } else if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(RemoteError::ClientRejected {
                            status: status.as_u16(),
                            message: rejection_message(status, &body),
                        });
                    } else if status.is_server_error() {
                        RetryableFailure::ServerError(status)
                    } else {
                        return Err(RemoteError::MalformedResponse(format!(
                            "unexpected HTTP status {}",
                            status
                        )));
                    }
                }
                Err(e) if e.is_timeout() => RetryableFailure::Timeout,
                Err(e) => RetryableFailure::Transport(e.to_string()),
            };

            if attempt > self.config.max_retries {
                let error = failure.into_error(attempt);
                warn!("{} {} failed: {}", capability, purl, error);
                return Err(error);
            }

            let delay = backoff_delay(attempt - 1, self.config.backoff_base, self.config.backoff_cap);
            debug!(
                "{} {} attempt {} failed, retrying in {:?}",
                capability, purl, attempt, delay
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(failure.into_error(attempt)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl PurlService for RemoteClient {
    async fn fetch(&self, capability: Capability, purl: &ParsedPurl) -> Result<Payload, RemoteError> {
        match capability {
            Capability::Metadata => self.fetch_metadata(purl).await,
            Capability::Urls => self.fetch_urls(purl).await,
            Capability::Validate => self.check_validity(purl).await,
            Capability::Versions => self.fetch_versions(purl).await,
        }
    }
}

fn parse_payload(body: &str) -> Result<Payload, RemoteError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    Payload::from_value(value).ok_or_else(|| {
        RemoteError::MalformedResponse("expected a JSON object or array".to_string())
    })
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("client error").to_string()
    } else {
        truncate(body, MAX_ERROR_BODY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OutputFormat;
    use crate::validation::PurlValidator;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, max_retries: u32) -> ClientConfig {
        ClientConfig::new(&server.uri(), OutputFormat::JsonLines)
            .unwrap()
            .with_timeout(1)
            .with_max_retries(max_retries)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(40))
    }

    fn purl(raw: &str) -> ParsedPurl {
        PurlValidator::default().validate_str(raw).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_purl() {
        let config = ClientConfig::new("http://localhost:8000/api/purl", OutputFormat::JsonLines).unwrap();
        let client = RemoteClient::new(config).unwrap();
        let url = client.endpoint(Capability::Versions, &purl("pkg:npm/%40angular/core@12.0.0"));

        assert_eq!(url.path(), "/api/purl/versions/");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "purl");
        assert!(value.starts_with("pkg:npm/"));
        assert!(url.as_str().contains("purl=pkg%3Anpm%2F"));
    }

    #[tokio::test]
    async fn test_success_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/"))
            .and(query_param("purl", "pkg:pypi/django@3.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "django", "version": "3.2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 2)).unwrap();
        let payload = client.fetch_metadata(&purl("pkg:pypi/django@3.2")).await.unwrap();
        assert_eq!(payload.get_str("name").unwrap(), "django");
    }

    #[tokio::test]
    async fn test_server_error_retries_then_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 2)).unwrap();
        let err = client.fetch_metadata(&purl("pkg:pypi/django@3.2")).await.unwrap_err();

        assert_eq!(
            err,
            RemoteError::Unavailable {
                attempts: 3,
                status: Some(500),
                message: "Internal Server Error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/urls/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 2)).unwrap();
        let err = client.fetch_urls(&purl("pkg:npm/nothing@1.0")).await.unwrap_err();

        assert_eq!(
            err,
            RemoteError::ClientRejected {
                status: 404,
                message: "Not Found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/versions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"version": "1.0"}])))
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 2)).unwrap();
        let payload = client.fetch_versions(&purl("pkg:cargo/serde")).await.unwrap();
        assert_eq!(payload.get_array("items").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/validate/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 2)).unwrap();
        let err = client.check_validity(&purl("pkg:gem/rails@7.0.0")).await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "slow"}))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 0)).unwrap();
        let err = client.fetch_metadata(&purl("pkg:npm/slow@1.0")).await.unwrap_err();
        assert_eq!(err, RemoteError::Timeout { attempts: 1 });
    }

    #[tokio::test]
    async fn test_api_key_sent_as_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/"))
            .and(header("authorization", "Token secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new(config(&server, 0).with_api_key(Some("secret".to_string()))).unwrap();
        assert!(client.fetch_metadata(&purl("pkg:npm/a@1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_head_check_does_not_forward_api_key() {
        let purldb = MockServer::start().await;
        let mirror = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/urls/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "download_url": format!("{}/pkg.tgz", mirror.uri())
            })))
            .mount(&purldb)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/pkg.tgz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mirror)
            .await;

        let config = config(&purldb, 0).with_api_key(Some("secret".to_string()));
        let client = RemoteClient::new(config).unwrap().with_head_check(true);
        let payload = client.fetch_urls(&purl("pkg:npm/a@1")).await.unwrap();
        assert_eq!(payload.get_object("head_status").unwrap()["download_url"], json!(200));

        let received = mirror.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get("authorization").is_none());
        assert!(received[0].headers.get("user-agent").is_some());

        let calls = purldb.received_requests().await.unwrap();
        assert_eq!(calls[0].headers.get("authorization").unwrap(), "Token secret");
    }

    #[test]
    fn test_endpoints_resolved_per_capability() {
        let config = ClientConfig::new("http://localhost:8000/api/purl/", OutputFormat::JsonLines).unwrap();
        let client = RemoteClient::new(config).unwrap();
        for capability in [
            Capability::Metadata,
            Capability::Urls,
            Capability::Validate,
            Capability::Versions,
        ] {
            let url = client.endpoint(capability, &purl("pkg:pypi/django@3.2"));
            assert_eq!(url.path(), format!("/api/purl/{}", capability.path()));
        }
    }

    #[tokio::test]
    async fn test_cancellation_cuts_backoff_short() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let config = config(&server, 5).with_backoff(Duration::from_secs(30), Duration::from_secs(30));
        let client = RemoteClient::new(config).unwrap().with_cancellation(token);

        let err = client.fetch_metadata(&purl("pkg:npm/a@1")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_probe() {
        let server = MockServer::start().await;
        let client = RemoteClient::new(config(&server, 0)).unwrap();
        // wiremock answers unmatched requests with 404, which still means reachable
        assert!(client.probe().await.is_ok());

        let unreachable = ClientConfig::new("http://127.0.0.1:1/", OutputFormat::JsonLines).unwrap();
        let client = RemoteClient::new(unreachable).unwrap();
        assert!(matches!(
            client.probe().await,
            Err(ToolkitError::ServiceUnreachable { .. })
        ));
    }
}
