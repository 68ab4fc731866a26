//! HTTP transport: authenticated GET requests against SonarQube.
//!
//! No retries at this layer; a failed call is retried only when the cache
//! decides the entry is stale on a later read.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::installation::Credentials;

const USER_AGENT: &str = concat!("sonar-qg/", env!("CARGO_PKG_VERSION"));

/// Issues a GET and returns the body text of a 2xx response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, credentials: &Credentials) -> Result<String, TransportError>;
}

/// `reqwest`-backed transport with bounded connect and request timeouts.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, credentials: &Credentials) -> Result<String, TransportError> {
        let started = Instant::now();
        let mut request = self.client.get(url);
        request = match credentials {
            Credentials::None => request,
            Credentials::Token(token) => request.basic_auth(token, Some("")),
            Credentials::Basic { login, password } => request.basic_auth(login, Some(password)),
        };

        let io_error = |source: reqwest::Error| TransportError::Io {
            url: url.to_string(),
            source,
        };

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                crate::metrics::http_request("io_error", elapsed_ms(started));
                return Err(io_error(e));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            // Body is consumed here too so the connection goes back to the pool.
            let body = resp.text().await.unwrap_or_default();
            crate::metrics::http_request("http_error", elapsed_ms(started));
            tracing::debug!(url, status = status.as_u16(), "SonarQube request failed");
            return Err(TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(|e| {
            crate::metrics::http_request("io_error", elapsed_ms(started));
            io_error(e)
        })?;
        crate::metrics::http_request("ok", elapsed_ms(started));
        Ok(body)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(2), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_token_sent_as_username_with_empty_password() {
        let mut server = Server::new_async().await;
        // base64("tok:")
        let mock = server
            .mock("GET", "/api/server/version")
            .match_header("authorization", "Basic dG9rOg==")
            .with_status(200)
            .with_body("8.9")
            .create_async()
            .await;

        let url = format!("{}/api/server/version", server.url());
        let body = transport()
            .get(&url, &Credentials::Token("tok".into()))
            .await
            .unwrap();
        assert_eq!(body, "8.9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_and_password() {
        let mut server = Server::new_async().await;
        // base64("admin:pw")
        let mock = server
            .mock("GET", "/api/ce/task")
            .match_query(Matcher::Any)
            .match_header("authorization", "Basic YWRtaW46cHc=")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let url = format!("{}/api/ce/task?id=1", server.url());
        let credentials = Credentials::Basic {
            login: "admin".into(),
            password: "pw".into(),
        };
        transport().get(&url, &credentials).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_header_without_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/server/version")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("9.9")
            .create_async()
            .await;

        let url = format!("{}/api/server/version", server.url());
        transport().get(&url, &Credentials::None).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_is_http_error_with_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/ce/task")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"msg":"No activity found for task 'x'"}]}"#)
            .create_async()
            .await;

        let url = format!("{}/api/ce/task?id=x", server.url());
        let err = transport().get(&url, &Credentials::None).await.unwrap_err();
        match err {
            TransportError::Http {
                url: failed,
                status,
                body,
            } => {
                assert_eq!(failed, url);
                assert_eq!(status, 404);
                assert!(body.contains("No activity found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_io_error() {
        let err = transport()
            .get("http://127.0.0.1:1/api/server/version", &Credentials::None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io { .. }));
    }
}
