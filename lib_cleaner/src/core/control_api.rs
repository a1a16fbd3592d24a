//! # Engine Control API Client
//!
//! The engine exposes a small local HTTP API guarded by a bearer secret.
//! Two calls are used: `GET /version` as the liveness check, and
//! `GET /proxies/{name}/delay?timeout=..&url=..` to have the engine
//! measure one proxy's round trip to a check URL.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::configs::EngineSettings;
use crate::errors::{CleanerError, EngineError, ProbeError};

/// Body of a delay response; only `delay` is read.
#[derive(Debug, Deserialize)]
struct DelayBody {
    delay: Option<u32>,
}

/// Client for one engine's control API.
#[derive(Debug, Clone)]
pub struct ControlClient {
    /// Plain client; per-request timeouts are set on each call.
    inner: Client,
    /// The absolute control API root, e.g. `http://127.0.0.1:9090/`.
    base_url: Url,
    /// Shared secret sent as `Authorization: Bearer <secret>`.
    secret: String,
}

impl ControlClient {
    /// Creates a client from the engine settings.
    ///
    /// Environment proxy variables are ignored: the control API is local.
    pub fn new(settings: &EngineSettings) -> Result<Self, CleanerError> {
        let base_url = Url::parse(&settings.controller_url())
            .map_err(|e| CleanerError::EngineStart(EngineError::ControlUrl(e.to_string())))?;
        let inner = Client::builder().no_proxy().build()?;
        Ok(Self { inner, base_url, secret: settings.api_secret.clone() })
    }

    /// Liveness check. `Ok` only on a 2xx answer.
    pub async fn version(&self, timeout: Duration) -> Result<(), ProbeError> {
        let url = self.endpoint(&["version"])?;
        let response = self
            .inner
            .get(url)
            .header(AUTHORIZATION, self.bearer())
            .timeout(timeout)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(response.status().as_u16()))
        }
    }

    /// Asks the engine to measure `name` against `target_url`.
    ///
    /// `engine_timeout_ms` bounds the engine's own check; `request_timeout`
    /// bounds this HTTP call and should be slightly longer.
    pub async fn delay(
        &self,
        name: &str,
        target_url: &str,
        engine_timeout_ms: u32,
        request_timeout: Duration,
    ) -> Result<u32, ProbeError> {
        let mut url = self.endpoint(&["proxies", name, "delay"])?;
        url.query_pairs_mut()
            .append_pair("timeout", &engine_timeout_ms.to_string())
            .append_pair("url", target_url);

        let response = self
            .inner
            .get(url)
            .header(AUTHORIZATION, self.bearer())
            .timeout(request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        let body: DelayBody = response.json().await?;
        body.delay.ok_or(ProbeError::MissingDelay)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.secret)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProbeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProbeError::BadName(segments.join("/")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ControlClient {
        ControlClient::new(&EngineSettings {
            api_port: server.address().port(),
            api_secret: "s3cret".into(),
            ..EngineSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn version_sends_bearer_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "v1.18"})))
            .mount(&server)
            .await;
        client_for(&server).version(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn version_rejects_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(path("/version"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let err = client_for(&server).version(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status(401)));
    }

    #[tokio::test]
    async fn delay_reads_millis_and_forwards_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxies/Node-0-SS/delay"))
            .and(query_param("timeout", "2000"))
            .and(query_param("url", "http://www.gstatic.com/generate_204"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"delay": 87})))
            .mount(&server)
            .await;

        let ms = client_for(&server)
            .delay("Node-0-SS", "http://www.gstatic.com/generate_204", 2000, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(ms, 87);
    }

    #[tokio::test]
    async fn delay_maps_failures() {
        let server = MockServer::start().await;
        Mock::given(path("/proxies/dead/delay"))
            .respond_with(ResponseTemplate::new(504).set_body_json(json!({"message": "Timeout"})))
            .mount(&server)
            .await;
        Mock::given(path("/proxies/odd/delay"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;
        Mock::given(path("/proxies/slow/delay"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"delay": 10}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let target = "http://check.example/";
        let t = Duration::from_millis(300);
        assert!(matches!(client.delay("dead", target, 100, t).await, Err(ProbeError::Status(504))));
        assert!(matches!(client.delay("odd", target, 100, t).await, Err(ProbeError::MissingDelay)));
        assert!(matches!(client.delay("slow", target, 100, t).await, Err(ProbeError::Transport(_))));
    }

    #[test]
    fn names_with_spaces_are_percent_encoded() {
        let client = ControlClient::new(&EngineSettings::default()).unwrap();
        let url = client.endpoint(&["proxies", "SS 120ms", "delay"]).unwrap();
        assert_eq!(url.path(), "/proxies/SS%20120ms/delay");
    }
}
